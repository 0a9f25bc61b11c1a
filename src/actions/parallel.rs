//! Concurrent execution of a child list.

use std::collections::HashMap;

use crate::action::{Accepted, Action, ActionState, AttachOp, Behavior, ChildTag, Core};
use crate::actions::FinishCondition;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct ParallelBehavior {
    mode: FinishCondition,
    children: Vec<Action>,
    finished: HashMap<usize, bool>,
}

impl ParallelBehavior {
    /// Applies the finish condition after recording one child's result.
    fn settle(&mut self, core: &mut Core, is_succ: bool, why: Reason, trace: Trace) {
        let decisive = match self.mode {
            FinishCondition::AnySucc => is_succ,
            FinishCondition::AnyFail => !is_succ,
            FinishCondition::AllFinish => false,
        };
        if decisive {
            self.stop_underway();
            core.finish_forward(is_succ, why, trace);
            return;
        }
        if self.finished.len() == self.children.len() {
            match self.mode {
                // Ran to completion without the triggering result appearing:
                // the last child's outcome stands for the group.
                FinishCondition::AnySucc | FinishCondition::AnyFail => {
                    core.finish_forward(is_succ, why, trace);
                }
                FinishCondition::AllFinish => {
                    core.finish(true, Reason::default());
                }
            }
        }
    }

    fn stop_underway(&mut self) {
        for c in &self.children {
            if c.is_underway() {
                c.stop();
            }
        }
    }
}

impl Behavior for ParallelBehavior {
    fn is_ready(&self) -> bool {
        !self.children.is_empty() && self.children.iter().all(|c| c.is_ready())
    }

    fn accept_child(&mut self, op: AttachOp<'_>, child: Action) -> Result<Accepted, AttachError> {
        match op {
            AttachOp::Append => {
                self.children.push(child);
                Ok(Accepted::new(ChildTag::Index(self.children.len() - 1)))
            }
            _ => Err(AttachError::Unsupported),
        }
    }

    fn on_start(&mut self, core: &mut Core) {
        self.finished.clear();
        let mut start_failures = Vec::new();
        for (i, c) in self.children.iter().enumerate() {
            if !c.start() {
                start_failures.push(i);
            }
        }
        for i in start_failures {
            if !matches!(core.state(), ActionState::Finished | ActionState::Stopped) {
                self.finished.insert(i, false);
                self.settle(core, false, Reason::start_child_fail(), Trace::new());
            }
        }
    }

    fn on_pause(&mut self, _core: &mut Core) {
        for c in &self.children {
            if c.state() == ActionState::Running {
                c.pause();
            }
        }
    }

    fn on_resume(&mut self, _core: &mut Core) {
        for c in &self.children {
            if c.state() == ActionState::Pause {
                c.resume();
            }
        }
    }

    fn on_stop(&mut self, _core: &mut Core) {
        self.stop_underway();
    }

    fn on_reset(&mut self, _core: &mut Core) {
        for c in &self.children {
            c.reset();
        }
        self.finished.clear();
    }

    fn on_child_finished(
        &mut self,
        core: &mut Core,
        tag: &ChildTag,
        is_succ: bool,
        why: Reason,
        trace: Trace,
    ) {
        self.finished.insert(tag.index(), is_succ);
        self.settle(core, is_succ, why, trace);
    }

    fn on_child_blocked(&mut self, core: &mut Core, _tag: &ChildTag, why: Reason, trace: Trace) {
        // One blocked child pauses the whole group; resume un-pauses the
        // siblings and replays whatever completed meanwhile.
        for c in &self.children {
            if c.state() == ActionState::Running {
                c.pause();
            }
        }
        core.block_forward(why, trace);
    }

    fn children(&self) -> Vec<(String, Action)> {
        self.children
            .iter()
            .enumerate()
            .map(|(i, c)| (i.to_string(), c.clone()))
            .collect()
    }
}

/// Starts every appended child on the same turn. See [`FinishCondition`] for
/// when the group finishes; on `AnySucc`/`AnyFail` the remaining children are
/// stopped.
pub fn parallel(lp: &RunLoop, mode: FinishCondition) -> Action {
    Action::from_behavior(
        lp,
        "Parallel",
        Box::new(ParallelBehavior {
            mode,
            children: Vec::new(),
            finished: HashMap::new(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;
    use crate::actions::{dummy, sleep};
    use std::time::Duration;

    #[test]
    fn test_all_finish_waits_for_every_child() {
        let lp = RunLoop::new();
        let par = parallel(&lp, FinishCondition::AllFinish);
        par.add_child(sleep(&lp, Duration::from_millis(10))).unwrap();
        par.add_child(sleep(&lp, Duration::from_millis(30))).unwrap();
        par.start();
        lp.advance(Duration::from_millis(20));
        assert_eq!(par.state(), ActionState::Running);
        lp.advance(Duration::from_millis(10));
        assert_eq!(par.state(), ActionState::Finished);
        assert_eq!(par.result(), ActionResult::Success);
    }

    #[test]
    fn test_any_succ_stops_the_rest() {
        let lp = RunLoop::new();
        let par = parallel(&lp, FinishCondition::AnySucc);
        let (d1, h1) = dummy(&lp);
        let (d2, h2) = dummy(&lp);
        let (d3, _h3) = dummy(&lp);
        par.add_child(d1).unwrap();
        par.add_child(d2.clone()).unwrap();
        par.add_child(d3.clone()).unwrap();

        par.start();
        h1.emit_finish(false);
        lp.drain();
        assert_eq!(par.state(), ActionState::Running);

        h2.emit_finish(true);
        lp.drain();
        assert_eq!(par.result(), ActionResult::Success);
        assert_eq!(d3.state(), ActionState::Stopped);
    }

    #[test]
    fn test_any_fail_exhausted_forwards_last_result() {
        let lp = RunLoop::new();
        let par = parallel(&lp, FinishCondition::AnyFail);
        let (d1, h1) = dummy(&lp);
        let (d2, h2) = dummy(&lp);
        par.add_child(d1).unwrap();
        par.add_child(d2).unwrap();
        par.start();
        h1.emit_finish(true);
        h2.emit_finish(true);
        lp.drain();
        assert_eq!(par.result(), ActionResult::Success);
    }

    #[test]
    fn test_blocked_child_pauses_the_group() {
        let lp = RunLoop::new();
        let par = parallel(&lp, FinishCondition::AllFinish);
        let (d1, h1) = dummy(&lp);
        let (d2, _h2) = dummy(&lp);
        par.add_child(d1).unwrap();
        par.add_child(d2.clone()).unwrap();
        par.start();

        h1.emit_block(Reason::new(9, "wait"));
        lp.drain();
        assert_eq!(par.state(), ActionState::Pause);
        assert_eq!(d2.state(), ActionState::Pause);

        par.resume();
        assert_eq!(d2.state(), ActionState::Running);
        par.stop();
        assert_eq!(par.state(), ActionState::Stopped);
    }
}
