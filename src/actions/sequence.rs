//! Ordered execution of a child list.

use crate::action::{Accepted, Action, AttachOp, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::actions::FinishCondition;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct SequenceBehavior {
    mode: FinishCondition,
    children: Vec<Action>,
    slot: SerialSlot,
}

impl SequenceBehavior {
    fn advance(&mut self, core: &mut Core, next: usize, is_succ: bool, why: Reason, trace: Trace) {
        match self.children.get(next) {
            Some(child) => {
                let child = child.clone();
                self.slot.launch(core, &child);
            }
            // Past the last child: the sequence takes the last child's
            // result, reason and trace as its own.
            None => {
                core.finish_forward(is_succ, why, trace);
            }
        }
    }
}

impl Behavior for SequenceBehavior {
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
        // Non-empty by the is_ready gate.
        if let Some(first) = self.children.first().cloned() {
            self.slot.launch(core, &first);
        }
    }

    fn on_pause(&mut self, _core: &mut Core) {
        self.slot.pause();
    }

    fn on_resume(&mut self, _core: &mut Core) {
        self.slot.resume();
    }

    fn on_stop(&mut self, _core: &mut Core) {
        self.slot.stop();
    }

    fn on_reset(&mut self, _core: &mut Core) {
        for c in &self.children {
            c.reset();
        }
        self.slot.clear();
    }

    fn on_child_finished(
        &mut self,
        core: &mut Core,
        tag: &ChildTag,
        is_succ: bool,
        why: Reason,
        trace: Trace,
    ) {
        match self.mode {
            FinishCondition::AnyFail if !is_succ => {
                core.finish_forward(false, why, trace);
            }
            FinishCondition::AnySucc if is_succ => {
                core.finish_forward(true, why, trace);
            }
            _ => self.advance(core, tag.index() + 1, is_succ, why, trace),
        }
    }

    fn children(&self) -> Vec<(String, Action)> {
        self.children
            .iter()
            .enumerate()
            .map(|(i, c)| (i.to_string(), c.clone()))
            .collect()
    }
}

/// Runs appended children in order. See [`FinishCondition`] for when the
/// sequence itself finishes.
pub fn sequence(lp: &RunLoop, mode: FinishCondition) -> Action {
    Action::from_behavior(
        lp,
        "Sequence",
        Box::new(SequenceBehavior {
            mode,
            children: Vec::new(),
            slot: SerialSlot::default(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionResult, ActionState};
    use crate::actions::function;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_all_finish_runs_every_child_and_forwards_last() {
        let lp = RunLoop::new();
        let seq = sequence(&lp, FinishCondition::AllFinish);
        let ran = Rc::new(RefCell::new(Vec::new()));
        for i in 0..2 {
            let ran = Rc::clone(&ran);
            seq.add_child(function(&lp, move || {
                ran.borrow_mut().push(i);
                true
            }))
            .unwrap();
        }
        seq.start();
        lp.drain();
        assert_eq!(*ran.borrow(), vec![0, 1]);
        assert_eq!(seq.result(), ActionResult::Success);
    }

    #[test]
    fn test_any_fail_stops_at_first_failure() {
        let lp = RunLoop::new();
        let seq = sequence(&lp, FinishCondition::AnyFail);
        let second = Rc::new(RefCell::new(false));
        seq.add_child(function(&lp, || false)).unwrap();
        let second2 = Rc::clone(&second);
        let never = function(&lp, move || {
            *second2.borrow_mut() = true;
            true
        });
        seq.add_child(never.clone()).unwrap();

        seq.start();
        lp.drain();
        assert_eq!(seq.result(), ActionResult::Fail);
        assert!(!*second.borrow());
        assert_eq!(never.state(), ActionState::Idle);
    }

    #[test]
    fn test_any_succ_stops_at_first_success() {
        let lp = RunLoop::new();
        let seq = sequence(&lp, FinishCondition::AnySucc);
        let ran = Rc::new(RefCell::new(0));
        for result in [false, true, true] {
            let ran = Rc::clone(&ran);
            seq.add_child(function(&lp, move || {
                *ran.borrow_mut() += 1;
                result
            }))
            .unwrap();
        }
        seq.start();
        lp.drain();
        assert_eq!(seq.result(), ActionResult::Success);
        assert_eq!(*ran.borrow(), 2);
    }

    #[test]
    fn test_empty_sequence_is_not_ready() {
        let lp = RunLoop::new();
        let seq = sequence(&lp, FinishCondition::AllFinish);
        assert!(!seq.is_ready());
        assert!(!seq.start());
    }

    #[test]
    fn test_trace_names_leaf_then_sequence() {
        let lp = RunLoop::new();
        let seq = sequence(&lp, FinishCondition::AllFinish);
        seq.set_label("outer");
        seq.add_child(function(&lp, || true)).unwrap();
        let trace = Rc::new(RefCell::new(Vec::new()));
        let trace2 = Rc::clone(&trace);
        seq.set_finish_callback(Box::new(move |_, _, t| {
            *trace2.borrow_mut() = t.iter().map(|w| w.kind).collect();
        }));
        seq.start();
        lp.drain();
        assert_eq!(*trace.borrow(), vec!["Function", "Sequence"]);
    }
}
