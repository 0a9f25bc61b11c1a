//! Bounded re-execution of a single child.

use crate::action::{Accepted, Action, AttachOp, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::actions::RepeatMode;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct RepeatBehavior {
    mode: RepeatMode,
    // 0 means unlimited.
    times: usize,
    done: usize,
    child: Option<Action>,
    slot: SerialSlot,
}

impl Behavior for RepeatBehavior {
    fn is_ready(&self) -> bool {
        self.child.as_ref().is_some_and(|c| c.is_ready())
    }

    fn accept_child(&mut self, op: AttachOp<'_>, child: Action) -> Result<Accepted, AttachError> {
        match op {
            AttachOp::Set => {
                let replaced = self.child.replace(child);
                Ok(Accepted::replacing(ChildTag::Index(0), replaced))
            }
            _ => Err(AttachError::Unsupported),
        }
    }

    fn on_start(&mut self, core: &mut Core) {
        self.done = 0;
        if let Some(child) = self.child.clone() {
            self.slot.launch(core, &child);
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
        if let Some(c) = &self.child {
            c.reset();
        }
        self.done = 0;
        self.slot.clear();
    }

    fn on_child_finished(
        &mut self,
        core: &mut Core,
        _tag: &ChildTag,
        is_succ: bool,
        why: Reason,
        trace: Trace,
    ) {
        let brk = match self.mode {
            RepeatMode::NoBreak => false,
            RepeatMode::BreakSucc => is_succ,
            RepeatMode::BreakFail => !is_succ,
        };
        if brk {
            core.finish_forward(is_succ, why, trace);
            return;
        }
        self.done += 1;
        if self.times != 0 && self.done >= self.times {
            core.finish(true, Reason::repeat_no_times());
        } else if let Some(child) = self.child.clone() {
            child.reset();
            self.slot.launch(core, &child);
        }
    }

    fn children(&self) -> Vec<(String, Action)> {
        self.child
            .iter()
            .map(|c| ("0".to_string(), c.clone()))
            .collect()
    }
}

/// Runs its single child (set via `set_child`) up to `times` times, 0 meaning
/// unlimited. See [`RepeatMode`] for early-break behavior; running out of
/// iterations succeeds with [`Reason::repeat_no_times`].
pub fn repeat(lp: &RunLoop, mode: RepeatMode, times: usize) -> Action {
    Action::from_behavior(
        lp,
        "Repeat",
        Box::new(RepeatBehavior {
            mode,
            times,
            done: 0,
            child: None,
            slot: SerialSlot::default(),
        }),
    )
}
