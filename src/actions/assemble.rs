//! Shared machinery for composites that run one child at a time.

use crate::action::{Action, ActionState, Core};
use crate::reason::Reason;

/// Tracks the single child a serial composite is currently driving, and fans
/// the parent's pause/resume/stop verbs out to it.
///
/// Launch failure is terminal for the whole composite: a child that refuses to
/// start means the tree is mis-assembled, so the parent finishes with
/// [`Reason::start_child_fail`].
#[derive(Default)]
pub(crate) struct SerialSlot {
    curr: Option<Action>,
}

impl SerialSlot {
    /// Starts `child` and remembers it as current. On refusal, fails the
    /// parent and returns false.
    pub(crate) fn launch(&mut self, core: &mut Core, child: &Action) -> bool {
        if child.start() {
            self.curr = Some(child.clone());
            true
        } else {
            self.curr = None;
            core.finish(false, Reason::start_child_fail());
            false
        }
    }

    /// Remembers an already-started child as current.
    pub(crate) fn track(&mut self, child: &Action) {
        self.curr = Some(child.clone());
    }

    pub(crate) fn pause(&mut self) {
        if let Some(c) = &self.curr {
            if c.state() == ActionState::Running {
                c.pause();
            }
        }
    }

    pub(crate) fn resume(&mut self) {
        if let Some(c) = &self.curr {
            if c.state() == ActionState::Pause {
                c.resume();
            }
        }
    }

    pub(crate) fn stop(&mut self) {
        if let Some(c) = self.curr.take() {
            c.stop();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.curr = None;
    }
}
