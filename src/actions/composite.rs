//! Named wrapper around a pre-assembled subtree.

use crate::action::{Action, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct CompositeBehavior {
    child: Action,
    slot: SerialSlot,
}

impl Behavior for CompositeBehavior {
    fn is_ready(&self) -> bool {
        self.child.is_ready()
    }

    fn on_start(&mut self, core: &mut Core) {
        let child = self.child.clone();
        self.slot.launch(core, &child);
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
        self.child.reset();
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
        core.finish_forward(is_succ, why, trace);
    }

    fn children(&self) -> Vec<(String, Action)> {
        vec![("0".to_string(), self.child.clone())]
    }
}

/// Wraps one pre-assembled subtree under a reusable name and forwards every
/// verb to it. Application code uses this to define "macro" actions without
/// writing a behavior: build the subtree, wrap it, set a label.
///
/// The subtree root must not already have a parent; a violation is logged
/// and leaves the composite unable to receive the subtree's completion.
pub fn composite(lp: &RunLoop, subtree: Action, label: impl Into<String>) -> Action {
    let act = Action::from_behavior(
        lp,
        "Composite",
        Box::new(CompositeBehavior {
            child: subtree.clone(),
            slot: SerialSlot::default(),
        }),
    );
    act.set_label(label);
    act.adopt(&subtree);
    act
}
