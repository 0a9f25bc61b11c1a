//! Result post-processing around a single child.

use crate::action::{Accepted, Action, AttachOp, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::actions::WrapperMode;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct WrapperBehavior {
    mode: WrapperMode,
    child: Option<Action>,
    slot: SerialSlot,
}

impl Behavior for WrapperBehavior {
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
        let mapped = match self.mode {
            WrapperMode::Normal => is_succ,
            WrapperMode::Invert => !is_succ,
            WrapperMode::AlwaysSucc => true,
            WrapperMode::AlwaysFail => false,
        };
        // Reason and trace pass through untouched in every mode.
        core.finish_forward(mapped, why, trace);
    }

    fn children(&self) -> Vec<(String, Action)> {
        self.child
            .iter()
            .map(|c| ("0".to_string(), c.clone()))
            .collect()
    }
}

/// Maps its single child's result per [`WrapperMode`], passing reason and
/// trace through unchanged.
pub fn wrapper(lp: &RunLoop, mode: WrapperMode) -> Action {
    Action::from_behavior(
        lp,
        "Wrapper",
        Box::new(WrapperBehavior {
            mode,
            child: None,
            slot: SerialSlot::default(),
        }),
    )
}

/// Negating wrapper with the child already attached.
///
/// The child must not already have a parent; a violation is logged and
/// leaves the wrapper unable to receive the child's completion.
pub fn invert(lp: &RunLoop, child: Action) -> Action {
    let w = Action::from_behavior(
        lp,
        "Wrapper",
        Box::new(WrapperBehavior {
            mode: WrapperMode::Invert,
            child: Some(child.clone()),
            slot: SerialSlot::default(),
        }),
    );
    w.adopt(&child);
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;
    use crate::actions::{function_ext, sequence, FinishCondition};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_invert_negates_but_keeps_reason() {
        let lp = RunLoop::new();
        let inner = function_ext(&lp, || (false, Reason::new(5, "inner")));
        let act = invert(&lp, inner);
        let got = Rc::new(RefCell::new(None));
        let got2 = Rc::clone(&got);
        act.set_finish_callback(Box::new(move |is_succ, why, _| {
            *got2.borrow_mut() = Some((is_succ, why.clone()));
        }));
        act.start();
        lp.drain();
        let (is_succ, why) = got.borrow().clone().unwrap();
        assert!(is_succ);
        assert_eq!(why, Reason::new(5, "inner"));
    }

    #[test]
    fn test_always_fail_overrides_success() {
        let lp = RunLoop::new();
        let act = wrapper(&lp, WrapperMode::AlwaysFail);
        act.set_child(function_ext(&lp, || (true, Reason::default())))
            .unwrap();
        act.start();
        lp.drain();
        assert_eq!(act.result(), ActionResult::Fail);
    }

    #[test]
    fn test_fallback_from_any_succ_and_invert() {
        // The classic behavior-tree fallback: try children until one
        // succeeds, inverting those whose success means "try the next".
        let lp = RunLoop::new();
        let seq = sequence(&lp, FinishCondition::AnySucc);
        let order = Rc::new(RefCell::new(Vec::new()));
        for (name, result) in [("first", true), ("second", false), ("third", false)] {
            let order = Rc::clone(&order);
            let probe = function_ext(&lp, move || {
                order.borrow_mut().push(name);
                (result, Reason::default())
            });
            seq.add_child(invert(&lp, probe)).unwrap();
        }
        seq.start();
        lp.drain();
        assert_eq!(*order.borrow(), vec!["first", "second"]);
        assert_eq!(seq.result(), ActionResult::Success);
    }
}
