//! Two-way conditional.

use crate::action::{Accepted, Action, AttachOp, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct IfElseBehavior {
    cond: Option<Action>,
    on_succ: Option<Action>,
    on_fail: Option<Action>,
    slot: SerialSlot,
}

impl Behavior for IfElseBehavior {
    fn is_ready(&self) -> bool {
        self.cond.is_some() && (self.on_succ.is_some() || self.on_fail.is_some())
    }

    fn accept_child(&mut self, op: AttachOp<'_>, child: Action) -> Result<Accepted, AttachError> {
        let AttachOp::SetAs(role) = op else {
            return Err(AttachError::Unsupported);
        };
        // "then"/"else" are accepted aliases; the canonical roles are the
        // condition's result names.
        let (slot, role) = match role {
            "if" => (&mut self.cond, "if"),
            "succ" | "then" => (&mut self.on_succ, "succ"),
            "fail" | "else" => (&mut self.on_fail, "fail"),
            other => return Err(AttachError::UnsupportedRole(other.to_string())),
        };
        let replaced = slot.replace(child);
        Ok(Accepted::replacing(ChildTag::Role(role.to_string()), replaced))
    }

    fn on_start(&mut self, core: &mut Core) {
        if let Some(cond) = self.cond.clone() {
            self.slot.launch(core, &cond);
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
        for c in [&self.cond, &self.on_succ, &self.on_fail].into_iter().flatten() {
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
        match tag {
            ChildTag::Role(r) if r == "if" => {
                let branch = if is_succ { &self.on_succ } else { &self.on_fail };
                match branch.clone() {
                    Some(b) => {
                        self.slot.launch(core, &b);
                    }
                    // No branch for this outcome: that is a successful
                    // conditional, carrying the condition's reason.
                    None => {
                        core.finish_forward(true, why, trace);
                    }
                }
            }
            _ => {
                core.finish_forward(is_succ, why, trace);
            }
        }
    }

    fn children(&self) -> Vec<(String, Action)> {
        let mut out = Vec::new();
        if let Some(c) = &self.cond {
            out.push(("if".to_string(), c.clone()));
        }
        if let Some(c) = &self.on_succ {
            out.push(("succ".to_string(), c.clone()));
        }
        if let Some(c) = &self.on_fail {
            out.push(("fail".to_string(), c.clone()));
        }
        out
    }
}

/// Runs the `if` child, then the `succ` (alias `then`) child on its success
/// or the `fail` (alias `else`) child on its failure. A missing branch makes
/// the conditional finish immediately with success.
pub fn if_else(lp: &RunLoop) -> Action {
    Action::from_behavior(
        lp,
        "IfElse",
        Box::new(IfElseBehavior {
            cond: None,
            on_succ: None,
            on_fail: None,
            slot: SerialSlot::default(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;
    use crate::actions::function;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn probe(lp: &RunLoop, hit: &Rc<RefCell<bool>>, result: bool) -> Action {
        let hit = Rc::clone(hit);
        function(lp, move || {
            *hit.borrow_mut() = true;
            result
        })
    }

    #[test]
    fn test_success_takes_the_succ_branch() {
        let lp = RunLoop::new();
        let cond = if_else(&lp);
        let took_succ = Rc::new(RefCell::new(false));
        let took_fail = Rc::new(RefCell::new(false));
        cond.set_child_as(function(&lp, || true), "if").unwrap();
        cond.set_child_as(probe(&lp, &took_succ, true), "succ").unwrap();
        cond.set_child_as(probe(&lp, &took_fail, true), "fail").unwrap();

        cond.start();
        lp.drain();
        assert!(*took_succ.borrow());
        assert!(!*took_fail.borrow());
        assert_eq!(cond.result(), ActionResult::Success);
    }

    #[test]
    fn test_failure_takes_the_fail_branch() {
        let lp = RunLoop::new();
        let cond = if_else(&lp);
        let took_fail = Rc::new(RefCell::new(false));
        cond.set_child_as(function(&lp, || false), "if").unwrap();
        cond.set_child_as(probe(&lp, &took_fail, false), "else").unwrap();

        cond.start();
        lp.drain();
        assert!(*took_fail.borrow());
        assert_eq!(cond.result(), ActionResult::Fail);
    }

    #[test]
    fn test_missing_branch_finishes_with_success() {
        let lp = RunLoop::new();
        let cond = if_else(&lp);
        cond.set_child_as(function(&lp, || false), "if").unwrap();
        cond.set_child_as(function(&lp, || true), "then").unwrap();

        cond.start();
        lp.drain();
        assert_eq!(cond.result(), ActionResult::Success);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let lp = RunLoop::new();
        let cond = if_else(&lp);
        let err = cond
            .set_child_as(function(&lp, || true), "maybe")
            .unwrap_err();
        assert!(matches!(err, AttachError::UnsupportedRole(r) if r == "maybe"));
    }
}
