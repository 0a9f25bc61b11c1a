//! If/elseif ladder of (condition, body) pairs.

use crate::action::{Accepted, Action, AttachOp, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct IfThenBehavior {
    pairs: Vec<(Action, Action)>,
    // An "if" waiting for its "then"; attaches must alternate.
    tmp_if: Option<Action>,
    slot: SerialSlot,
}

impl IfThenBehavior {
    fn try_pair(&mut self, core: &mut Core, at: usize) {
        match self.pairs.get(at) {
            Some((cond, _)) => {
                let cond = cond.clone();
                self.slot.launch(core, &cond);
            }
            None => {
                core.finish(false, Reason::if_then_skip());
            }
        }
    }
}

impl Behavior for IfThenBehavior {
    fn is_ready(&self) -> bool {
        self.tmp_if.is_none()
            && !self.pairs.is_empty()
            && self
                .pairs
                .iter()
                .all(|(cond, body)| cond.is_ready() && body.is_ready())
    }

    fn accept_child(&mut self, op: AttachOp<'_>, child: Action) -> Result<Accepted, AttachError> {
        let AttachOp::AppendAs(role) = op else {
            return Err(AttachError::Unsupported);
        };
        match role {
            "if" => {
                if self.tmp_if.is_some() {
                    return Err(AttachError::PairIncomplete { expected: "then" });
                }
                self.tmp_if = Some(child);
                Ok(Accepted::new(ChildTag::RoleIndex("if", self.pairs.len())))
            }
            "then" => match self.tmp_if.take() {
                Some(cond) => {
                    self.pairs.push((cond, child));
                    Ok(Accepted::new(ChildTag::RoleIndex(
                        "then",
                        self.pairs.len() - 1,
                    )))
                }
                None => Err(AttachError::PairIncomplete { expected: "if" }),
            },
            other => Err(AttachError::UnsupportedRole(other.to_string())),
        }
    }

    fn on_start(&mut self, core: &mut Core) {
        self.try_pair(core, 0);
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
        for (cond, body) in &self.pairs {
            cond.reset();
            body.reset();
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
            ChildTag::RoleIndex("if", i) => {
                if is_succ {
                    if let Some((_, body)) = self.pairs.get(*i) {
                        let body = body.clone();
                        self.slot.launch(core, &body);
                    }
                } else {
                    self.try_pair(core, i + 1);
                }
            }
            _ => {
                core.finish_forward(is_succ, why, trace);
            }
        }
    }

    fn children(&self) -> Vec<(String, Action)> {
        let mut out = Vec::new();
        for (i, (cond, body)) in self.pairs.iter().enumerate() {
            out.push((format!("{i:02}.if"), cond.clone()));
            out.push((format!("{i:02}.then"), body.clone()));
        }
        out
    }
}

/// Tries each `if` child in attach order; the first success runs its paired
/// `then` child and finishes the ladder with that child's result. If no
/// condition matches, fails with [`Reason::if_then_skip`].
///
/// Children attach via `add_child_as` with alternating `"if"`/`"then"` roles.
pub fn if_then(lp: &RunLoop) -> Action {
    Action::from_behavior(
        lp,
        "IfThen",
        Box::new(IfThenBehavior {
            pairs: Vec::new(),
            tmp_if: None,
            slot: SerialSlot::default(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;
    use crate::actions::function;
    use crate::reason::REASON_IF_THEN_SKIP;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_first_truthy_branch_runs_its_then() {
        let lp = RunLoop::new();
        let ladder = if_then(&lp);
        let ran = Rc::new(RefCell::new(Vec::new()));
        for (i, cond) in [false, true, true].into_iter().enumerate() {
            ladder.add_child_as(function(&lp, move || cond), "if").unwrap();
            let ran = Rc::clone(&ran);
            ladder
                .add_child_as(
                    function(&lp, move || {
                        ran.borrow_mut().push(i);
                        true
                    }),
                    "then",
                )
                .unwrap();
        }
        ladder.start();
        lp.drain();
        assert_eq!(*ran.borrow(), vec![1]);
        assert_eq!(ladder.result(), ActionResult::Success);
    }

    #[test]
    fn test_no_match_fails_with_skip_reason() {
        let lp = RunLoop::new();
        let ladder = if_then(&lp);
        ladder.add_child_as(function(&lp, || false), "if").unwrap();
        ladder.add_child_as(function(&lp, || true), "then").unwrap();
        let why = Rc::new(RefCell::new(None));
        let why2 = Rc::clone(&why);
        ladder.set_finish_callback(Box::new(move |_, r, _| {
            *why2.borrow_mut() = Some(r.code);
        }));
        ladder.start();
        lp.drain();
        assert_eq!(ladder.result(), ActionResult::Fail);
        assert_eq!(*why.borrow(), Some(REASON_IF_THEN_SKIP));
    }

    #[test]
    fn test_attach_roles_must_alternate() {
        let lp = RunLoop::new();
        let ladder = if_then(&lp);
        let err = ladder
            .add_child_as(function(&lp, || true), "then")
            .unwrap_err();
        assert!(matches!(err, AttachError::PairIncomplete { expected: "if" }));

        ladder.add_child_as(function(&lp, || true), "if").unwrap();
        let err = ladder
            .add_child_as(function(&lp, || true), "if")
            .unwrap_err();
        assert!(matches!(err, AttachError::PairIncomplete { expected: "then" }));
        // An unpaired "if" leaves the ladder unready.
        assert!(!ladder.is_ready());
    }
}
