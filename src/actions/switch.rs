//! Multi-way dispatch keyed by a selector's completion reason.

use std::collections::BTreeMap;

use crate::action::{Accepted, Action, AttachOp, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct SwitchBehavior {
    selector: Option<Action>,
    cases: BTreeMap<String, Action>,
    default: Option<Action>,
    slot: SerialSlot,
}

impl Behavior for SwitchBehavior {
    fn is_ready(&self) -> bool {
        let Some(selector) = &self.selector else {
            return false;
        };
        if self.cases.is_empty() && self.default.is_none() {
            return false;
        }
        selector.is_ready()
            && self.cases.values().all(|c| c.is_ready())
            && self.default.as_ref().map_or(true, |c| c.is_ready())
    }

    fn accept_child(&mut self, op: AttachOp<'_>, child: Action) -> Result<Accepted, AttachError> {
        let AttachOp::SetAs(role) = op else {
            return Err(AttachError::Unsupported);
        };
        if role == "switch" {
            let replaced = self.selector.replace(child);
            Ok(Accepted::replacing(ChildTag::Role(role.to_string()), replaced))
        } else if role == "default" {
            let replaced = self.default.replace(child);
            Ok(Accepted::replacing(ChildTag::Role(role.to_string()), replaced))
        } else if role.starts_with("case:") {
            if self.cases.contains_key(role) {
                return Err(AttachError::DuplicateCase(role.to_string()));
            }
            self.cases.insert(role.to_string(), child);
            Ok(Accepted::new(ChildTag::Role(role.to_string())))
        } else {
            Err(AttachError::UnsupportedRole(role.to_string()))
        }
    }

    fn on_start(&mut self, core: &mut Core) {
        if let Some(selector) = self.selector.clone() {
            self.slot.launch(core, &selector);
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
        if let Some(c) = &self.selector {
            c.reset();
        }
        if let Some(c) = &self.default {
            c.reset();
        }
        for c in self.cases.values() {
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
            ChildTag::Role(r) if r == "switch" => {
                if !is_succ {
                    core.finish(false, Reason::switch_fail());
                    return;
                }
                // The selector's reason message names the case to run, e.g.
                // "case:ok"; an unknown message falls back to "default".
                let target = self.cases.get(&why.message).or(self.default.as_ref()).cloned();
                match target {
                    Some(child) => {
                        self.slot.launch(core, &child);
                    }
                    None => {
                        core.finish(false, Reason::switch_skip());
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
        if let Some(c) = &self.selector {
            out.push(("switch".to_string(), c.clone()));
        }
        for (role, c) in &self.cases {
            out.push((role.clone(), c.clone()));
        }
        if let Some(c) = &self.default {
            out.push(("default".to_string(), c.clone()));
        }
        out
    }
}

/// Runs the `switch` child; on its success dispatches by its reason message
/// to the matching `case:<label>` child, else to `default`. The selected
/// child's result becomes the switch's result. Fails with
/// [`Reason::switch_fail`] when the selector fails and
/// [`Reason::switch_skip`] when nothing matches and no default exists.
///
/// Children attach via `set_child_as` with roles `"switch"`, `"case:<label>"`
/// and `"default"`.
pub fn switch(lp: &RunLoop) -> Action {
    Action::from_behavior(
        lp,
        "Switch",
        Box::new(SwitchBehavior {
            selector: None,
            cases: BTreeMap::new(),
            default: None,
            slot: SerialSlot::default(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;
    use crate::actions::{function, function_ext};
    use crate::reason::{REASON_SWITCH_FAIL, REASON_SWITCH_SKIP};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn probe(lp: &RunLoop, hit: &Rc<RefCell<bool>>) -> Action {
        let hit = Rc::clone(hit);
        function(lp, move || {
            *hit.borrow_mut() = true;
            true
        })
    }

    #[test]
    fn test_dispatches_to_matching_case() {
        let lp = RunLoop::new();
        let sw = switch(&lp);
        let a = Rc::new(RefCell::new(false));
        let b = Rc::new(RefCell::new(false));
        sw.set_child_as(
            function_ext(&lp, || (true, Reason::new(0, "case:b"))),
            "switch",
        )
        .unwrap();
        sw.set_child_as(probe(&lp, &a), "case:a").unwrap();
        sw.set_child_as(probe(&lp, &b), "case:b").unwrap();

        sw.start();
        lp.drain();
        assert!(!*a.borrow());
        assert!(*b.borrow());
        assert_eq!(sw.result(), ActionResult::Success);
    }

    #[test]
    fn test_unknown_case_falls_back_to_default() {
        let lp = RunLoop::new();
        let sw = switch(&lp);
        let fallback = Rc::new(RefCell::new(false));
        sw.set_child_as(
            function_ext(&lp, || (true, Reason::new(0, "case:zzz"))),
            "switch",
        )
        .unwrap();
        sw.set_child_as(probe(&lp, &fallback), "default").unwrap();

        sw.start();
        lp.drain();
        assert!(*fallback.borrow());
    }

    #[test]
    fn test_no_match_and_no_default_skips() {
        let lp = RunLoop::new();
        let sw = switch(&lp);
        sw.set_child_as(
            function_ext(&lp, || (true, Reason::new(0, "case:zzz"))),
            "switch",
        )
        .unwrap();
        sw.set_child_as(function(&lp, || true), "case:a").unwrap();
        let why = Rc::new(RefCell::new(None));
        let why2 = Rc::clone(&why);
        sw.set_finish_callback(Box::new(move |_, r, _| {
            *why2.borrow_mut() = Some(r.code);
        }));

        sw.start();
        lp.drain();
        assert_eq!(sw.result(), ActionResult::Fail);
        assert_eq!(*why.borrow(), Some(REASON_SWITCH_SKIP));
    }

    #[test]
    fn test_failing_selector_fails_the_switch() {
        let lp = RunLoop::new();
        let sw = switch(&lp);
        sw.set_child_as(function(&lp, || false), "switch").unwrap();
        sw.set_child_as(function(&lp, || true), "default").unwrap();
        let why = Rc::new(RefCell::new(None));
        let why2 = Rc::clone(&why);
        sw.set_finish_callback(Box::new(move |_, r, _| {
            *why2.borrow_mut() = Some(r.code);
        }));

        sw.start();
        lp.drain();
        assert_eq!(*why.borrow(), Some(REASON_SWITCH_FAIL));
    }

    #[test]
    fn test_duplicate_case_is_rejected() {
        let lp = RunLoop::new();
        let sw = switch(&lp);
        sw.set_child_as(function(&lp, || true), "case:a").unwrap();
        let err = sw
            .set_child_as(function(&lp, || true), "case:a")
            .unwrap_err();
        assert!(matches!(err, AttachError::DuplicateCase(r) if r == "case:a"));
    }
}
