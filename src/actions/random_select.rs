//! Uniform random choice of one child.

use rand::Rng;

use crate::action::{Accepted, Action, AttachOp, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct RandomSelectBehavior {
    children: Vec<Action>,
    // Maps child count to a chosen index; injectable for deterministic tests.
    picker: Box<dyn FnMut(usize) -> usize>,
    slot: SerialSlot,
}

impl Behavior for RandomSelectBehavior {
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
        let pick = (self.picker)(self.children.len()).min(self.children.len() - 1);
        if let Some(child) = self.children.get(pick).cloned() {
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
        for c in &self.children {
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
        core.finish_forward(is_succ, why, trace);
    }

    fn children(&self) -> Vec<(String, Action)> {
        self.children
            .iter()
            .enumerate()
            .map(|(i, c)| (i.to_string(), c.clone()))
            .collect()
    }
}

/// Picks one appended child uniformly at each start and runs only it,
/// forwarding its result.
pub fn random_select(lp: &RunLoop) -> Action {
    random_select_with(lp, |n| rand::thread_rng().gen_range(0..n))
}

/// [`random_select`] with an injected picker, for deterministic choices.
/// The picker receives the child count and returns the index to run.
pub fn random_select_with(lp: &RunLoop, picker: impl FnMut(usize) -> usize + 'static) -> Action {
    Action::from_behavior(
        lp,
        "RandomSelect",
        Box::new(RandomSelectBehavior {
            children: Vec::new(),
            picker: Box::new(picker),
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

    #[test]
    fn test_runs_only_the_picked_child() {
        let lp = RunLoop::new();
        let sel = random_select_with(&lp, |_| 1);
        let ran = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let ran = Rc::clone(&ran);
            sel.add_child(function(&lp, move || {
                ran.borrow_mut().push(i);
                true
            }))
            .unwrap();
        }
        sel.start();
        lp.drain();
        assert_eq!(*ran.borrow(), vec![1]);
        assert_eq!(sel.result(), ActionResult::Success);
    }

    #[test]
    fn test_default_picker_stays_in_bounds() {
        let lp = RunLoop::new();
        let sel = random_select(&lp);
        sel.add_child(function(&lp, || true)).unwrap();
        sel.add_child(function(&lp, || true)).unwrap();
        sel.start();
        lp.drain();
        assert_eq!(sel.result(), ActionResult::Success);
    }
}
