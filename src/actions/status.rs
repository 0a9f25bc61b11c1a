//! Leaves with a fixed, immediate result.

use crate::action::{Action, Behavior, Core};
use crate::reason::Reason;
use crate::runloop::RunLoop;

struct StatusBehavior {
    is_succ: bool,
}

impl Behavior for StatusBehavior {
    fn on_start(&mut self, core: &mut Core) {
        core.finish(self.is_succ, Reason::default());
    }
}

/// Finishes immediately with success.
pub fn succ(lp: &RunLoop) -> Action {
    Action::from_behavior(lp, "Succ", Box::new(StatusBehavior { is_succ: true }))
}

/// Finishes immediately with failure.
pub fn fail(lp: &RunLoop) -> Action {
    Action::from_behavior(lp, "Fail", Box::new(StatusBehavior { is_succ: false }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;

    #[test]
    fn test_fixed_status_leaves() {
        let lp = RunLoop::new();
        let s = succ(&lp);
        let f = fail(&lp);
        s.start();
        f.start();
        lp.drain();
        assert_eq!(s.result(), ActionResult::Success);
        assert_eq!(f.result(), ActionResult::Fail);
    }
}
