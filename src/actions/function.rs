//! Leaf that runs a closure and finishes immediately with its result.

use crate::action::{Action, Behavior, Core};
use crate::reason::Reason;
use crate::runloop::RunLoop;

struct FunctionBehavior {
    func: Box<dyn FnMut() -> (bool, Reason)>,
}

impl Behavior for FunctionBehavior {
    fn on_start(&mut self, core: &mut Core) {
        let (is_succ, why) = (self.func)();
        core.finish(is_succ, why);
    }
}

/// Runs `f` once on start; its return value is the action's result.
pub fn function(lp: &RunLoop, mut f: impl FnMut() -> bool + 'static) -> Action {
    function_ext(lp, move || (f(), Reason::default()))
}

/// Like [`function`], but the closure also supplies the completion [`Reason`]
/// (which is what a switch selector child wants to produce).
pub fn function_ext(lp: &RunLoop, f: impl FnMut() -> (bool, Reason) + 'static) -> Action {
    Action::from_behavior(
        lp,
        "Function",
        Box::new(FunctionBehavior { func: Box::new(f) }),
    )
}
