//! Leaf that succeeds after a span of virtual time.

use std::time::Duration;

use crate::action::{Action, Behavior, Core};
use crate::reason::Reason;
use crate::runloop::RunLoop;

struct SleepBehavior {
    gen: Box<dyn FnMut() -> Duration>,
}

impl Behavior for SleepBehavior {
    fn on_start(&mut self, core: &mut Core) {
        // The tick timer suspends with its remaining time across pause and
        // resume, so a preempted sleep picks up where it left off.
        let d = (self.gen)();
        core.start_tick(d);
    }

    fn on_tick(&mut self, core: &mut Core) {
        core.finish(true, Reason::default());
    }
}

/// Succeeds after `d` of virtual time.
pub fn sleep(lp: &RunLoop, d: Duration) -> Action {
    sleep_with(lp, move || d)
}

/// Like [`sleep`], but the duration is computed at each start, so the same
/// node can sleep a different span on every loop iteration.
pub fn sleep_with(lp: &RunLoop, gen: impl FnMut() -> Duration + 'static) -> Action {
    Action::from_behavior(lp, "Sleep", Box::new(SleepBehavior { gen: Box::new(gen) }))
}
