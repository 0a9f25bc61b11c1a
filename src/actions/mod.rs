//! # The action library: leaves and composites.
//!
//! Leaves do terminal work (run a closure, sleep, wait for an event, finish
//! immediately). Composites own child actions and add branching, looping and
//! aggregation on top of the shared verb contract. Each action is built by a
//! free constructor function returning an [`Action`](crate::Action) handle;
//! children are then attached through the handle's attach capabilities.
//!
//! There is deliberately no fallback composite: compose
//! [`sequence`] in [`FinishCondition::AnySucc`] mode with per-child
//! [`invert`] wrappers instead.

mod assemble;

mod dummy;
mod event;
mod function;
mod sleep;
mod status;

mod composite;
mod if_else;
mod if_then;
mod loops;
mod parallel;
mod random_select;
mod repeat;
mod sequence;
mod switch;
mod wrapper;

pub use dummy::{dummy, DummyHandle};
pub use event::event_action;
pub use function::{function, function_ext};
pub use sleep::{sleep, sleep_with};
pub use status::{fail, succ};

pub use composite::composite;
pub use if_else::if_else;
pub use if_then::if_then;
pub use loops::{loop_action, loop_if};
pub use parallel::parallel;
pub use random_select::{random_select, random_select_with};
pub use repeat::repeat;
pub use sequence::sequence;
pub use switch::switch;
pub use wrapper::{invert, wrapper};

/// When a multi-child composite considers itself done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishCondition {
    /// Run every child to completion; succeed (sequence: forward the last
    /// child's result) once all have finished.
    AllFinish,
    /// Finish with failure as soon as one child fails.
    AnyFail,
    /// Finish with success as soon as one child succeeds.
    AnySucc,
}

/// When a loop composite breaks out of re-execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    /// Never finishes on its own; only `stop()` ends it.
    Forever,
    /// Finish when the child fails.
    UntilFail,
    /// Finish when the child succeeds.
    UntilSucc,
}

/// When a repeat composite breaks before exhausting its count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatMode {
    /// Run all iterations regardless of child results.
    NoBreak,
    /// Break early, forwarding the child's failure.
    BreakFail,
    /// Break early, forwarding the child's success.
    BreakSucc,
}

/// How a wrapper composite post-processes its child's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapperMode {
    /// Pass the result through unchanged.
    Normal,
    /// Negate the result. Reason and trace still pass through.
    Invert,
    AlwaysSucc,
    AlwaysFail,
}
