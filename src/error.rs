//! # Error types for tree assembly and state machine registration.
//!
//! Setup mistakes are reported through these enums; runtime verb misuse
//! (starting a finished action, pausing an idle one) stays on the boolean
//! path with a warning log, because it must never tear down the process.

use thiserror::Error;

/// Errors raised while attaching children to a composite action.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AttachError {
    /// The child already belongs to another composite. Ownership is exclusive
    /// and tree-shaped; detach never happens, so a second attach is a bug.
    #[error("child is already owned by another composite")]
    AlreadyOwned,

    /// The composite does not support this attach capability at all
    /// (e.g. `add_child` on a single-child wrapper).
    #[error("composite does not support this attach operation")]
    Unsupported,

    /// The composite supports roles, but not this one.
    #[error("unsupported role: {0}")]
    UnsupportedRole(String),

    /// A `case:<label>` role was attached twice with the same label.
    #[error("duplicate switch case: {0}")]
    DuplicateCase(String),

    /// An `if` was attached while the previous `if` still waits for its `then`
    /// (or a `then` arrived with no pending `if`).
    #[error("if/then pair incomplete: expected {expected}")]
    PairIncomplete { expected: &'static str },

    /// An action cannot be attached to itself.
    #[error("cannot attach an action to itself")]
    SelfAttach,
}

/// Errors raised while registering states, routes and handlers on a
/// [`StateMachine`](crate::fsm::StateMachine).
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FsmError {
    /// Topology is frozen once the machine has started.
    #[error("state machine is already running")]
    AlreadyRunning,

    /// A state with this id was created before.
    #[error("state {0} already exists")]
    DuplicateState(i32),

    /// The referenced state was never created.
    #[error("state {0} does not exist")]
    UnknownState(i32),
}
