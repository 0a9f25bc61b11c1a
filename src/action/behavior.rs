//! # Behavior hooks.
//!
//! The framework owns the action state machine, its timers and its callback
//! bookkeeping entirely; a concrete action contributes only a [`Behavior`].
//! Hooks cannot skip framework bookkeeping because the bookkeeping is not
//! overridable — there is no superclass call to forget.

use crate::action::{Action, Core};
use crate::error::AttachError;
use crate::event::Event;
use crate::reason::{Reason, Trace};

/// Which attach capability a caller invoked.
///
/// Composites are polymorphic over the capability set: each one accepts the
/// operations it understands and rejects the rest with an [`AttachError`].
#[derive(Clone, Copy, Debug)]
pub enum AttachOp<'a> {
    /// `add_child`: append to an ordered child list.
    Append,
    /// `add_child_as(role)`: append under a named role.
    AppendAs(&'a str),
    /// `set_child`: install the single child slot.
    Set,
    /// `set_child_as(role)`: install a named single-child slot.
    SetAs(&'a str),
}

/// Identifies a child within its parent, assigned at attach time and echoed
/// back on every completion the child delivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildTag {
    /// Position in an ordered child list.
    Index(usize),
    /// Named single-child slot ("if", "switch", "case:ok", ...).
    Role(String),
    /// Named slot within an ordered list (the if/then ladder).
    RoleIndex(&'static str, usize),
}

impl ChildTag {
    pub fn index(&self) -> usize {
        match self {
            ChildTag::Index(i) | ChildTag::RoleIndex(_, i) => *i,
            ChildTag::Role(_) => 0,
        }
    }
}

/// Outcome of a successful attach.
pub struct Accepted {
    pub tag: ChildTag,
    /// Previous occupant of a single-child slot, released back to the caller
    /// of the framework so its parent link can be severed before it drops.
    pub replaced: Option<Action>,
}

impl Accepted {
    pub fn new(tag: ChildTag) -> Self {
        Self {
            tag,
            replaced: None,
        }
    }

    pub fn replacing(tag: ChildTag, replaced: Option<Action>) -> Self {
        Self { tag, replaced }
    }
}

/// Pure behavior of one action node.
///
/// All hooks run on the loop thread with the framework state already updated
/// or about to be updated around them; they may drive children, finish or
/// block the action through [`Core`], but never re-enter their own verbs.
pub trait Behavior: 'static {
    /// Setup-time readiness check; `start()` refuses until this holds
    /// (e.g. "all required children attached").
    fn is_ready(&self) -> bool {
        true
    }

    /// Offered a child through one of the attach capabilities. Store the
    /// handle and return its tag, or reject the operation.
    fn accept_child(&mut self, _op: AttachOp<'_>, _child: Action) -> Result<Accepted, AttachError> {
        Err(AttachError::Unsupported)
    }

    fn on_start(&mut self, _core: &mut Core) {}
    fn on_pause(&mut self, _core: &mut Core) {}
    fn on_resume(&mut self, _core: &mut Core) {}
    fn on_stop(&mut self, _core: &mut Core) {}
    fn on_reset(&mut self, _core: &mut Core) {}

    /// Runs synchronously after this action finished (the external finish
    /// callback is delivered on a later loop turn).
    fn on_finished(&mut self, _core: &mut Core, _is_succ: bool) {}

    /// The timeout timer fired while Running. Default: fail the action.
    fn on_timeout(&mut self, core: &mut Core) {
        core.finish(false, Reason::timeout());
    }

    /// The behavior-owned tick timer (see [`Core::start_tick`]) fired.
    fn on_tick(&mut self, _core: &mut Core) {}

    /// A published event reached this action while Running. Return `true`
    /// to consume it and stop further fan-out.
    fn on_signal(&mut self, _core: &mut Core, _event: &Event) -> bool {
        false
    }

    /// A child completed. Only delivered while Running; completions that
    /// arrive during Pause are buffered and replayed on resume.
    fn on_child_finished(
        &mut self,
        _core: &mut Core,
        _tag: &ChildTag,
        _is_succ: bool,
        _why: Reason,
        _trace: Trace,
    ) {
    }

    /// A child blocked awaiting an external signal. Default: propagate the
    /// block upward, pausing this level too.
    fn on_child_blocked(&mut self, core: &mut Core, _tag: &ChildTag, why: Reason, trace: Trace) {
        core.block_forward(why, trace);
    }

    /// Child handles for introspection, as `(slot, handle)` pairs.
    fn children(&self) -> Vec<(String, Action)> {
        Vec::new()
    }
}
