//! # Completion reasons and traces.
//!
//! A [`Reason`] is a `{code, message}` payload that explains why an action
//! finished or blocked. It doubles as the branch-selector key in the switch
//! composite, where the message of the switch child's reason names the case
//! to run.
//!
//! A [`Trace`] is the ordered path a completion took through the tree: every
//! action appends its own [`Who`] entry at the moment it finishes, so the
//! oldest entry is the originating leaf and the newest is the composite that
//! last forwarded the result.

use serde::Serialize;

/// Reason code for a timed-out action.
pub const REASON_ACTION_TIMEOUT: i32 = 1;
/// Reason code used when a composite could not start its child.
pub const REASON_START_CHILD_FAIL: i32 = 2;
/// Reason code for a repeat composite that ran all of its iterations.
pub const REASON_REPEAT_NO_TIMES: i32 = 3;
/// Reason code for an if/then ladder in which no condition matched.
pub const REASON_IF_THEN_SKIP: i32 = 4;
/// Reason code for a switch whose selector action failed.
pub const REASON_SWITCH_FAIL: i32 = 5;
/// Reason code for a switch with neither a matching case nor a default.
pub const REASON_SWITCH_SKIP: i32 = 6;
/// Reason code for an event leaf that consumed its signal.
pub const REASON_EVENT_DONE: i32 = 7;

/// Why an action finished or blocked.
///
/// `code` is meant for programmatic dispatch, `message` for humans — except in
/// the switch composite, where `message` selects the `case:<label>` child.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Reason {
    pub code: i32,
    pub message: String,
}

impl Reason {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(REASON_ACTION_TIMEOUT, "ActionTimeout")
    }

    pub fn start_child_fail() -> Self {
        Self::new(REASON_START_CHILD_FAIL, "StartChildFail")
    }

    pub fn repeat_no_times() -> Self {
        Self::new(REASON_REPEAT_NO_TIMES, "RepeatNoTimes")
    }

    pub fn if_then_skip() -> Self {
        Self::new(REASON_IF_THEN_SKIP, "IfThenSkip")
    }

    pub fn switch_fail() -> Self {
        Self::new(REASON_SWITCH_FAIL, "SwitchFail")
    }

    pub fn switch_skip() -> Self {
        Self::new(REASON_SWITCH_SKIP, "SwitchSkip")
    }

    pub fn event_done() -> Self {
        Self::new(REASON_EVENT_DONE, "EventDone")
    }
}

/// Identity of one node on a completion path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Who {
    pub id: u32,
    pub kind: &'static str,
    pub label: String,
}

/// Ordered completion path, leaf first.
pub type Trace = Vec<Who>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_reasons_are_stable() {
        assert_eq!(Reason::timeout().code, REASON_ACTION_TIMEOUT);
        assert_eq!(Reason::timeout().message, "ActionTimeout");
        assert_eq!(Reason::repeat_no_times().message, "RepeatNoTimes");
        assert_eq!(Reason::switch_skip().code, REASON_SWITCH_SKIP);
    }

    #[test]
    fn test_default_reason_is_empty() {
        let why = Reason::default();
        assert_eq!(why.code, 0);
        assert!(why.message.is_empty());
    }
}
