//! # External events.
//!
//! One event shape serves both engines: the [`StateMachine`](crate::fsm::StateMachine)
//! consumes events to drive transitions, and the [`EventPublisher`](crate::publisher::EventPublisher)
//! fans them out to waiting event leaf actions.
//!
//! `id` is the only field either engine dispatches on. `extra` is an opaque
//! payload for guards and handlers; it rides along untouched.

use serde_json::Value;

/// An externally generated signal, identified by an integer id.
///
/// Id `0` is reserved by the state machine as the "any event" wildcard for
/// routes and inline handlers, so real events should use non-zero ids.
#[derive(Clone, Debug, Default)]
pub struct Event {
    pub id: i32,
    pub extra: Option<Value>,
}

impl Event {
    pub fn new(id: i32) -> Self {
        Self { id, extra: None }
    }

    pub fn with_extra(id: i32, extra: Value) -> Self {
        Self {
            id,
            extra: Some(extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_carries_payload() {
        let ev = Event::with_extra(7, json!({"speed": 3}));
        assert_eq!(ev.id, 7);
        assert_eq!(ev.extra.as_ref().unwrap()["speed"], 3);
    }
}
