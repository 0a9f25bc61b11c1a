//! # Narrow pub-sub for external signals.
//!
//! [`EventPublisher`] fans an [`Event`] out to its subscribers until one
//! consumes it. Subscribers are iterated newest-first, so the most recently
//! armed waiter gets the first claim on a signal.
//!
//! Publishing snapshots the subscriber list before dispatch and re-checks
//! each subscriber's membership just before calling it, so a callback may
//! subscribe or unsubscribe (itself included) mid-publish without skipping or
//! double-delivering.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::Event;

/// Subscription handle, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubId(u64);

type SubscriberFn = Rc<RefCell<dyn FnMut(&Event) -> bool>>;

struct PubInner {
    next_id: u64,
    // Insertion order; publish walks it back to front.
    subs: Vec<(SubId, SubscriberFn)>,
}

/// Cheaply cloneable handle to one signal channel.
#[derive(Clone)]
pub struct EventPublisher {
    inner: Rc<RefCell<PubInner>>,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(PubInner {
                next_id: 1,
                subs: Vec::new(),
            })),
        }
    }

    /// Registers a subscriber. Return `true` from the callback to consume the
    /// event and stop further fan-out.
    pub fn subscribe(&self, cb: impl FnMut(&Event) -> bool + 'static) -> SubId {
        let mut inner = self.inner.borrow_mut();
        let id = SubId(inner.next_id);
        inner.next_id += 1;
        inner.subs.push((id, Rc::new(RefCell::new(cb))));
        id
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubId) {
        self.inner.borrow_mut().subs.retain(|(sid, _)| *sid != id);
    }

    /// Offers `event` to subscribers, newest first. Returns whether any
    /// subscriber consumed it.
    pub fn publish(&self, event: &Event) -> bool {
        let snapshot: Vec<(SubId, SubscriberFn)> = self
            .inner
            .borrow()
            .subs
            .iter()
            .rev()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();
        for (id, cb) in snapshot {
            let still_subscribed = self
                .inner
                .borrow()
                .subs
                .iter()
                .any(|(sid, _)| *sid == id);
            if !still_subscribed {
                continue;
            }
            if (cb.borrow_mut())(event) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_newest_subscriber_gets_first_claim() {
        let publisher = EventPublisher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        publisher.subscribe(move |_| {
            l1.borrow_mut().push("old");
            false
        });
        publisher.subscribe(move |_| {
            l2.borrow_mut().push("new");
            false
        });
        assert!(!publisher.publish(&Event::new(1)));
        assert_eq!(*log.borrow(), vec!["new", "old"]);
    }

    #[test]
    fn test_consuming_subscriber_stops_fanout() {
        let publisher = EventPublisher::new();
        let hit = Rc::new(RefCell::new(false));
        let hit2 = Rc::clone(&hit);
        publisher.subscribe(move |_| {
            *hit2.borrow_mut() = true;
            false
        });
        publisher.subscribe(|_| true);
        assert!(publisher.publish(&Event::new(1)));
        assert!(!*hit.borrow());
    }

    #[test]
    fn test_unsubscribe_during_publish_is_honored() {
        let publisher = EventPublisher::new();
        let hit = Rc::new(RefCell::new(false));
        let hit2 = Rc::clone(&hit);
        let victim = publisher.subscribe(move |_| {
            *hit2.borrow_mut() = true;
            false
        });
        let p2 = publisher.clone();
        publisher.subscribe(move |_| {
            p2.unsubscribe(victim);
            false
        });
        publisher.publish(&Event::new(1));
        assert!(!*hit.borrow());
    }
}
