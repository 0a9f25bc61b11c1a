//! Leaf that waits for a published event.

use crate::action::{Action, Behavior, Core};
use crate::event::Event;
use crate::publisher::{EventPublisher, SubId};
use crate::reason::Reason;
use crate::runloop::RunLoop;

struct EventBehavior {
    publisher: EventPublisher,
    matcher: Box<dyn FnMut(&Event) -> Option<bool>>,
    sub: Option<SubId>,
}

impl EventBehavior {
    fn unsubscribe(&mut self) {
        if let Some(id) = self.sub.take() {
            self.publisher.unsubscribe(id);
        }
    }
}

impl Behavior for EventBehavior {
    fn on_start(&mut self, core: &mut Core) {
        let weak = core.weak();
        // Delivery is gated on Running inside the router, so events published
        // while this leaf is paused pass it by.
        self.sub = Some(
            self.publisher
                .subscribe(move |ev| Action::deliver_signal(&weak, ev)),
        );
    }

    fn on_signal(&mut self, core: &mut Core, event: &Event) -> bool {
        match (self.matcher)(event) {
            Some(is_succ) => {
                core.finish(is_succ, Reason::event_done());
                true
            }
            None => false,
        }
    }

    fn on_finished(&mut self, _core: &mut Core, _is_succ: bool) {
        self.unsubscribe();
    }

    fn on_stop(&mut self, _core: &mut Core) {
        self.unsubscribe();
    }

    fn on_reset(&mut self, _core: &mut Core) {
        self.unsubscribe();
    }
}

/// Waits until `matcher` accepts a published event, then finishes with the
/// result the matcher returns. `None` leaves the leaf waiting.
pub fn event_action(
    lp: &RunLoop,
    publisher: &EventPublisher,
    matcher: impl FnMut(&Event) -> Option<bool> + 'static,
) -> Action {
    Action::from_behavior(
        lp,
        "Event",
        Box::new(EventBehavior {
            publisher: publisher.clone(),
            matcher: Box::new(matcher),
            sub: None,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionResult, ActionState};
    use crate::reason::REASON_EVENT_DONE;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_waits_for_matching_event() {
        let lp = RunLoop::new();
        let publisher = EventPublisher::new();
        let act = event_action(&lp, &publisher, |ev| (ev.id == 7).then_some(true));
        let why = Rc::new(RefCell::new(None));
        let why2 = Rc::clone(&why);
        act.set_finish_callback(Box::new(move |_, r, _| {
            *why2.borrow_mut() = Some(r.clone());
        }));

        act.start();
        assert!(!publisher.publish(&Event::new(3)));
        assert_eq!(act.state(), ActionState::Running);

        assert!(publisher.publish(&Event::new(7)));
        lp.drain();
        assert_eq!(act.result(), ActionResult::Success);
        assert_eq!(why.borrow().as_ref().unwrap().code, REASON_EVENT_DONE);
    }

    #[test]
    fn test_paused_waiter_ignores_events() {
        let lp = RunLoop::new();
        let publisher = EventPublisher::new();
        let act = event_action(&lp, &publisher, |_| Some(true));
        act.start();
        act.pause();
        assert!(!publisher.publish(&Event::new(1)));
        assert_eq!(act.state(), ActionState::Pause);

        act.resume();
        assert!(publisher.publish(&Event::new(1)));
        lp.drain();
        assert_eq!(act.state(), ActionState::Finished);
    }

    #[test]
    fn test_stop_unsubscribes() {
        let lp = RunLoop::new();
        let publisher = EventPublisher::new();
        let act = event_action(&lp, &publisher, |_| Some(true));
        act.start();
        act.stop();
        assert!(!publisher.publish(&Event::new(1)));
        assert_eq!(act.state(), ActionState::Stopped);
    }
}
