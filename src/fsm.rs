//! # Hierarchical finite state machine.
//!
//! A [`StateMachine`] is a set of integer-identified states wired together by
//! event-triggered routes. Each state may carry enter/exit actions, inline
//! per-event handlers that pick the next state programmatically, and a nested
//! sub-machine that handles events first while active.
//!
//! ## Event resolution order, per [`StateMachine::run`]
//! 1. An active sub-machine gets the event. If it does not terminate on it,
//!    its verdict stands. If it terminates, it is stopped and the same event
//!    falls through to this machine's own resolution.
//! 2. The current state's inline handler for the exact event id, else its
//!    any-event handler. A handler returning a state id forces that
//!    transition, bypassing routes.
//! 3. Otherwise the state's routes are scanned in registration order; the
//!    first one matching the event id (or registered for any event) whose
//!    guard passes is taken. Registration order is the tie-break.
//!
//! A taken transition runs exit action, route action, enter action, then the
//! state-changed callback, and finally starts a sub-machine of the new state
//! and offers it the same event.
//!
//! State id 0 ([`STATE_TERM`]) is the terminal state and always exists;
//! routing to it terminates the machine. Mutating verbs take `&mut self`, so
//! callbacks cannot re-enter the machine they are registered on; machines
//! shared through [`StateMachineRef`] must not call back into themselves
//! from inside a callback.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::FsmError;
use crate::event::Event;

pub type StateId = i32;
pub type EventId = i32;

/// The built-in terminal state.
pub const STATE_TERM: StateId = 0;
/// "No state": returned by accessors when there is no meaningful state.
pub const STATE_NULL: StateId = -1;
/// Wildcard event id for routes and handlers that match any event.
pub const EVENT_ANY: EventId = 0;

/// Enter, exit and route actions.
pub type ActionFn = Box<dyn FnMut(&Event)>;
/// Route guard; the route is taken only if it returns true.
pub type GuardFn = Box<dyn FnMut(&Event) -> bool>;
/// Inline event handler; returning `Some(id)` forces a transition to `id`.
pub type EventFn = Box<dyn FnMut(&Event) -> Option<StateId>>;
/// Observer of every taken transition: `(from, to, event)`.
pub type StateChangedFn = Box<dyn FnMut(StateId, StateId, &Event)>;

/// Shared handle used to nest one machine inside another.
pub type StateMachineRef = Rc<RefCell<StateMachine>>;

struct Route {
    event_id: EventId,
    next_state_id: StateId,
    guard: Option<GuardFn>,
    action: Option<ActionFn>,
    label: String,
}

struct State {
    label: String,
    enter_action: Option<ActionFn>,
    exit_action: Option<ActionFn>,
    sub_sm: Option<Weak<RefCell<StateMachine>>>,
    routes: Vec<Route>,
    events: HashMap<EventId, EventFn>,
    any_event: Option<EventFn>,
}

impl State {
    fn new(label: String) -> Self {
        Self {
            label,
            enter_action: None,
            exit_action: None,
            sub_sm: None,
            routes: Vec::new(),
            events: HashMap::new(),
            any_event: None,
        }
    }
}

/// Event-driven state transition engine. See the module docs for the event
/// resolution order.
pub struct StateMachine {
    name: String,
    init_state: StateId,
    running: bool,
    last: StateId,
    curr: StateId,
    next: StateId,
    states: BTreeMap<StateId, State>,
    state_changed_cb: Option<StateChangedFn>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            init_state: STATE_NULL,
            running: false,
            last: STATE_NULL,
            curr: STATE_NULL,
            next: STATE_NULL,
            states: BTreeMap::new(),
            state_changed_cb: None,
        }
    }

    /// Name used in log lines, helpful with nested machines.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ---- setup ---------------------------------------------------------------

    /// Registers a state. The first registered state becomes the initial
    /// state unless [`StateMachine::set_init_state`] overrides it.
    pub fn new_state(
        &mut self,
        state_id: StateId,
        label: impl Into<String>,
    ) -> Result<(), FsmError> {
        self.check_not_running()?;
        if self.states.contains_key(&state_id) {
            return Err(FsmError::DuplicateState(state_id));
        }
        self.states.insert(state_id, State::new(label.into()));
        if self.init_state == STATE_NULL {
            self.init_state = state_id;
        }
        Ok(())
    }

    pub fn set_enter_action(
        &mut self,
        state_id: StateId,
        action: impl FnMut(&Event) + 'static,
    ) -> Result<(), FsmError> {
        self.check_not_running()?;
        self.state_mut(state_id)?.enter_action = Some(Box::new(action));
        Ok(())
    }

    pub fn set_exit_action(
        &mut self,
        state_id: StateId,
        action: impl FnMut(&Event) + 'static,
    ) -> Result<(), FsmError> {
        self.check_not_running()?;
        self.state_mut(state_id)?.exit_action = Some(Box::new(action));
        Ok(())
    }

    /// Registers an unguarded transition from `from` to `to` on `event_id`
    /// ([`EVENT_ANY`] matches every event).
    pub fn add_route(
        &mut self,
        from: StateId,
        event_id: EventId,
        to: StateId,
        label: impl Into<String>,
    ) -> Result<(), FsmError> {
        self.add_route_full(from, event_id, to, None, None, label)
    }

    pub fn add_guarded_route(
        &mut self,
        from: StateId,
        event_id: EventId,
        to: StateId,
        guard: impl FnMut(&Event) -> bool + 'static,
        label: impl Into<String>,
    ) -> Result<(), FsmError> {
        self.add_route_full(from, event_id, to, Some(Box::new(guard)), None, label)
    }

    /// Full route form, with optional guard and transition action.
    pub fn add_route_full(
        &mut self,
        from: StateId,
        event_id: EventId,
        to: StateId,
        guard: Option<GuardFn>,
        action: Option<ActionFn>,
        label: impl Into<String>,
    ) -> Result<(), FsmError> {
        self.check_not_running()?;
        if to != STATE_TERM && !self.states.contains_key(&to) {
            return Err(FsmError::UnknownState(to));
        }
        self.state_mut(from)?.routes.push(Route {
            event_id,
            next_state_id: to,
            guard,
            action,
            label: label.into(),
        });
        Ok(())
    }

    /// Installs an inline handler for `event_id` on `state_id`;
    /// [`EVENT_ANY`] installs the state's wildcard handler.
    pub fn add_event(
        &mut self,
        state_id: StateId,
        event_id: EventId,
        handler: impl FnMut(&Event) -> Option<StateId> + 'static,
    ) -> Result<(), FsmError> {
        self.check_not_running()?;
        let state = self.state_mut(state_id)?;
        if event_id == EVENT_ANY {
            state.any_event = Some(Box::new(handler));
        } else {
            state.events.insert(event_id, Box::new(handler));
        }
        Ok(())
    }

    pub fn set_init_state(&mut self, state_id: StateId) -> Result<(), FsmError> {
        self.check_not_running()?;
        self.init_state = state_id;
        Ok(())
    }

    /// Nests `sub` under `state_id`. The parent holds only a weak reference;
    /// the caller keeps the sub-machine alive.
    pub fn set_sub_machine(
        &mut self,
        state_id: StateId,
        sub: &StateMachineRef,
    ) -> Result<(), FsmError> {
        self.check_not_running()?;
        self.state_mut(state_id)?.sub_sm = Some(Rc::downgrade(sub));
        Ok(())
    }

    pub fn set_state_changed_callback(
        &mut self,
        cb: impl FnMut(StateId, StateId, &Event) + 'static,
    ) {
        self.state_changed_cb = Some(Box::new(cb));
    }

    // ---- runtime -------------------------------------------------------------

    /// Enters the initial state (running its enter action with a null event)
    /// and starts its sub-machine if it has one.
    pub fn start(&mut self) -> bool {
        if self.running {
            warn!("[{}]: already started", self.name);
            return false;
        }
        if !self.states.contains_key(&self.init_state) {
            warn!("[{}]: init state {} not registered", self.name, self.init_state);
            return false;
        }
        self.running = true;
        self.curr = self.init_state;
        debug!("[{}]: started in state {}", self.name, self.curr);

        let null_event = Event::new(0);
        if let Some(state) = self.states.get_mut(&self.curr) {
            if let Some(enter) = state.enter_action.as_mut() {
                enter(&null_event);
            }
        }
        self.with_sub_of(self.curr, |sub| {
            sub.start();
        });
        true
    }

    /// Runs the current state's exit action and leaves the running state.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        let null_event = Event::new(0);
        if let Some(state) = self.states.get_mut(&self.curr) {
            if let Some(exit) = state.exit_action.as_mut() {
                exit(&null_event);
            }
        }
        debug!("[{}]: stopped", self.name);
        self.curr = STATE_NULL;
        self.running = false;
    }

    pub fn restart(&mut self) -> bool {
        self.stop();
        self.start()
    }

    /// Offers one event; returns whether it caused a transition (or was
    /// handled by an active sub-machine).
    pub fn run(&mut self, event: &Event) -> bool {
        if !self.running {
            warn!("[{}]: not started", self.name);
            return false;
        }

        // Active sub-machine first. Termination hands the same event back to
        // this machine's own routes.
        let mut delegated = None;
        self.with_sub_of(self.curr, |sub| {
            let ret = sub.run(event);
            if sub.is_terminated() {
                sub.stop();
            } else {
                delegated = Some(ret);
            }
        });
        if let Some(ret) = delegated {
            return ret;
        }

        let mut next_id = STATE_NULL;
        let mut route_idx = None;
        if let Some(state) = self.states.get_mut(&self.curr) {
            if let Some(handler) = state.events.get_mut(&event.id) {
                next_id = handler(event).unwrap_or(STATE_NULL);
            } else if let Some(handler) = state.any_event.as_mut() {
                next_id = handler(event).unwrap_or(STATE_NULL);
            }

            if next_id == STATE_NULL {
                route_idx = state.routes.iter_mut().position(|r| {
                    if r.event_id != EVENT_ANY && r.event_id != event.id {
                        return false;
                    }
                    match r.guard.as_mut() {
                        Some(guard) => guard(event),
                        None => true,
                    }
                });
                match route_idx {
                    Some(i) => next_id = state.routes[i].next_state_id,
                    None => return false,
                }
            }
        } else {
            // Terminal or unregistered state: nothing handles events.
            return false;
        }

        if next_id != STATE_TERM && !self.states.contains_key(&next_id) {
            error!("[{}]: handler chose unregistered state {}", self.name, next_id);
            return false;
        }

        self.next = next_id;
        if let Some(state) = self.states.get_mut(&self.curr) {
            if let Some(exit) = state.exit_action.as_mut() {
                exit(event);
            }
        }
        self.last = self.curr;
        self.curr = STATE_NULL;

        if let Some(i) = route_idx {
            if let Some(state) = self.states.get_mut(&self.last) {
                if let Some(action) = state.routes[i].action.as_mut() {
                    action(event);
                }
            }
        }

        self.curr = next_id;
        self.next = STATE_NULL;
        if let Some(state) = self.states.get_mut(&self.curr) {
            if let Some(enter) = state.enter_action.as_mut() {
                enter(event);
            }
        }
        debug!(
            "[{}]: state {} -> {} on event {}",
            self.name, self.last, self.curr, event.id
        );

        if let Some(mut cb) = self.state_changed_cb.take() {
            cb(self.last, self.curr, event);
            if self.state_changed_cb.is_none() {
                self.state_changed_cb = Some(cb);
            }
        }

        // A sub-machine of the just-entered state starts now and sees the
        // same event.
        self.with_sub_of(self.curr, |sub| {
            sub.start();
            sub.run(event);
        });
        true
    }

    pub fn current_state(&self) -> StateId {
        self.curr
    }

    pub fn last_state(&self) -> StateId {
        self.last
    }

    /// Meaningful only from inside an exit or route action, where the
    /// machine is between states.
    pub fn next_state(&self) -> StateId {
        self.next
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_terminated(&self) -> bool {
        self.curr == STATE_TERM
    }

    /// Serializable structural and runtime view, sub-machines included.
    pub fn snapshot(&self) -> FsmSnapshot {
        FsmSnapshot {
            name: self.name.clone(),
            is_running: self.running,
            init_state: self.init_state,
            term_state: STATE_TERM,
            curr_state: (self.curr != STATE_NULL).then_some(self.curr),
            states: self
                .states
                .iter()
                .map(|(&id, s)| FsmStateSnapshot {
                    id,
                    label: s.label.clone(),
                    routes: s
                        .routes
                        .iter()
                        .map(|r| FsmRouteSnapshot {
                            event_id: r.event_id,
                            next_state_id: r.next_state_id,
                            label: r.label.clone(),
                        })
                        .collect(),
                    sub_sm: s
                        .sub_sm
                        .as_ref()
                        .and_then(|w| w.upgrade())
                        .map(|sub| Box::new(sub.borrow().snapshot())),
                })
                .collect(),
        }
    }

    fn check_not_running(&self) -> Result<(), FsmError> {
        if self.running {
            Err(FsmError::AlreadyRunning)
        } else {
            Ok(())
        }
    }

    fn state_mut(&mut self, state_id: StateId) -> Result<&mut State, FsmError> {
        self.states
            .get_mut(&state_id)
            .ok_or(FsmError::UnknownState(state_id))
    }

    fn with_sub_of(&mut self, state_id: StateId, f: impl FnOnce(&mut StateMachine)) {
        let sub = self
            .states
            .get(&state_id)
            .and_then(|s| s.sub_sm.as_ref())
            .and_then(|w| w.upgrade());
        if let Some(sub) = sub {
            f(&mut sub.borrow_mut());
        }
    }
}

#[derive(Serialize)]
pub struct FsmSnapshot {
    pub name: String,
    pub is_running: bool,
    pub init_state: StateId,
    pub term_state: StateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curr_state: Option<StateId>,
    pub states: Vec<FsmStateSnapshot>,
}

#[derive(Serialize)]
pub struct FsmStateSnapshot {
    pub id: StateId,
    pub label: String,
    pub routes: Vec<FsmRouteSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_sm: Option<Box<FsmSnapshot>>,
}

#[derive(Serialize)]
pub struct FsmRouteSnapshot {
    pub event_id: EventId,
    pub next_state_id: StateId,
    pub label: String,
}
