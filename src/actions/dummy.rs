//! Externally-driven leaf, mainly for tests and embedders.
//!
//! A dummy never finishes by itself. The paired [`DummyHandle`] lets the
//! caller finish or block it at a moment of their choosing, and exposes verb
//! counters so tests can assert how the framework drove the node.

use std::cell::Cell;
use std::rc::Rc;

use crate::action::{Action, Behavior, Core, WeakInner};
use crate::reason::Reason;
use crate::runloop::RunLoop;

#[derive(Default)]
struct Counters {
    started: Cell<u32>,
    stopped: Cell<u32>,
    paused: Cell<u32>,
    resumed: Cell<u32>,
}

struct DummyBehavior {
    counters: Rc<Counters>,
}

impl Behavior for DummyBehavior {
    fn on_start(&mut self, _core: &mut Core) {
        self.counters.started.set(self.counters.started.get() + 1);
    }

    fn on_stop(&mut self, _core: &mut Core) {
        self.counters.stopped.set(self.counters.stopped.get() + 1);
    }

    fn on_pause(&mut self, _core: &mut Core) {
        self.counters.paused.set(self.counters.paused.get() + 1);
    }

    fn on_resume(&mut self, _core: &mut Core) {
        self.counters.resumed.set(self.counters.resumed.get() + 1);
    }
}

/// Remote control for a [`dummy`] action.
pub struct DummyHandle {
    weak: WeakInner,
    counters: Rc<Counters>,
}

impl DummyHandle {
    /// Finishes the action with a default reason. Ignored if the action has
    /// already ended or was dropped.
    pub fn emit_finish(&self, is_succ: bool) {
        self.emit_finish_with(is_succ, Reason::default());
    }

    pub fn emit_finish_with(&self, is_succ: bool, why: Reason) {
        Action::finish_external(&self.weak, is_succ, why);
    }

    /// Blocks the action, as a leaf awaiting an external signal would.
    pub fn emit_block(&self, why: Reason) {
        Action::block_external(&self.weak, why);
    }

    pub fn started_times(&self) -> u32 {
        self.counters.started.get()
    }

    pub fn stopped_times(&self) -> u32 {
        self.counters.stopped.get()
    }

    pub fn paused_times(&self) -> u32 {
        self.counters.paused.get()
    }

    pub fn resumed_times(&self) -> u32 {
        self.counters.resumed.get()
    }
}

/// Creates a dummy action and its control handle.
pub fn dummy(lp: &RunLoop) -> (Action, DummyHandle) {
    let counters = Rc::new(Counters::default());
    let act = Action::from_behavior(
        lp,
        "Dummy",
        Box::new(DummyBehavior {
            counters: Rc::clone(&counters),
        }),
    );
    let handle = DummyHandle {
        weak: Rc::downgrade(&act.0),
        counters,
    };
    (act, handle)
}
