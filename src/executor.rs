//! # Priority-queued scheduler for independent action trees.
//!
//! [`ActionExecutor`] owns root actions accepted via [`ActionExecutor::append`]
//! and drives them to completion one at a time, highest priority first.
//! Preemption pauses, it never cancels: when an urgent action arrives while a
//! normal one is mid-flight, the running action is paused and later resumed
//! from where it left off.
//!
//! ## Scheduling pass
//! Each pass finds the highest-priority non-empty queue, pauses the running
//! head of a lower-priority queue if one is in flight, then drains the ready
//! queue's head: an Idle head is started (removed on start refusal), a paused
//! head resumed, a Finished/Stopped head removed with its `finished` callback
//! fired. The pass ends when a head is left Running or every queue is empty
//! (firing `all_finished`).
//!
//! ## Rules
//! - A single dispatch guard covers the whole pass, callbacks included.
//!   `append`/`cancel*` called from inside a callback (or from an action
//!   started synchronously by the pass) do not re-enter: they mark the pass
//!   pending and it re-runs after the current one completes.
//! - Executor callbacks observe the post-pass queue state, not mid-pass
//!   snapshots.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::debug;

use crate::action::{Action, ActionState};
use crate::runloop::RunLoop;
use crate::vars::Vars;

/// Ticket identifying an appended root action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(u64);

/// Queue priorities, highest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Urgent,
    Normal,
    Low,
}

impl Priority {
    fn index(self) -> usize {
        match self {
            Priority::Urgent => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

struct Slot {
    id: ActionId,
    action: Action,
}

struct ExecInner {
    vars: Vars,
    next_id: u64,
    queues: [VecDeque<Slot>; 3],
    // Queue whose head is the in-flight action, if any.
    curr_queue: Option<usize>,
    dispatching: bool,
    pending: bool,
    started_cb: Option<Box<dyn FnMut(ActionId)>>,
    finished_cb: Option<Box<dyn FnMut(ActionId)>>,
    all_finished_cb: Option<Box<dyn FnMut()>>,
}

/// Single-threaded priority scheduler over three FIFO queues.
pub struct ActionExecutor {
    lp: RunLoop,
    inner: Rc<RefCell<ExecInner>>,
}

impl ActionExecutor {
    pub fn new(lp: &RunLoop) -> Self {
        Self {
            lp: lp.clone(),
            inner: Rc::new(RefCell::new(ExecInner {
                vars: Vars::new(),
                next_id: 1,
                queues: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
                curr_queue: None,
                dispatching: false,
                pending: false,
                started_cb: None,
                finished_cb: None,
                all_finished_cb: None,
            })),
        }
    }

    /// The executor's root variable scope; every appended tree resolves
    /// variables through it.
    pub fn vars(&self) -> Vars {
        self.inner.borrow().vars.clone()
    }

    /// Hands a root action to the executor and schedules it at `prio`.
    pub fn append(&self, action: Action, prio: Priority) -> ActionId {
        let id = {
            let mut ex = self.inner.borrow_mut();
            let id = ActionId(ex.next_id);
            ex.next_id += 1;
            action.link_vars(&ex.vars);
            ex.queues[prio.index()].push_back(Slot {
                id,
                action: action.clone(),
            });
            id
        };
        debug!("executor append {:?} as {:?}", id, prio);
        let weak = Rc::downgrade(&self.inner);
        action.set_finish_callback(Box::new(move |_, _, _| {
            if let Some(inner) = weak.upgrade() {
                Self::schedule(&inner);
            }
        }));
        Self::schedule(&self.inner);
        id
    }

    /// Ticket of the in-flight action.
    pub fn current(&self) -> Option<ActionId> {
        let ex = self.inner.borrow();
        let q = ex.curr_queue?;
        ex.queues[q].front().map(|s| s.id)
    }

    /// Stops and removes the in-flight action, then reschedules so the next
    /// queued action starts immediately. Returns whether anything was
    /// in flight.
    pub fn cancel_current(&self) -> bool {
        let canceled = {
            let mut ex = self.inner.borrow_mut();
            match ex.curr_queue.take() {
                Some(q) => ex.queues[q].pop_front(),
                None => None,
            }
        };
        match canceled {
            Some(slot) => {
                debug!("executor cancel current {:?}", slot.id);
                slot.action.stop();
                Self::schedule(&self.inner);
                true
            }
            None => false,
        }
    }

    /// Stops and removes one queued or in-flight action by ticket. Returns
    /// whether it was found.
    pub fn cancel(&self, id: ActionId) -> bool {
        let removed = {
            let mut ex = self.inner.borrow_mut();
            let mut found = None;
            'queues: for (qi, q) in ex.queues.iter_mut().enumerate() {
                for (si, slot) in q.iter().enumerate() {
                    if slot.id == id {
                        found = q.remove(si).map(|s| (qi, si, s));
                        break 'queues;
                    }
                }
            }
            if let (Some((qi, si, _)), Some(curr)) =
                (found.as_ref(), ex.curr_queue)
            {
                if *qi == curr && *si == 0 {
                    ex.curr_queue = None;
                }
            }
            found
        };
        match removed {
            Some((_, _, slot)) => {
                debug!("executor cancel {:?}", id);
                slot.action.stop();
                Self::schedule(&self.inner);
                true
            }
            None => false,
        }
    }

    /// Stops and removes every queued and in-flight action, then fires
    /// `all_finished`.
    pub fn cancel_all(&self) {
        let drained: Vec<Slot> = {
            let mut ex = self.inner.borrow_mut();
            ex.curr_queue = None;
            ex.queues.iter_mut().flat_map(|q| q.drain(..)).collect()
        };
        debug!("executor cancel all, {} actions", drained.len());
        for slot in &drained {
            slot.action.stop();
        }
        Self::schedule(&self.inner);
    }

    pub fn set_action_started_cb(&self, cb: impl FnMut(ActionId) + 'static) {
        self.inner.borrow_mut().started_cb = Some(Box::new(cb));
    }

    pub fn set_action_finished_cb(&self, cb: impl FnMut(ActionId) + 'static) {
        self.inner.borrow_mut().finished_cb = Some(Box::new(cb));
    }

    pub fn set_all_finished_cb(&self, cb: impl FnMut() + 'static) {
        self.inner.borrow_mut().all_finished_cb = Some(Box::new(cb));
    }

    /// The loop this executor's actions run on.
    pub fn looper(&self) -> &RunLoop {
        &self.lp
    }

    fn schedule(inner: &Rc<RefCell<ExecInner>>) {
        {
            let mut ex = inner.borrow_mut();
            if ex.dispatching {
                ex.pending = true;
                return;
            }
            ex.dispatching = true;
        }
        loop {
            Self::run_pass(inner);
            let mut ex = inner.borrow_mut();
            if ex.pending {
                ex.pending = false;
                continue;
            }
            ex.dispatching = false;
            break;
        }
    }

    fn run_pass(inner: &Rc<RefCell<ExecInner>>) {
        loop {
            let ready = inner
                .borrow()
                .queues
                .iter()
                .position(|q| !q.is_empty());
            let Some(ready) = ready else {
                Self::fire_all_finished(inner);
                return;
            };

            // A higher-priority queue became ready: preempt by pausing, the
            // preempted action resumes later from where it stopped.
            let preempt = {
                let ex = inner.borrow();
                match ex.curr_queue {
                    Some(curr) if ready < curr => {
                        ex.queues[curr].front().map(|s| s.action.clone())
                    }
                    _ => None,
                }
            };
            if let Some(action) = preempt {
                action.pause();
            }

            loop {
                let head = {
                    let ex = inner.borrow();
                    ex.queues[ready].front().map(|s| (s.id, s.action.clone()))
                };
                // Ready queue drained; rescan from the top.
                let Some((id, action)) = head else { break };

                match action.state() {
                    ActionState::Idle => {
                        if action.start() {
                            inner.borrow_mut().curr_queue = Some(ready);
                            Self::fire_started(inner, id);
                        } else {
                            Self::pop_head(inner, ready);
                            Self::fire_finished(inner, id);
                        }
                    }
                    ActionState::Pause => {
                        inner.borrow_mut().curr_queue = Some(ready);
                        action.resume();
                    }
                    ActionState::Finished | ActionState::Stopped => {
                        Self::pop_head(inner, ready);
                        Self::fire_finished(inner, id);
                    }
                    ActionState::Running => return,
                }
            }
        }
    }

    fn pop_head(inner: &Rc<RefCell<ExecInner>>, queue: usize) {
        let mut ex = inner.borrow_mut();
        ex.queues[queue].pop_front();
        ex.curr_queue = None;
    }

    fn fire_started(inner: &Rc<RefCell<ExecInner>>, id: ActionId) {
        let cb = inner.borrow_mut().started_cb.take();
        if let Some(mut cb) = cb {
            cb(id);
            let mut ex = inner.borrow_mut();
            if ex.started_cb.is_none() {
                ex.started_cb = Some(cb);
            }
        }
    }

    fn fire_finished(inner: &Rc<RefCell<ExecInner>>, id: ActionId) {
        let cb = inner.borrow_mut().finished_cb.take();
        if let Some(mut cb) = cb {
            cb(id);
            let mut ex = inner.borrow_mut();
            if ex.finished_cb.is_none() {
                ex.finished_cb = Some(cb);
            }
        }
    }

    fn fire_all_finished(inner: &Rc<RefCell<ExecInner>>) {
        let cb = inner.borrow_mut().all_finished_cb.take();
        if let Some(mut cb) = cb {
            cb();
            let mut ex = inner.borrow_mut();
            if ex.all_finished_cb.is_none() {
                ex.all_finished_cb = Some(cb);
            }
        }
    }
}

impl Drop for ActionExecutor {
    fn drop(&mut self) {
        // Owned actions must not be dropped while underway.
        let drained: Vec<Slot> = {
            let mut ex = self.inner.borrow_mut();
            ex.curr_queue = None;
            ex.queues.iter_mut().flat_map(|q| q.drain(..)).collect()
        };
        for slot in &drained {
            slot.action.stop();
        }
    }
}
