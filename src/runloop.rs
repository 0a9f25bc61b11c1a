//! # Cooperative run loop: deferred continuations and virtual-clock timers.
//!
//! Everything in this crate executes on one logical thread, driven by a
//! [`RunLoop`]. The loop supplies the two primitives the action core is
//! specified against:
//!
//! - **Deferred continuations** ([`RunLoop::defer`]): run-on-next-turn
//!   callbacks, used to deliver finish/block notifications strictly after the
//!   call that triggered them returns. Cancelable, because `reset()` must be
//!   able to revoke an already-scheduled finish delivery.
//! - **Timers** ([`RunLoop::schedule`]): one-shot or periodic, keyed to a
//!   virtual monotonic clock.
//!
//! The clock is virtual: it only moves when [`RunLoop::advance`] is called.
//! That makes every timing-sensitive behavior in the engine — timeouts,
//! sleeps, priority preemption of a mid-flight sleep — fully deterministic,
//! in tests and in embedders that step the loop themselves.
//!
//! ## Rules
//! - `step()` runs at most one queued continuation; `drain()` runs until the
//!   queue is empty, including continuations queued while draining.
//! - `advance(d)` fires due timers in deadline order (FIFO for equal
//!   deadlines) and drains the continuation queue after every firing, so a
//!   timer's consequences are fully settled before the next timer fires.
//! - Callbacks are invoked with no internal borrows held; a callback may
//!   freely defer, schedule, or cancel.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// Handle of a deferred continuation, usable to cancel it before it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeferId(u64);

/// Handle of a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Whether a timer fires once or repeatedly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerMode {
    Oneshot,
    Periodic,
}

struct TimerEntry {
    id: TimerId,
    mode: TimerMode,
    period: Duration,
    cb: Rc<dyn Fn()>,
}

struct LoopInner {
    now: Duration,
    next_seq: u64,
    next_action_id: u32,
    queue: VecDeque<(DeferId, Box<dyn FnOnce()>)>,
    canceled_defers: HashSet<DeferId>,
    // Keyed by (deadline, seq): deadline order, FIFO within a deadline.
    timers: BTreeMap<(Duration, u64), TimerEntry>,
    canceled_timers: HashSet<TimerId>,
}

/// Cheaply cloneable handle to the single-threaded cooperative loop.
#[derive(Clone)]
pub struct RunLoop {
    inner: Rc<RefCell<LoopInner>>,
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLoop {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(LoopInner {
                now: Duration::ZERO,
                next_seq: 1,
                next_action_id: 1,
                queue: VecDeque::new(),
                canceled_defers: HashSet::new(),
                timers: BTreeMap::new(),
                canceled_timers: HashSet::new(),
            })),
        }
    }

    /// Current virtual time since the loop was created.
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Queues `cb` to run on a later turn. FIFO with respect to other defers.
    pub fn defer(&self, cb: impl FnOnce() + 'static) -> DeferId {
        let mut inner = self.inner.borrow_mut();
        let id = DeferId(inner.next_seq);
        inner.next_seq += 1;
        inner.queue.push_back((id, Box::new(cb)));
        id
    }

    /// Revokes a still-queued continuation. Revoking one that already ran is a
    /// harmless no-op.
    pub fn cancel(&self, id: DeferId) {
        let mut inner = self.inner.borrow_mut();
        if inner.queue.iter().any(|(qid, _)| *qid == id) {
            inner.canceled_defers.insert(id);
        }
    }

    /// Schedules `cb` to fire after `after` of virtual time.
    pub fn schedule(&self, after: Duration, mode: TimerMode, cb: impl Fn() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let id = TimerId(seq);
        let deadline = inner.now + after;
        inner.timers.insert(
            (deadline, seq),
            TimerEntry {
                id,
                mode,
                period: after,
                cb: Rc::new(cb),
            },
        );
        id
    }

    /// Cancels a pending timer. Unknown or already-fired ids are ignored.
    pub fn cancel_timer(&self, id: TimerId) {
        let mut inner = self.inner.borrow_mut();
        if inner.timers.values().any(|t| t.id == id) {
            inner.canceled_timers.insert(id);
        }
    }

    /// Runs one queued continuation, if any. Returns whether one ran.
    pub fn step(&self) -> bool {
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                match inner.queue.pop_front() {
                    Some((id, cb)) => {
                        if inner.canceled_defers.remove(&id) {
                            continue;
                        }
                        Some(cb)
                    }
                    None => None,
                }
            };
            return match next {
                Some(cb) => {
                    cb();
                    true
                }
                None => false,
            };
        }
    }

    /// Runs queued continuations until the queue is empty.
    pub fn drain(&self) {
        while self.step() {}
    }

    /// True when no continuations are queued and no timers are pending.
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.borrow();
        inner.queue.is_empty() && inner.timers.is_empty()
    }

    /// Moves the virtual clock forward by `d`, firing every timer that falls
    /// due on the way and draining the continuation queue between firings.
    pub fn advance(&self, d: Duration) {
        let target = self.inner.borrow().now + d;
        loop {
            self.drain();
            let fired = {
                let mut inner = self.inner.borrow_mut();
                let due = inner
                    .timers
                    .first_key_value()
                    .map(|(&key, _)| key)
                    .filter(|&(deadline, _)| deadline <= target);
                match due.and_then(|key| inner.timers.remove(&key).map(|e| (key, e))) {
                    Some((key, entry)) => {
                        inner.now = key.0;
                        if inner.canceled_timers.remove(&entry.id) {
                            continue;
                        }
                        if entry.mode == TimerMode::Periodic {
                            let seq = inner.next_seq;
                            inner.next_seq += 1;
                            let next_key = (key.0 + entry.period, seq);
                            inner.timers.insert(
                                next_key,
                                TimerEntry {
                                    id: entry.id,
                                    mode: entry.mode,
                                    period: entry.period,
                                    cb: Rc::clone(&entry.cb),
                                },
                            );
                        }
                        Some(entry.cb)
                    }
                    None => None,
                }
            };
            match fired {
                Some(cb) => cb(),
                None => break,
            }
        }
        self.inner.borrow_mut().now = target;
        self.drain();
    }

    /// Allocates the next action id. Monotonic per loop, which gives tests a
    /// resettable allocator instead of process-global state.
    pub(crate) fn alloc_action_id(&self) -> u32 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_action_id;
        inner.next_action_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_defers_run_in_fifo_order() {
        let lp = RunLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            lp.defer(move || log.borrow_mut().push(i));
        }
        lp.drain();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_canceled_defer_does_not_run() {
        let lp = RunLoop::new();
        let hit = Rc::new(RefCell::new(false));
        let hit2 = Rc::clone(&hit);
        let id = lp.defer(move || *hit2.borrow_mut() = true);
        lp.cancel(id);
        lp.drain();
        assert!(!*hit.borrow());
    }

    #[test]
    fn test_step_runs_exactly_one() {
        let lp = RunLoop::new();
        let count = Rc::new(RefCell::new(0));
        for _ in 0..2 {
            let count = Rc::clone(&count);
            lp.defer(move || *count.borrow_mut() += 1);
        }
        assert!(lp.step());
        assert_eq!(*count.borrow(), 1);
        lp.drain();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_drain_includes_nested_defers() {
        let lp = RunLoop::new();
        let count = Rc::new(RefCell::new(0));
        let lp2 = lp.clone();
        let count2 = Rc::clone(&count);
        lp.defer(move || {
            *count2.borrow_mut() += 1;
            let count3 = Rc::clone(&count2);
            lp2.defer(move || *count3.borrow_mut() += 1);
        });
        lp.drain();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let lp = RunLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        lp.schedule(Duration::from_millis(20), TimerMode::Oneshot, move || {
            l1.borrow_mut().push("late")
        });
        lp.schedule(Duration::from_millis(5), TimerMode::Oneshot, move || {
            l2.borrow_mut().push("early")
        });
        lp.advance(Duration::from_millis(30));
        assert_eq!(*log.borrow(), vec!["early", "late"]);
        assert_eq!(lp.now(), Duration::from_millis(30));
    }

    #[test]
    fn test_advance_stops_short_of_future_timers() {
        let lp = RunLoop::new();
        let hit = Rc::new(RefCell::new(false));
        let hit2 = Rc::clone(&hit);
        lp.schedule(Duration::from_millis(50), TimerMode::Oneshot, move || {
            *hit2.borrow_mut() = true
        });
        lp.advance(Duration::from_millis(49));
        assert!(!*hit.borrow());
        lp.advance(Duration::from_millis(1));
        assert!(*hit.borrow());
    }

    #[test]
    fn test_periodic_timer_repeats_until_canceled() {
        let lp = RunLoop::new();
        let count = Rc::new(RefCell::new(0));
        let count2 = Rc::clone(&count);
        let id = lp.schedule(Duration::from_millis(10), TimerMode::Periodic, move || {
            *count2.borrow_mut() += 1
        });
        lp.advance(Duration::from_millis(35));
        assert_eq!(*count.borrow(), 3);
        lp.cancel_timer(id);
        lp.advance(Duration::from_millis(35));
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn test_canceled_timer_never_fires() {
        let lp = RunLoop::new();
        let hit = Rc::new(RefCell::new(false));
        let hit2 = Rc::clone(&hit);
        let id = lp.schedule(Duration::from_millis(10), TimerMode::Oneshot, move || {
            *hit2.borrow_mut() = true
        });
        lp.cancel_timer(id);
        lp.advance(Duration::from_millis(20));
        assert!(!*hit.borrow());
        assert!(lp.is_idle());
    }
}
