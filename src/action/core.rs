//! # The closed action state machine.
//!
//! [`Core`] holds everything the framework owns on behalf of an action:
//! identity, the Idle/Running/Pause/Finished/Stopped lattice, the result, the
//! timeout and tick timers, the finish/block callbacks with their deferred
//! deliveries, the buffered child completions, and the scoped variable store.
//!
//! Behaviors receive `&mut Core` in every hook; the verb entry points live on
//! [`Action`](super::Action), which wraps each hook with the transition
//! bookkeeping specified for that verb.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::action::behavior::ChildTag;
use crate::reason::{Reason, Trace, Who};
use crate::runloop::{DeferId, RunLoop, TimerId, TimerMode};
use crate::vars::Vars;

use super::{Action, WeakInner};

/// Lifecycle state of an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Constructed or reset, not yet started.
    Idle,
    Running,
    /// Externally paused, or self-blocked awaiting a signal.
    Pause,
    /// Ended on its own through `finish`.
    Finished,
    /// Ended externally through `stop`.
    Stopped,
}

/// Outcome of a finished action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Unsure,
    Success,
    Fail,
}

/// Callback invoked (deferred, never synchronously) when an action finishes.
pub type FinishCallback = Box<dyn FnMut(bool, &Reason, &Trace)>;
/// Callback invoked (deferred) when an action blocks awaiting a signal.
pub type BlockCallback = Box<dyn FnMut(&Reason, &Trace)>;

/// A child completion that arrived while the parent was paused.
pub(crate) enum PendingChild {
    Finished {
        tag: ChildTag,
        is_succ: bool,
        why: Reason,
        trace: Trace,
    },
    Blocked {
        tag: ChildTag,
        why: Reason,
        trace: Trace,
    },
}

enum TickState {
    Armed { timer: TimerId, deadline: Duration },
    Suspended { remain: Duration },
}

/// Framework-owned state of one action node.
pub struct Core {
    lp: RunLoop,
    weak: WeakInner,
    id: u32,
    kind: &'static str,
    label: String,
    state: ActionState,
    result: ActionResult,
    parent: Option<Who>,
    vars: Vars,
    finish_cb: Option<FinishCallback>,
    block_cb: Option<BlockCallback>,
    timeout: Option<Duration>,
    timeout_timer: Option<TimerId>,
    tick: Option<TickState>,
    pending_finish: Option<DeferId>,
    pending_block: Option<DeferId>,
    pending_child: VecDeque<PendingChild>,
    finish_note: Option<bool>,
}

impl Core {
    pub(crate) fn new(lp: RunLoop, kind: &'static str, weak: WeakInner) -> Self {
        let id = lp.alloc_action_id();
        Self {
            lp,
            weak,
            id,
            kind,
            label: String::new(),
            state: ActionState::Idle,
            result: ActionResult::Unsure,
            parent: None,
            vars: Vars::new(),
            finish_cb: None,
            block_cb: None,
            timeout: None,
            timeout_timer: None,
            tick: None,
            pending_finish: None,
            pending_block: None,
            pending_child: VecDeque::new(),
            finish_note: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn result(&self) -> ActionResult {
        self.result
    }

    pub fn looper(&self) -> &RunLoop {
        &self.lp
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn who(&self) -> Who {
        Who {
            id: self.id,
            kind: self.kind,
            label: self.label.clone(),
        }
    }

    /// Finishes the action with a fresh trace rooted at this node.
    pub fn finish(&mut self, is_succ: bool, why: Reason) -> bool {
        self.finish_forward(is_succ, why, Trace::new())
    }

    /// Finishes the action, extending a trace received from a child.
    ///
    /// Legal in any state except Finished/Stopped — a leaf may finish from
    /// within `on_start`, before the framework flips it to Running.
    pub fn finish_forward(&mut self, is_succ: bool, why: Reason, mut trace: Trace) -> bool {
        if matches!(self.state, ActionState::Finished | ActionState::Stopped) {
            warn!(
                "{}:{}[{}] finish rejected in state {:?}",
                self.id, self.kind, self.label, self.state
            );
            return false;
        }

        debug!(
            "{}:{}[{}] finished, is_succ: {}",
            self.id, self.kind, self.label, is_succ
        );
        self.state = ActionState::Finished;
        self.result = if is_succ {
            ActionResult::Success
        } else {
            ActionResult::Fail
        };
        self.disarm_timeout();
        self.clear_tick();
        trace.push(self.who());

        // Delivery is scheduled even when no callback is installed right now:
        // the callback may be checked out for an in-flight delivery (a parent
        // resetting and restarting this child from inside it), so presence is
        // decided at delivery time.
        let weak = self.weak.clone();
        self.pending_finish = Some(self.lp.defer(move || {
            if let Some(cell) = weak.upgrade() {
                Action::run_finish_delivery(&cell, is_succ, &why, &trace);
            }
        }));
        self.finish_note = Some(is_succ);
        true
    }

    /// Self-initiated pause with a fresh trace rooted at this node.
    pub fn block(&mut self, why: Reason) -> bool {
        self.block_forward(why, Trace::new())
    }

    /// Self-initiated pause, typically propagating a child's block upward.
    /// Only legal while Running.
    pub fn block_forward(&mut self, why: Reason, mut trace: Trace) -> bool {
        if self.state != ActionState::Running {
            warn!(
                "{}:{}[{}] block rejected in state {:?}",
                self.id, self.kind, self.label, self.state
            );
            return false;
        }

        debug!("{}:{}[{}] blocked", self.id, self.kind, self.label);
        self.state = ActionState::Pause;
        self.disarm_timeout();
        self.suspend_tick();
        trace.push(self.who());

        let weak = self.weak.clone();
        self.pending_block = Some(self.lp.defer(move || {
            if let Some(cell) = weak.upgrade() {
                Action::run_block_delivery(&cell, &why, &trace);
            }
        }));
        true
    }

    /// Arms the behavior-owned one-shot tick timer. Unlike the timeout timer
    /// it suspends with its remaining time across pause/resume, which is what
    /// lets a preempted sleep pick up where it left off.
    pub fn start_tick(&mut self, after: Duration) {
        self.clear_tick();
        let weak = self.weak.clone();
        let timer = self.lp.schedule(after, TimerMode::Oneshot, move || {
            if let Some(cell) = weak.upgrade() {
                Action::deliver_tick(&cell);
            }
        });
        self.tick = Some(TickState::Armed {
            timer,
            deadline: self.lp.now() + after,
        });
    }

    /// Cancels the tick timer, armed or suspended.
    pub fn cancel_tick(&mut self) {
        self.clear_tick();
    }

    // ---- framework internals -------------------------------------------------

    pub(crate) fn weak(&self) -> WeakInner {
        self.weak.clone()
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    pub(crate) fn parent(&self) -> Option<&Who> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, who: Who, parent_vars: &Vars) {
        self.parent = Some(who);
        self.vars.set_parent(parent_vars);
    }

    pub(crate) fn clear_parent(&mut self) {
        self.parent = None;
        self.vars.clear_parent();
    }

    pub(crate) fn set_finish_cb(&mut self, cb: FinishCallback) {
        self.finish_cb = Some(cb);
    }

    pub(crate) fn take_finish_cb(&mut self) -> Option<FinishCallback> {
        self.finish_cb.take()
    }

    pub(crate) fn restore_finish_cb(&mut self, cb: FinishCallback) {
        if self.finish_cb.is_none() {
            self.finish_cb = Some(cb);
        }
    }

    pub(crate) fn set_block_cb(&mut self, cb: BlockCallback) {
        self.block_cb = Some(cb);
    }

    pub(crate) fn take_block_cb(&mut self) -> Option<BlockCallback> {
        self.block_cb.take()
    }

    pub(crate) fn restore_block_cb(&mut self, cb: BlockCallback) {
        if self.block_cb.is_none() {
            self.block_cb = Some(cb);
        }
    }

    pub(crate) fn set_timeout(&mut self, d: Duration) {
        self.timeout = Some(d);
        if self.state == ActionState::Running {
            self.arm_timeout();
        }
    }

    pub(crate) fn reset_timeout(&mut self) {
        self.timeout = None;
        self.disarm_timeout();
    }

    pub(crate) fn mark_running_from_start(&mut self) {
        self.state = ActionState::Running;
        self.arm_timeout();
    }

    pub(crate) fn mark_running_from_resume(&mut self) {
        self.state = ActionState::Running;
        self.arm_timeout();
        self.resume_tick();
    }

    pub(crate) fn mark_paused(&mut self) {
        self.state = ActionState::Pause;
        self.disarm_timeout();
        self.suspend_tick();
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.state = ActionState::Stopped;
        self.disarm_timeout();
        self.clear_tick();
        self.pending_child.clear();
    }

    pub(crate) fn mark_reset(&mut self) {
        if let Some(id) = self.pending_finish.take() {
            self.lp.cancel(id);
        }
        if let Some(id) = self.pending_block.take() {
            self.lp.cancel(id);
        }
        self.pending_child.clear();
        self.disarm_timeout();
        self.clear_tick();
        self.state = ActionState::Idle;
        self.result = ActionResult::Unsure;
        self.finish_note = None;
    }

    pub(crate) fn stash_child(&mut self, pending: PendingChild) {
        self.pending_child.push_back(pending);
    }

    pub(crate) fn pop_pending_child(&mut self) -> Option<PendingChild> {
        self.pending_child.pop_front()
    }

    pub(crate) fn take_finish_note(&mut self) -> Option<bool> {
        self.finish_note.take()
    }

    pub(crate) fn clear_pending_finish(&mut self) {
        self.pending_finish = None;
    }

    pub(crate) fn clear_pending_block(&mut self) {
        self.pending_block = None;
    }

    pub(crate) fn tick_fired(&mut self) {
        self.tick = None;
    }

    pub(crate) fn timeout_fired(&mut self) -> bool {
        if self.timeout_timer.take().is_none() {
            return false;
        }
        self.state == ActionState::Running
    }

    pub(crate) fn cancel_outstanding(&mut self) {
        self.disarm_timeout();
        self.clear_tick();
        if let Some(id) = self.pending_finish.take() {
            self.lp.cancel(id);
        }
        if let Some(id) = self.pending_block.take() {
            self.lp.cancel(id);
        }
    }

    fn arm_timeout(&mut self) {
        self.disarm_timeout();
        if let Some(d) = self.timeout {
            let weak = self.weak.clone();
            self.timeout_timer = Some(self.lp.schedule(d, TimerMode::Oneshot, move || {
                if let Some(cell) = weak.upgrade() {
                    Action::deliver_timeout(&cell);
                }
            }));
        }
    }

    fn disarm_timeout(&mut self) {
        if let Some(t) = self.timeout_timer.take() {
            self.lp.cancel_timer(t);
        }
    }

    fn suspend_tick(&mut self) {
        if matches!(self.tick, Some(TickState::Armed { .. })) {
            if let Some(TickState::Armed { timer, deadline }) = self.tick.take() {
                self.lp.cancel_timer(timer);
                let remain = deadline.saturating_sub(self.lp.now());
                self.tick = Some(TickState::Suspended { remain });
            }
        }
    }

    fn resume_tick(&mut self) {
        if let Some(TickState::Suspended { remain }) = self.tick.take() {
            self.start_tick(remain);
        }
    }

    fn clear_tick(&mut self) {
        if let Some(TickState::Armed { timer, .. }) = self.tick.take() {
            self.lp.cancel_timer(timer);
        }
    }
}
