//! # Action nodes and the verb surface.
//!
//! An [`Action`] is a handle to one node of an executable tree. The node owns
//! a [`Core`] (the framework-managed state machine) and a [`Behavior`] (the
//! node's semantics). Verbs — `start`, `pause`, `resume`, `stop`, `reset` —
//! run the matching behavior hook inside the transition bookkeeping that verb
//! is specified to perform.
//!
//! ## Ownership
//! Attaching a child hands it to the parent: the child's parent link is set
//! exactly once (a second attach fails with [`AttachError::AlreadyOwned`]),
//! its finish/block callbacks are rebound to framework routers that hold only
//! a weak reference to the parent, and its variable scope is chained to the
//! parent's. The parent is the only entity that drives a child's verbs.
//!
//! ## The finish-during-pause race
//! A child's completion is always delivered on a later loop turn, so a parent
//! may already be paused by the time it arrives. The router buffers such
//! completions and [`Action::resume`] replays them in order, which guarantees
//! a completion is never lost and never applied twice across a pause/resume
//! boundary. Completions reaching a stopped or finished parent are dropped.

mod behavior;
mod core;

pub use behavior::{Accepted, AttachOp, Behavior, ChildTag};
pub use core::{ActionResult, ActionState, BlockCallback, Core, FinishCallback};

pub(crate) use core::PendingChild;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::error::AttachError;
use crate::event::Event;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;
use crate::vars::Vars;

pub(crate) struct ActionInner {
    pub(crate) core: Core,
    pub(crate) behavior: Box<dyn Behavior>,
}

pub(crate) type WeakInner = Weak<RefCell<ActionInner>>;

impl Drop for ActionInner {
    fn drop(&mut self) {
        if matches!(self.core.state(), ActionState::Running | ActionState::Pause) {
            // Dropping an underway action is programmer error; the tree must
            // be stopped first so children unwind through their hooks. Logged
            // only: panicking in Drop would abort mid-unwind.
            error!(
                "{}:{}[{}] dropped while {:?}",
                self.core.id(),
                self.core.kind(),
                self.core.label(),
                self.core.state()
            );
        }
        self.core.cancel_outstanding();
    }
}

/// Handle to one action node.
///
/// Handles are cheap clones of the same node; the tree structure itself stays
/// exclusive because a node accepts only one parent, ever. Keeping a clone of
/// a child around (tests do) is observation, not ownership.
#[derive(Clone)]
pub struct Action(pub(crate) Rc<RefCell<ActionInner>>);

impl Action {
    pub(crate) fn from_behavior(
        lp: &RunLoop,
        kind: &'static str,
        behavior: Box<dyn Behavior>,
    ) -> Self {
        let lp = lp.clone();
        Action(Rc::new_cyclic(|weak| {
            RefCell::new(ActionInner {
                core: Core::new(lp, kind, weak.clone()),
                behavior,
            })
        }))
    }

    // ---- identity ------------------------------------------------------------

    pub fn id(&self) -> u32 {
        self.0.borrow().core.id()
    }

    pub fn kind(&self) -> &'static str {
        self.0.borrow().core.kind()
    }

    pub fn label(&self) -> String {
        self.0.borrow().core.label().to_string()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        self.0.borrow_mut().core.set_label(label.into());
    }

    pub fn state(&self) -> ActionState {
        self.0.borrow().core.state()
    }

    pub fn result(&self) -> ActionResult {
        self.0.borrow().core.result()
    }

    /// Started but not yet finished or stopped.
    pub fn is_underway(&self) -> bool {
        matches!(self.state(), ActionState::Running | ActionState::Pause)
    }

    /// Whether required children are attached and the node can be started.
    pub fn is_ready(&self) -> bool {
        self.0.borrow().behavior.is_ready()
    }

    pub fn vars(&self) -> Vars {
        self.0.borrow().core.vars().clone()
    }

    // ---- callbacks & timeout -------------------------------------------------

    /// Installs the finish callback. Attaching this action to a composite
    /// rebinds it, so only root actions should carry a caller-owned one.
    pub fn set_finish_callback(&self, cb: FinishCallback) {
        self.0.borrow_mut().core.set_finish_cb(cb);
    }

    pub fn set_block_callback(&self, cb: BlockCallback) {
        self.0.borrow_mut().core.set_block_cb(cb);
    }

    /// Arms a one-shot timeout that fails the action (via the behavior's
    /// `on_timeout`) if it is still Running when the duration elapses.
    /// Rearmed with the full duration on every start/resume.
    pub fn set_timeout(&self, d: Duration) {
        self.0.borrow_mut().core.set_timeout(d);
    }

    pub fn reset_timeout(&self) {
        self.0.borrow_mut().core.reset_timeout();
    }

    // ---- verbs ---------------------------------------------------------------

    /// Idle → Running. No-op (true) when already Running; rejected with a
    /// warning from any other state or when the node is not ready.
    pub fn start(&self) -> bool {
        {
            let inner = self.0.borrow();
            match inner.core.state() {
                ActionState::Running => return true,
                ActionState::Idle => {}
                st => {
                    warn!(
                        "{}:{}[{}] start rejected in state {:?}",
                        inner.core.id(),
                        inner.core.kind(),
                        inner.core.label(),
                        st
                    );
                    return false;
                }
            }
            if !inner.behavior.is_ready() {
                warn!(
                    "{}:{}[{}] start rejected: not ready",
                    inner.core.id(),
                    inner.core.kind(),
                    inner.core.label()
                );
                return false;
            }
            debug!(
                "{}:{}[{}] start",
                inner.core.id(),
                inner.core.kind(),
                inner.core.label()
            );
        }
        Self::dispatch(&self.0, |b, c| {
            b.on_start(c);
            // A leaf may have finished (or blocked) inside the hook; only an
            // unchanged state transitions to Running.
            if c.state() == ActionState::Idle {
                c.mark_running_from_start();
            }
        });
        true
    }

    /// Running → Pause. No-op (true) when already paused.
    pub fn pause(&self) -> bool {
        {
            let inner = self.0.borrow();
            match inner.core.state() {
                ActionState::Pause => return true,
                ActionState::Running => {}
                st => {
                    warn!(
                        "{}:{}[{}] pause rejected in state {:?}",
                        inner.core.id(),
                        inner.core.kind(),
                        inner.core.label(),
                        st
                    );
                    return false;
                }
            }
            debug!(
                "{}:{}[{}] pause",
                inner.core.id(),
                inner.core.kind(),
                inner.core.label()
            );
        }
        Self::dispatch(&self.0, |b, c| {
            b.on_pause(c);
            if c.state() == ActionState::Running {
                c.mark_paused();
            }
        });
        true
    }

    /// Pause → Running, then replays any child completions that were buffered
    /// while paused. No-op (true) when already Running.
    pub fn resume(&self) -> bool {
        {
            let inner = self.0.borrow();
            match inner.core.state() {
                ActionState::Running => return true,
                ActionState::Pause => {}
                st => {
                    warn!(
                        "{}:{}[{}] resume rejected in state {:?}",
                        inner.core.id(),
                        inner.core.kind(),
                        inner.core.label(),
                        st
                    );
                    return false;
                }
            }
            debug!(
                "{}:{}[{}] resume",
                inner.core.id(),
                inner.core.kind(),
                inner.core.label()
            );
        }
        Self::dispatch(&self.0, |b, c| {
            b.on_resume(c);
            if c.state() == ActionState::Pause {
                c.mark_running_from_resume();
            }
        });
        self.replay_pending();
        true
    }

    /// Running|Pause → Stopped. No-op (true) from any other state.
    pub fn stop(&self) -> bool {
        {
            let inner = self.0.borrow();
            if !matches!(
                inner.core.state(),
                ActionState::Running | ActionState::Pause
            ) {
                return true;
            }
            debug!(
                "{}:{}[{}] stop",
                inner.core.id(),
                inner.core.kind(),
                inner.core.label()
            );
        }
        Self::dispatch(&self.0, |b, c| {
            b.on_stop(c);
            if matches!(c.state(), ActionState::Running | ActionState::Pause) {
                c.mark_stopped();
            }
        });
        true
    }

    /// Returns the node (and, through the behavior hook, its subtree) to the
    /// freshly-constructed state: Idle, result Unsure, timers disarmed, any
    /// scheduled finish delivery revoked.
    pub fn reset(&self) {
        if self.state() == ActionState::Idle {
            return;
        }
        {
            let inner = self.0.borrow();
            debug!(
                "{}:{}[{}] reset",
                inner.core.id(),
                inner.core.kind(),
                inner.core.label()
            );
        }
        Self::dispatch(&self.0, |b, c| {
            b.on_reset(c);
            c.mark_reset();
        });
    }

    // ---- attach capabilities -------------------------------------------------

    /// Appends a child to an ordered list; returns its index.
    pub fn add_child(&self, child: Action) -> Result<usize, AttachError> {
        self.attach(child, AttachOp::Append).map(|tag| tag.index())
    }

    /// Appends a child under a named role; returns its index within the role.
    pub fn add_child_as(&self, child: Action, role: &str) -> Result<usize, AttachError> {
        self.attach(child, AttachOp::AppendAs(role))
            .map(|tag| tag.index())
    }

    /// Installs the single child slot.
    pub fn set_child(&self, child: Action) -> Result<(), AttachError> {
        self.attach(child, AttachOp::Set).map(|_| ())
    }

    /// Installs a named single-child slot.
    pub fn set_child_as(&self, child: Action, role: &str) -> Result<(), AttachError> {
        self.attach(child, AttachOp::SetAs(role)).map(|_| ())
    }

    fn attach(&self, child: Action, op: AttachOp<'_>) -> Result<ChildTag, AttachError> {
        if Rc::ptr_eq(&self.0, &child.0) {
            warn!("{}:{} cannot attach to itself", self.id(), self.kind());
            return Err(AttachError::SelfAttach);
        }
        {
            let (who, vars) = {
                let inner = self.0.borrow();
                (inner.core.who(), inner.core.vars().clone())
            };
            let mut ci = child.0.borrow_mut();
            if ci.core.parent().is_some() {
                warn!(
                    "{}:{}[{}] already owned, attach to {}:{} rejected",
                    ci.core.id(),
                    ci.core.kind(),
                    ci.core.label(),
                    who.id,
                    who.kind
                );
                return Err(AttachError::AlreadyOwned);
            }
            ci.core.set_parent(who, &vars);
        }
        let accepted = {
            let inner = &mut *self.0.borrow_mut();
            inner.behavior.accept_child(op, child.clone())
        };
        match accepted {
            Ok(Accepted { tag, replaced }) => {
                if let Some(old) = replaced {
                    old.0.borrow_mut().core.clear_parent();
                }
                Self::bind_child(Rc::downgrade(&self.0), &child, tag.clone());
                Ok(tag)
            }
            Err(e) => {
                child.0.borrow_mut().core.clear_parent();
                warn!("{}:{}[{}] attach rejected: {e}", self.id(), self.kind(), self.label());
                Err(e)
            }
        }
    }

    /// Claims a child the behavior received at construction instead of
    /// through an attach capability: sets its parent link, chains its
    /// variable scope and binds its completion callbacks.
    pub(crate) fn adopt(&self, child: &Action) -> bool {
        {
            let (who, vars) = {
                let inner = self.0.borrow();
                (inner.core.who(), inner.core.vars().clone())
            };
            let mut ci = child.0.borrow_mut();
            if ci.core.parent().is_some() {
                warn!(
                    "{}:{}[{}] already owned, adoption by {}:{} rejected",
                    ci.core.id(),
                    ci.core.kind(),
                    ci.core.label(),
                    who.id,
                    who.kind
                );
                return false;
            }
            ci.core.set_parent(who, &vars);
        }
        Self::bind_child(Rc::downgrade(&self.0), child, ChildTag::Index(0));
        true
    }

    fn bind_child(parent: WeakInner, child: &Action, tag: ChildTag) {
        let finish_parent = parent.clone();
        let finish_tag = tag.clone();
        child.set_finish_callback(Box::new(move |is_succ, why, trace| {
            Action::deliver_child_finish(
                &finish_parent,
                &finish_tag,
                is_succ,
                why.clone(),
                trace.clone(),
            );
        }));
        child.set_block_callback(Box::new(move |why, trace| {
            Action::deliver_child_block(&parent, &tag, why.clone(), trace.clone());
        }));
    }

    // ---- framework routing ---------------------------------------------------

    fn dispatch<R>(
        cell: &Rc<RefCell<ActionInner>>,
        f: impl FnOnce(&mut dyn Behavior, &mut Core) -> R,
    ) -> R {
        let (r, note) = {
            let inner = &mut *cell.borrow_mut();
            let ActionInner { core, behavior } = inner;
            let r = f(behavior.as_mut(), core);
            (r, core.take_finish_note())
        };
        if let Some(is_succ) = note {
            let inner = &mut *cell.borrow_mut();
            let ActionInner { core, behavior } = inner;
            behavior.on_finished(core, is_succ);
            let _ = core.take_finish_note();
        }
        r
    }

    fn replay_pending(&self) {
        loop {
            let pending = {
                let mut inner = self.0.borrow_mut();
                if inner.core.state() != ActionState::Running {
                    None
                } else {
                    inner.core.pop_pending_child()
                }
            };
            match pending {
                Some(PendingChild::Finished {
                    tag,
                    is_succ,
                    why,
                    trace,
                }) => {
                    Self::dispatch(&self.0, |b, c| {
                        b.on_child_finished(c, &tag, is_succ, why, trace)
                    });
                }
                Some(PendingChild::Blocked { tag, why, trace }) => {
                    Self::dispatch(&self.0, |b, c| b.on_child_blocked(c, &tag, why, trace));
                }
                None => break,
            }
        }
    }

    pub(crate) fn deliver_child_finish(
        weak: &WeakInner,
        tag: &ChildTag,
        is_succ: bool,
        why: Reason,
        trace: Trace,
    ) {
        let Some(cell) = weak.upgrade() else { return };
        let state = cell.borrow().core.state();
        match state {
            ActionState::Running => {
                Self::dispatch(&cell, |b, c| {
                    b.on_child_finished(c, tag, is_succ, why, trace)
                });
            }
            ActionState::Pause => {
                cell.borrow_mut().core.stash_child(PendingChild::Finished {
                    tag: tag.clone(),
                    is_succ,
                    why,
                    trace,
                });
            }
            st => {
                trace!("child completion dropped, parent in state {st:?}");
            }
        }
    }

    pub(crate) fn deliver_child_block(weak: &WeakInner, tag: &ChildTag, why: Reason, trace: Trace) {
        let Some(cell) = weak.upgrade() else { return };
        let state = cell.borrow().core.state();
        match state {
            ActionState::Running => {
                Self::dispatch(&cell, |b, c| b.on_child_blocked(c, tag, why, trace));
            }
            ActionState::Pause => {
                cell.borrow_mut().core.stash_child(PendingChild::Blocked {
                    tag: tag.clone(),
                    why,
                    trace,
                });
            }
            st => {
                trace!("child block dropped, parent in state {st:?}");
            }
        }
    }

    pub(crate) fn run_finish_delivery(
        cell: &Rc<RefCell<ActionInner>>,
        is_succ: bool,
        why: &Reason,
        trace: &Trace,
    ) {
        let cb = {
            let mut inner = cell.borrow_mut();
            inner.core.clear_pending_finish();
            inner.core.take_finish_cb()
        };
        if let Some(mut cb) = cb {
            cb(is_succ, why, trace);
            cell.borrow_mut().core.restore_finish_cb(cb);
        }
    }

    pub(crate) fn run_block_delivery(cell: &Rc<RefCell<ActionInner>>, why: &Reason, trace: &Trace) {
        let cb = {
            let mut inner = cell.borrow_mut();
            inner.core.clear_pending_block();
            inner.core.take_block_cb()
        };
        if let Some(mut cb) = cb {
            cb(why, trace);
            cell.borrow_mut().core.restore_block_cb(cb);
        }
    }

    pub(crate) fn deliver_timeout(cell: &Rc<RefCell<ActionInner>>) {
        let fire = cell.borrow_mut().core.timeout_fired();
        if fire {
            {
                let inner = cell.borrow();
                debug!(
                    "{}:{}[{}] timeout",
                    inner.core.id(),
                    inner.core.kind(),
                    inner.core.label()
                );
            }
            Self::dispatch(cell, |b, c| b.on_timeout(c));
        }
    }

    pub(crate) fn deliver_tick(cell: &Rc<RefCell<ActionInner>>) {
        let run = {
            let mut inner = cell.borrow_mut();
            inner.core.tick_fired();
            inner.core.state() == ActionState::Running
        };
        if run {
            Self::dispatch(cell, |b, c| b.on_tick(c));
        }
    }

    pub(crate) fn deliver_signal(weak: &WeakInner, event: &Event) -> bool {
        let Some(cell) = weak.upgrade() else {
            return false;
        };
        if cell.borrow().core.state() != ActionState::Running {
            return false;
        }
        Self::dispatch(&cell, |b, c| b.on_signal(c, event))
    }

    /// Finish initiated from outside any hook (the dummy leaf's handle).
    /// Routed through `dispatch` so `on_finished` still runs.
    pub(crate) fn finish_external(weak: &WeakInner, is_succ: bool, why: Reason) {
        let Some(cell) = weak.upgrade() else { return };
        Self::dispatch(&cell, |_b, c| {
            c.finish(is_succ, why);
        });
    }

    pub(crate) fn block_external(weak: &WeakInner, why: Reason) {
        let Some(cell) = weak.upgrade() else { return };
        Self::dispatch(&cell, |_b, c| {
            c.block(why);
        });
    }

    pub(crate) fn children_for_snapshot(&self) -> Vec<(String, Action)> {
        self.0.borrow().behavior.children()
    }

    pub(crate) fn link_vars(&self, parent: &Vars) {
        self.0.borrow().core.vars().set_parent(parent);
    }
}
