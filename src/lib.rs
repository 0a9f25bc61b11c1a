//! # actionflow
//!
//! **Actionflow** is an in-process action orchestration library for Rust.
//!
//! It provides primitives to compose cancelable, pausable units of work
//! ("actions") into trees, schedule independent trees with priority and
//! preemption, and drive event-based control logic through a hierarchical
//! finite state machine. Everything runs on one logical thread over a
//! virtual-clock run loop, which makes the whole engine deterministic.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌────────────────────────────────────────────────────────────┐
//!  │  ActionExecutor (priority scheduler)                       │
//!  │  - three FIFO queues: urgent / normal / low                │
//!  │  - preempts by pausing, resumes mid-flight work            │
//!  └────────┬──────────────────────┬────────────────────────────┘
//!           ▼                      ▼
//!  ┌─────────────────┐    ┌─────────────────┐
//!  │  root Action    │    │  root Action    │      StateMachine
//!  │  (tree of       │    │                 │      - states + routes
//!  │   composites)   │    │                 │      - guards, handlers
//!  └───┬─────────┬───┘    └────────┬────────┘      - sub-machines
//!      ▼         ▼                 ▼
//!  Sequence   Parallel          Sleep ...            ▲ Event
//!      ▼         ▼                                   │
//!  Function   Event leaf ◄──── EventPublisher ───────┘
//!      │         │
//!      ▼         ▼
//!  ┌────────────────────────────────────────────────────────────┐
//!  │  RunLoop (virtual clock)                                   │
//!  │  - deferred continuations (finish/block delivery)          │
//!  │  - one-shot / periodic timers (timeouts, sleeps)           │
//!  └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Action lifecycle
//! ```text
//!          start()                  finish(succ|fail)
//!  Idle ────────────► Running ────────────────────► Finished
//!    ▲                  │  ▲                            │
//!    │           pause()│  │resume()                    │
//!    │                  ▼  │                            │
//!    │                 Pause                            │
//!    │                  │          stop()               │
//!    └──────────────────┴───────────► Stopped           │
//!         reset() from any ◄────────────────────────────┘
//! ```
//! Completion callbacks are always delivered on a later loop turn, never
//! synchronously; a completion reaching a paused parent is buffered and
//! replayed on resume.
//!
//! ## Features
//! | Area            | Description                                              | Key types                                    |
//! |-----------------|----------------------------------------------------------|----------------------------------------------|
//! | **Actions**     | Verb surface and custom behaviors.                       | [`Action`], [`Behavior`], [`Core`]           |
//! | **Composites**  | Sequence, parallel, conditionals, loops, switch, wrapper.| [`actions`]                                  |
//! | **Scheduling**  | Priority queues with pause-based preemption.             | [`ActionExecutor`], [`Priority`]             |
//! | **State logic** | Hierarchical FSM with guards and sub-machines.           | [`StateMachine`](fsm::StateMachine)          |
//! | **Signals**     | Pub-sub bridge into waiting event leaves.                | [`EventPublisher`], [`Event`]                |
//! | **Inspection**  | Serializable tree and machine snapshots.                 | [`Snapshot`], [`fsm::FsmSnapshot`]           |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use actionflow::{ActionExecutor, FinishCondition, Priority, RunLoop};
//! use actionflow::actions::{function, sequence, sleep};
//!
//! let lp = RunLoop::new();
//! let exec = ActionExecutor::new(&lp);
//!
//! let seq = sequence(&lp, FinishCondition::AnyFail);
//! seq.add_child(function(&lp, || true))?;
//! seq.add_child(sleep(&lp, Duration::from_millis(10)))?;
//!
//! exec.append(seq, Priority::Normal);
//! lp.advance(Duration::from_millis(10));
//! assert_eq!(exec.current(), None);
//! # Ok::<(), actionflow::AttachError>(())
//! ```

mod action;
mod error;
mod event;
mod executor;
mod publisher;
mod reason;
mod runloop;
mod snapshot;
mod vars;

pub mod actions;
pub mod fsm;

// ---- Public re-exports ----

pub use action::{
    Accepted, Action, ActionResult, ActionState, AttachOp, Behavior, BlockCallback, ChildTag,
    Core, FinishCallback,
};
pub use actions::{FinishCondition, LoopMode, RepeatMode, WrapperMode};
pub use error::{AttachError, FsmError};
pub use event::Event;
pub use executor::{ActionExecutor, ActionId, Priority};
pub use publisher::{EventPublisher, SubId};
pub use reason::{Reason, Trace, Who};
pub use reason::{
    REASON_ACTION_TIMEOUT, REASON_EVENT_DONE, REASON_IF_THEN_SKIP, REASON_REPEAT_NO_TIMES,
    REASON_START_CHILD_FAIL, REASON_SWITCH_FAIL, REASON_SWITCH_SKIP,
};
pub use runloop::{DeferId, RunLoop, TimerId, TimerMode};
pub use snapshot::{ChildSnapshot, Snapshot};
pub use vars::Vars;
