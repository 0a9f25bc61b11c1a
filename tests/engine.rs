//! End-to-end scenarios across the executor, composites and state machine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use actionflow::actions::{dummy, function, sequence, sleep};
use actionflow::fsm::{StateMachine, StateId, STATE_TERM};
use actionflow::{
    ActionExecutor, ActionId, ActionResult, ActionState, Event, FinishCondition, Priority,
    Reason, RunLoop, REASON_ACTION_TIMEOUT,
};

struct OrderLog {
    names: RefCell<HashMap<ActionId, &'static str>>,
    started: RefCell<Vec<ActionId>>,
    finished: RefCell<Vec<ActionId>>,
}

impl OrderLog {
    // The callbacks record raw ids: `append` can fire action_started before
    // the caller gets the ticket back to name it. Names are resolved at
    // assertion time instead.
    fn install(exec: &ActionExecutor) -> Rc<OrderLog> {
        let log = Rc::new(OrderLog {
            names: RefCell::new(HashMap::new()),
            started: RefCell::new(Vec::new()),
            finished: RefCell::new(Vec::new()),
        });
        let l = Rc::clone(&log);
        exec.set_action_started_cb(move |id| l.started.borrow_mut().push(id));
        let l = Rc::clone(&log);
        exec.set_action_finished_cb(move |id| l.finished.borrow_mut().push(id));
        log
    }

    fn track(&self, id: ActionId, name: &'static str) {
        self.names.borrow_mut().insert(id, name);
    }

    fn started_names(&self) -> Vec<&'static str> {
        self.resolve(&self.started.borrow())
    }

    fn finished_names(&self) -> Vec<&'static str> {
        self.resolve(&self.finished.borrow())
    }

    fn resolve(&self, ids: &[ActionId]) -> Vec<&'static str> {
        let names = self.names.borrow();
        ids.iter().map(|id| names.get(id).copied().unwrap_or("?")).collect()
    }
}

#[test]
fn test_executor_priority_start_and_finish_order() {
    let lp = RunLoop::new();
    let exec = ActionExecutor::new(&lp);
    let log = OrderLog::install(&exec);

    let id = exec.append(sleep(&lp, Duration::from_millis(10)), Priority::Normal);
    log.track(id, "sleep");
    let id = exec.append(function(&lp, || true), Priority::Low);
    log.track(id, "low");
    let id = exec.append(function(&lp, || true), Priority::Normal);
    log.track(id, "normal_1");
    let id = exec.append(function(&lp, || true), Priority::Normal);
    log.track(id, "normal_2");
    let id = exec.append(function(&lp, || true), Priority::Urgent);
    log.track(id, "urgent");

    lp.advance(Duration::from_millis(10));

    // The urgent action preempts the mid-flight sleep, which resumes and
    // still finishes before the queued normal actions get their turn.
    assert_eq!(
        log.started_names(),
        vec!["sleep", "urgent", "normal_1", "normal_2", "low"]
    );
    assert_eq!(
        log.finished_names(),
        vec!["urgent", "sleep", "normal_1", "normal_2", "low"]
    );
}

#[test]
fn test_cancel_current_frees_the_queue_immediately() {
    let lp = RunLoop::new();
    let exec = ActionExecutor::new(&lp);
    exec.append(sleep(&lp, Duration::from_secs(1)), Priority::Normal);
    let next = sleep(&lp, Duration::from_millis(1));
    exec.append(next.clone(), Priority::Normal);

    lp.advance(Duration::from_millis(20));
    assert_eq!(next.state(), ActionState::Idle);
    exec.cancel_current();

    // The next action completes at ~21ms, not after the canceled second.
    lp.advance(Duration::from_millis(1));
    assert_eq!(next.state(), ActionState::Finished);
}

#[test]
fn test_child_completion_during_pause_is_replayed_on_resume() {
    let lp = RunLoop::new();
    let seq = sequence(&lp, FinishCondition::AllFinish);
    let (first, handle) = dummy(&lp);
    seq.add_child(first).unwrap();
    let second_ran = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&second_ran);
    seq.add_child(function(&lp, move || {
        *flag.borrow_mut() = true;
        true
    }))
    .unwrap();

    seq.start();
    handle.emit_finish(true);
    // Parent pauses before the deferred completion is delivered.
    seq.pause();
    lp.drain();
    assert_eq!(seq.state(), ActionState::Pause);
    assert!(!*second_ran.borrow());

    // Resume replays the buffered completion and the sequence proceeds.
    seq.resume();
    lp.drain();
    assert!(*second_ran.borrow());
    assert_eq!(seq.result(), ActionResult::Success);
}

#[test]
fn test_child_completion_after_stop_is_dropped() {
    let lp = RunLoop::new();
    let seq = sequence(&lp, FinishCondition::AllFinish);
    let (first, handle) = dummy(&lp);
    seq.add_child(first).unwrap();
    let second_ran = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&second_ran);
    seq.add_child(function(&lp, move || {
        *flag.borrow_mut() = true;
        true
    }))
    .unwrap();

    seq.start();
    handle.emit_finish(true);
    seq.stop();
    lp.drain();
    assert_eq!(seq.state(), ActionState::Stopped);
    assert!(!*second_ran.borrow());
}

#[test]
fn test_timeout_rearms_full_duration_on_resume() {
    let lp = RunLoop::new();
    let (act, _handle) = dummy(&lp);
    act.set_timeout(Duration::from_millis(50));
    let why = Rc::new(RefCell::new(None));
    let why2 = Rc::clone(&why);
    act.set_finish_callback(Box::new(move |_, r: &Reason, _| {
        *why2.borrow_mut() = Some(r.code);
    }));

    act.start();
    lp.advance(Duration::from_millis(30));
    act.pause();
    lp.advance(Duration::from_millis(100));
    assert_eq!(act.state(), ActionState::Pause);

    // Unlike a sleep, the timeout restarts from zero after a resume.
    act.resume();
    lp.advance(Duration::from_millis(49));
    assert_eq!(act.state(), ActionState::Running);
    lp.advance(Duration::from_millis(1));
    assert_eq!(act.state(), ActionState::Finished);
    assert_eq!(act.result(), ActionResult::Fail);
    assert_eq!(*why.borrow(), Some(REASON_ACTION_TIMEOUT));
}

#[test]
fn test_reset_restores_a_finished_action_for_reuse() {
    let lp = RunLoop::new();
    let act = function(&lp, || true);
    act.start();
    lp.drain();
    assert_eq!(act.state(), ActionState::Finished);

    act.reset();
    assert_eq!(act.state(), ActionState::Idle);
    assert_eq!(act.result(), ActionResult::Unsure);

    act.start();
    lp.drain();
    assert_eq!(act.state(), ActionState::Finished);
    assert_eq!(act.result(), ActionResult::Success);
}

#[test]
fn test_reset_revokes_a_scheduled_finish_delivery() {
    let lp = RunLoop::new();
    let (act, handle) = dummy(&lp);
    let delivered = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&delivered);
    act.set_finish_callback(Box::new(move |_, _, _| *flag.borrow_mut() = true));

    act.start();
    handle.emit_finish(true);
    act.reset();
    lp.drain();
    assert!(!*delivered.borrow());
    assert_eq!(act.state(), ActionState::Idle);
}

#[test]
fn test_exclusive_ownership_rejects_second_parent() {
    let lp = RunLoop::new();
    let child = function(&lp, || true);
    let seq_a = sequence(&lp, FinishCondition::AllFinish);
    let seq_b = sequence(&lp, FinishCondition::AllFinish);
    seq_a.add_child(child.clone()).unwrap();
    assert!(seq_b.add_child(child).is_err());
}

#[test]
fn test_executor_vars_are_visible_to_appended_trees() {
    let lp = RunLoop::new();
    let exec = ActionExecutor::new(&lp);
    exec.vars().set("limit", serde_json::json!(3));

    let seq = sequence(&lp, FinishCondition::AllFinish);
    let seq_vars = seq.vars();
    let seen = Rc::new(RefCell::new(None));
    let seen2 = Rc::clone(&seen);
    seq.add_child(function(&lp, move || {
        *seen2.borrow_mut() = seq_vars.get("limit");
        true
    }))
    .unwrap();

    exec.append(seq, Priority::Normal);
    lp.drain();
    assert_eq!(*seen.borrow(), Some(serde_json::json!(3)));
}

#[test]
fn test_state_machine_drives_action_side_effects() {
    const IDLE: StateId = 1;
    const WORKING: StateId = 2;
    const E_GO: i32 = 1;
    const E_DONE: i32 = 2;

    let lp = RunLoop::new();
    let work_started = Rc::new(RefCell::new(0));

    let mut sm = StateMachine::new();
    sm.set_name("worker");
    sm.new_state(IDLE, "idle").unwrap();
    sm.new_state(WORKING, "working").unwrap();
    sm.add_route(IDLE, E_GO, WORKING, "go").unwrap();
    sm.add_route(WORKING, E_DONE, STATE_TERM, "done").unwrap();

    let lp2 = lp.clone();
    let counter = Rc::clone(&work_started);
    sm.set_enter_action(WORKING, move |_| {
        let act = function(&lp2, || true);
        act.start();
        lp2.drain();
        *counter.borrow_mut() += 1;
    })
    .unwrap();

    sm.start();
    assert!(sm.run(&Event::new(E_GO)));
    assert_eq!(*work_started.borrow(), 1);
    assert!(sm.run(&Event::new(E_DONE)));
    assert!(sm.is_terminated());
}
