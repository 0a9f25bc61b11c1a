//! A deployment-style pipeline: check, build, then verify and notify in
//! parallel, with an urgent health probe preempting the pipeline mid-sleep.
//!
//! Run with `RUST_LOG=debug cargo run --example pipeline` to watch the
//! engine's transitions.

use std::time::Duration;

use actionflow::actions::{function, parallel, sequence, sleep};
use actionflow::{ActionExecutor, FinishCondition, Priority, RunLoop};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let lp = RunLoop::new();
    let exec = ActionExecutor::new(&lp);
    exec.set_action_finished_cb(|id| println!("action {id:?} left the queue"));
    exec.set_all_finished_cb(|| println!("pipeline drained"));

    let pipeline = sequence(&lp, FinishCondition::AnyFail);
    pipeline.set_label("deploy");
    pipeline
        .add_child(function(&lp, || {
            println!("checking preconditions");
            true
        }))
        .expect("attach check");
    // Stands in for the actual build.
    pipeline
        .add_child(sleep(&lp, Duration::from_millis(300)))
        .expect("attach build");

    let fan_out = parallel(&lp, FinishCondition::AllFinish);
    fan_out
        .add_child(function(&lp, || {
            println!("verifying artifacts");
            true
        }))
        .expect("attach verify");
    fan_out
        .add_child(function(&lp, || {
            println!("notifying watchers");
            true
        }))
        .expect("attach notify");
    pipeline.add_child(fan_out).expect("attach fan-out");

    exec.append(pipeline, Priority::Normal);

    // A health probe arrives mid-build; it preempts the sleep, runs, and the
    // build resumes where it stopped.
    lp.advance(Duration::from_millis(100));
    exec.append(
        function(&lp, || {
            println!("urgent health probe");
            true
        }),
        Priority::Urgent,
    );

    lp.advance(Duration::from_millis(300));
    println!("virtual clock at {:?}", lp.now());
}
