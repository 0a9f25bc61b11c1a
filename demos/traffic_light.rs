//! A traffic light with a nested night-mode machine: while "night" is
//! active, a sub-machine blinks amber and only its termination lets the
//! parent react to the same daybreak event.

use actionflow::fsm::{StateMachine, StateMachineRef, STATE_TERM};
use actionflow::Event;
use std::cell::RefCell;
use std::rc::Rc;

const RED: i32 = 1;
const GREEN: i32 = 2;
const AMBER: i32 = 3;
const NIGHT: i32 = 4;

const BLINK_ON: i32 = 10;
const BLINK_OFF: i32 = 11;

const E_TICK: i32 = 1;
const E_NIGHTFALL: i32 = 2;
const E_DAYBREAK: i32 = 3;

fn build_night_mode() -> StateMachineRef {
    let mut sm = StateMachine::new();
    sm.set_name("night-mode");
    sm.new_state(BLINK_ON, "blink-on").expect("state");
    sm.new_state(BLINK_OFF, "blink-off").expect("state");
    sm.set_enter_action(BLINK_ON, |_| println!("  amber on"))
        .expect("action");
    sm.set_enter_action(BLINK_OFF, |_| println!("  amber off"))
        .expect("action");
    sm.add_route(BLINK_ON, E_TICK, BLINK_OFF, "on->off").expect("route");
    sm.add_route(BLINK_OFF, E_TICK, BLINK_ON, "off->on").expect("route");
    sm.add_route(BLINK_ON, E_DAYBREAK, STATE_TERM, "wake").expect("route");
    sm.add_route(BLINK_OFF, E_DAYBREAK, STATE_TERM, "wake").expect("route");
    Rc::new(RefCell::new(sm))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let night_mode = build_night_mode();

    let mut sm = StateMachine::new();
    sm.set_name("traffic-light");
    for (id, label) in [(RED, "red"), (GREEN, "green"), (AMBER, "amber"), (NIGHT, "night")] {
        sm.new_state(id, label).expect("state");
    }
    sm.add_route(RED, E_TICK, GREEN, "red->green").expect("route");
    sm.add_route(GREEN, E_TICK, AMBER, "green->amber").expect("route");
    sm.add_route(AMBER, E_TICK, RED, "amber->red").expect("route");
    for from in [RED, GREEN, AMBER] {
        sm.add_route(from, E_NIGHTFALL, NIGHT, "nightfall").expect("route");
    }
    // Daybreak first terminates the blinker, then this route fires on the
    // same event.
    sm.add_route(NIGHT, E_DAYBREAK, RED, "daybreak").expect("route");
    sm.set_sub_machine(NIGHT, &night_mode).expect("sub machine");

    sm.set_state_changed_callback(|from, to, ev| {
        println!("light {from} -> {to} (event {})", ev.id)
    });

    sm.start();
    for _ in 0..4 {
        sm.run(&Event::new(E_TICK));
    }
    sm.run(&Event::new(E_NIGHTFALL));
    for _ in 0..3 {
        sm.run(&Event::new(E_TICK));
    }
    sm.run(&Event::new(E_DAYBREAK));

    println!(
        "snapshot: {}",
        serde_json::to_string_pretty(&sm.snapshot()).expect("serialize")
    );
}
