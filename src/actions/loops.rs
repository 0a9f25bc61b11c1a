//! Re-executing composites: unconditional loop and while-loop.

use crate::action::{Accepted, Action, AttachOp, Behavior, ChildTag, Core};
use crate::actions::assemble::SerialSlot;
use crate::actions::LoopMode;
use crate::error::AttachError;
use crate::reason::{Reason, Trace};
use crate::runloop::RunLoop;

struct LoopBehavior {
    mode: LoopMode,
    child: Option<Action>,
    slot: SerialSlot,
}

impl Behavior for LoopBehavior {
    fn is_ready(&self) -> bool {
        self.child.as_ref().is_some_and(|c| c.is_ready())
    }

    fn accept_child(&mut self, op: AttachOp<'_>, child: Action) -> Result<Accepted, AttachError> {
        match op {
            AttachOp::Set => {
                let replaced = self.child.replace(child);
                Ok(Accepted::replacing(ChildTag::Index(0), replaced))
            }
            _ => Err(AttachError::Unsupported),
        }
    }

    fn on_start(&mut self, core: &mut Core) {
        if let Some(child) = self.child.clone() {
            self.slot.launch(core, &child);
        }
    }

    fn on_pause(&mut self, _core: &mut Core) {
        self.slot.pause();
    }

    fn on_resume(&mut self, _core: &mut Core) {
        self.slot.resume();
    }

    fn on_stop(&mut self, _core: &mut Core) {
        self.slot.stop();
    }

    fn on_reset(&mut self, _core: &mut Core) {
        if let Some(c) = &self.child {
            c.reset();
        }
        self.slot.clear();
    }

    fn on_child_finished(
        &mut self,
        core: &mut Core,
        _tag: &ChildTag,
        is_succ: bool,
        why: Reason,
        trace: Trace,
    ) {
        let brk = match self.mode {
            LoopMode::Forever => false,
            LoopMode::UntilSucc => is_succ,
            LoopMode::UntilFail => !is_succ,
        };
        if brk {
            core.finish_forward(is_succ, why, trace);
        } else if let Some(child) = self.child.clone() {
            child.reset();
            self.slot.launch(core, &child);
        }
    }

    fn children(&self) -> Vec<(String, Action)> {
        self.child
            .iter()
            .map(|c| ("0".to_string(), c.clone()))
            .collect()
    }
}

/// Re-executes its single child (set via `set_child`), resetting it between
/// iterations. See [`LoopMode`] for when the loop breaks; on break it
/// forwards the child's result, reason and trace.
pub fn loop_action(lp: &RunLoop, mode: LoopMode) -> Action {
    Action::from_behavior(
        lp,
        "Loop",
        Box::new(LoopBehavior {
            mode,
            child: None,
            slot: SerialSlot::default(),
        }),
    )
}

struct LoopIfBehavior {
    cond: Option<Action>,
    body: Option<Action>,
    // Result the whole loop reports once the condition stops it.
    result_when_break: bool,
    slot: SerialSlot,
}

impl LoopIfBehavior {
    fn run_cond(&mut self, core: &mut Core) {
        if let Some(cond) = self.cond.clone() {
            cond.reset();
            // A condition that refuses to (re)start ends the loop the same
            // way a false condition does.
            if cond.start() {
                self.slot.track(&cond);
            } else {
                self.slot.clear();
                core.finish(self.result_when_break, Reason::default());
            }
        }
    }
}

impl Behavior for LoopIfBehavior {
    fn is_ready(&self) -> bool {
        self.cond.as_ref().is_some_and(|c| c.is_ready())
            && self.body.as_ref().is_some_and(|c| c.is_ready())
    }

    fn accept_child(&mut self, op: AttachOp<'_>, child: Action) -> Result<Accepted, AttachError> {
        let AttachOp::SetAs(role) = op else {
            return Err(AttachError::Unsupported);
        };
        let slot = match role {
            "if" => &mut self.cond,
            "exec" => &mut self.body,
            other => return Err(AttachError::UnsupportedRole(other.to_string())),
        };
        let replaced = slot.replace(child);
        Ok(Accepted::replacing(ChildTag::Role(role.to_string()), replaced))
    }

    fn on_start(&mut self, core: &mut Core) {
        self.run_cond(core);
    }

    fn on_pause(&mut self, _core: &mut Core) {
        self.slot.pause();
    }

    fn on_resume(&mut self, _core: &mut Core) {
        self.slot.resume();
    }

    fn on_stop(&mut self, _core: &mut Core) {
        self.slot.stop();
    }

    fn on_reset(&mut self, _core: &mut Core) {
        for c in [&self.cond, &self.body].into_iter().flatten() {
            c.reset();
        }
        self.slot.clear();
    }

    fn on_child_finished(
        &mut self,
        core: &mut Core,
        tag: &ChildTag,
        is_succ: bool,
        _why: Reason,
        _trace: Trace,
    ) {
        match tag {
            ChildTag::Role(r) if r == "if" => {
                if is_succ {
                    if let Some(body) = self.body.clone() {
                        body.reset();
                        self.slot.launch(core, &body);
                    }
                } else {
                    core.finish(self.result_when_break, Reason::default());
                }
            }
            _ => {
                self.run_cond(core);
            }
        }
    }

    fn children(&self) -> Vec<(String, Action)> {
        let mut out = Vec::new();
        if let Some(c) = &self.cond {
            out.push(("if".to_string(), c.clone()));
        }
        if let Some(c) = &self.body {
            out.push(("exec".to_string(), c.clone()));
        }
        out
    }
}

/// `while (if) { exec }`: re-evaluates the `if` child before each run of the
/// `exec` child and finishes with `result_when_break` once the condition
/// fails. Children attach via `set_child_as` with roles `"if"` and `"exec"`.
pub fn loop_if(lp: &RunLoop, result_when_break: bool) -> Action {
    Action::from_behavior(
        lp,
        "LoopIf",
        Box::new(LoopIfBehavior {
            cond: None,
            body: None,
            result_when_break,
            slot: SerialSlot::default(),
        }),
    )
}
