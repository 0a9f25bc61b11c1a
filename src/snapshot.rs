//! # Serializable views of an action tree.
//!
//! A [`Snapshot`] captures identity, state and result of every node in a
//! tree, keyed by the slot names the composites report. It is a diagnostic
//! view: taking one never mutates the tree, and the JSON it serializes to is
//! what log sinks and inspection endpoints consume.

use serde::Serialize;

use crate::action::{Action, ActionResult, ActionState};

/// One node of a tree snapshot.
#[derive(Serialize)]
pub struct Snapshot {
    pub id: u32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
    pub state: ActionState,
    pub result: ActionResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildSnapshot>,
}

/// A child node together with the slot it occupies in its parent
/// ("0", "if", "case:ok", ...).
#[derive(Serialize)]
pub struct ChildSnapshot {
    pub slot: String,
    #[serde(flatten)]
    pub node: Snapshot,
}

impl Action {
    /// Captures the whole subtree rooted at this action.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            id: self.id(),
            kind: self.kind(),
            label: self.label(),
            state: self.state(),
            result: self.result(),
            children: self
                .children_for_snapshot()
                .into_iter()
                .map(|(slot, child)| ChildSnapshot {
                    slot,
                    node: child.snapshot(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{function, sequence, FinishCondition};
    use crate::runloop::RunLoop;

    #[test]
    fn test_snapshot_reflects_tree_shape_and_state() {
        let lp = RunLoop::new();
        let seq = sequence(&lp, FinishCondition::AllFinish);
        seq.set_label("root");
        seq.add_child(function(&lp, || true)).unwrap();
        seq.add_child(function(&lp, || true)).unwrap();

        let snap = seq.snapshot();
        assert_eq!(snap.kind, "Sequence");
        assert_eq!(snap.label, "root");
        assert_eq!(snap.children.len(), 2);
        assert_eq!(snap.children[0].slot, "0");
        assert_eq!(snap.children[0].node.state, ActionState::Idle);

        seq.start();
        lp.drain();
        let snap = seq.snapshot();
        assert_eq!(snap.state, ActionState::Finished);
        assert_eq!(snap.result, ActionResult::Success);

        let js = serde_json::to_value(&snap).unwrap();
        assert_eq!(js["state"], "finished");
        assert_eq!(js["children"][1]["slot"], "1");
    }
}
