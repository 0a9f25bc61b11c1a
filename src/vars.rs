//! # Scoped key/value variables.
//!
//! Every action carries a [`Vars`] store. Attaching a child links its store to
//! the parent's, and the executor links every appended tree to its own root
//! store, so a lookup walks outward through the enclosing scopes while writes
//! always stay local. Values are [`serde_json::Value`], the same currency the
//! snapshots speak.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

struct VarsInner {
    map: HashMap<String, Value>,
    parent: Option<Vars>,
}

/// Scope-chained variable store. Cloning shares the underlying scope.
#[derive(Clone)]
pub struct Vars {
    inner: Rc<RefCell<VarsInner>>,
}

impl Default for Vars {
    fn default() -> Self {
        Self::new()
    }
}

impl Vars {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(VarsInner {
                map: HashMap::new(),
                parent: None,
            })),
        }
    }

    /// Sets a variable in this scope, shadowing any outer definition.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.borrow_mut().map.insert(key.into(), value);
    }

    /// Looks up a variable, walking outward through parent scopes.
    pub fn get(&self, key: &str) -> Option<Value> {
        let inner = self.inner.borrow();
        if let Some(v) = inner.map.get(key) {
            return Some(v.clone());
        }
        inner.parent.as_ref().and_then(|p| p.get(key))
    }

    /// Removes a variable from this scope only. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.borrow_mut().map.remove(key).is_some()
    }

    /// True if the variable is visible from this scope.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn set_parent(&self, parent: &Vars) {
        self.inner.borrow_mut().parent = Some(parent.clone());
    }

    pub(crate) fn clear_parent(&self) {
        self.inner.borrow_mut().parent = None;
    }
}
