//! Shared key-value scratch space for one behavior tree.

use crate::state::{Value, WorldState};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Flat key -> [`Value`] map read and written by tree nodes during a tick.
///
/// Entries never expire; use [`Blackboard::clear`] to drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blackboard {
    entries: HashMap<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Insert or overwrite an entry, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// `true` only when `key` holds `Value::Bool(true)`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(Value::Bool(true)))
    }

    /// The entry as a number, if it is numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    /// Copy every entry of `context` in, overwriting existing keys.
    pub fn merge<K, I>(&mut self, context: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        for (k, v) in context {
            self.entries.insert(k.into(), v);
        }
    }

    /// Copy the facts of a world state in.
    pub fn merge_state(&mut self, state: &WorldState) {
        for (k, v) in state.iter() {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}
