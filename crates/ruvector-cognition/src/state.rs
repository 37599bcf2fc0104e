//! World-state values shared by the planner, goal manager, and blackboard.
//!
//! A [`WorldState`] is an opaque string-keyed map of scalar [`Value`]s. The
//! cognition core never inspects it beyond exact key/value equality and a
//! few numeric reads used by constraint checks.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A scalar world-state value.
///
/// Comparison is exact and type-sensitive: `Int(1)` and `Float(1.0)` are
/// different values, and they also serialize differently, so equality and
/// the canonical hash always agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it is an integer or a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string, if this is `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// Key-sorted map of world facts.
///
/// Also used for operator preconditions/effects, method preconditions, and
/// goal conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldState {
    facts: BTreeMap<String, Value>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or overwrite a fact.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.facts.insert(key.into(), value.into());
    }

    /// Look up a fact.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    /// Remove a fact, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.facts.remove(key)
    }

    /// Numeric value under `key`, or `None` when absent or non-numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.facts.get(key).and_then(Value::as_f64)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.facts.iter()
    }

    /// `true` when every key of `conditions` is present here with an equal
    /// value. An empty condition set is always satisfied.
    pub fn satisfies(&self, conditions: &WorldState) -> bool {
        conditions
            .facts
            .iter()
            .all(|(k, v)| self.facts.get(k) == Some(v))
    }

    /// Number of condition keys that are absent or differ.
    pub fn mismatch_count(&self, conditions: &WorldState) -> usize {
        conditions
            .facts
            .iter()
            .filter(|(k, v)| self.facts.get(*k) != Some(*v))
            .count()
    }

    /// Return a copy of this state with `effects` written over it.
    pub fn applied(&self, effects: &WorldState) -> WorldState {
        let mut next = self.clone();
        for (k, v) in &effects.facts {
            next.facts.insert(k.clone(), v.clone());
        }
        next
    }

    /// Merge another state into this one, overwriting existing keys.
    pub fn extend(&mut self, other: &WorldState) {
        for (k, v) in &other.facts {
            self.facts.insert(k.clone(), v.clone());
        }
    }

    /// JSON of the key-sorted map.
    pub fn canonical_string(&self) -> String {
        // BTreeMap<String, Value> always serializes.
        serde_json::to_string(&self.facts).unwrap_or_default()
    }

    /// Order-independent 64-bit hash of [`canonical_string`](Self::canonical_string).
    pub fn canonical_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.canonical_string().hash(&mut hasher);
        hasher.finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for WorldState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut state = WorldState::new();
        for (k, v) in iter {
            state.set(k, v);
        }
        state
    }
}

/// Build a [`WorldState`] from `key => value` pairs.
///
/// ```rust
/// use ruvector_cognition::world_state;
///
/// let s = world_state! { "robot_state" => "idle", "battery" => 80 };
/// assert_eq!(s.len(), 2);
/// ```
#[macro_export]
macro_rules! world_state {
    () => { $crate::state::WorldState::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut s = $crate::state::WorldState::new();
        $( s.set($key, $value); )+
        s
    }};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfies_subset() {
        let state = world_state! { "a" => 1, "b" => true, "c" => "x" };
        assert!(state.satisfies(&world_state! { "a" => 1, "c" => "x" }));
        assert!(state.satisfies(&WorldState::new()));
        assert!(!state.satisfies(&world_state! { "a" => 2 }));
        assert!(!state.satisfies(&world_state! { "missing" => 1 }));
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        let state = world_state! { "x" => 1 };
        assert!(!state.satisfies(&world_state! { "x" => 1.0 }));
        let a = world_state! { "x" => 1 };
        let b = world_state! { "x" => 1.0 };
        assert_ne!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn test_canonical_hash_order_independent() {
        let mut a = WorldState::new();
        a.set("z", 1);
        a.set("a", "v");
        let mut b = WorldState::new();
        b.set("a", "v");
        b.set("z", 1);
        assert_eq!(a.canonical_string(), b.canonical_string());
        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn test_applied_overwrites() {
        let state = world_state! { "robot_state" => "moving", "battery" => 50 };
        let next = state.applied(&world_state! { "robot_state" => "idle" });
        assert_eq!(next.get("robot_state"), Some(&Value::from("idle")));
        assert_eq!(next.number("battery"), Some(50.0));
        // original untouched
        assert_eq!(state.get("robot_state"), Some(&Value::from("moving")));
    }

    #[test]
    fn test_mismatch_count() {
        let state = world_state! { "a" => 1, "b" => 2 };
        let goal = world_state! { "a" => 1, "b" => 3, "c" => 4 };
        assert_eq!(state.mismatch_count(&goal), 2);
    }

    #[test]
    fn test_serde_roundtrip_keeps_types() {
        let state = world_state! { "b" => true, "i" => 3, "f" => 0.5, "s" => "hi" };
        let json = serde_json::to_string(&state).unwrap();
        let back: WorldState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
