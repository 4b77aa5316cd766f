//! Mutable execution state threaded through every node invocation.
//!
//! [`GraphState`] is the only thing node actions receive and return. The
//! `data` map is the general-purpose payload: nodes read and write it to
//! pass information between steps. Values are `serde_json::Value`, so any
//! state can be checkpointed without a custom serializer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered string-keyed payload carried by a [`GraphState`].
///
/// Insertion order is preserved (serde_json `preserve_order`).
pub type StateData = Map<String, Value>;

/// Execution context passed through and returned by every node action.
///
/// # Example
///
/// ```
/// use llm_graph::GraphState;
///
/// let mut state = GraphState::new().with("attempts", 0);
/// state.set("draft", "hello");
/// assert_eq!(state.get_i64("attempts"), Some(0));
/// assert_eq!(state.get_str("draft"), Some("hello"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    /// Node currently executing (or, before a run, the node to start at).
    /// Empty means "start at the graph's entry node".
    pub current_node: String,
    /// Explicit route chosen by an action. Takes precedence over edges and
    /// is cleared by the engine once consumed.
    pub next_node: Option<String>,
    /// Terminal signal, independent of edge topology.
    pub should_end: bool,
    /// Free-form output text, typically the final answer.
    pub output: String,
    /// General-purpose payload.
    pub data: StateData,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state seeded with the given data.
    pub fn from_data(data: StateData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Create a state positioned at `node`, so execution starts there
    /// instead of at the entry node.
    pub fn at(node: impl Into<String>) -> Self {
        Self {
            current_node: node.into(),
            ..Self::default()
        }
    }

    /// Insert a value (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert a value, replacing any existing value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Remove a key, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Route explicitly to `node` after the current action returns.
    pub fn route_to(&mut self, node: impl Into<String>) {
        self.next_node = Some(node.into());
    }

    /// Mark the execution as finished.
    pub fn end(&mut self) {
        self.should_end = true;
    }

    /// Increment an integer counter in `data`, treating a missing key as 0.
    /// Returns the new value.
    pub fn increment(&mut self, key: &str) -> i64 {
        let next = self.get_i64(key).unwrap_or(0) + 1;
        self.set(key, next);
        next
    }

    /// Deserialize a data entry into a typed value.
    pub fn parse_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.data.get(key) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_accessors() {
        let state = GraphState::new()
            .with("n", 3)
            .with("ok", true)
            .with("name", "draft")
            .with("score", 0.5);

        assert_eq!(state.get_i64("n"), Some(3));
        assert_eq!(state.get_bool("ok"), Some(true));
        assert_eq!(state.get_str("name"), Some("draft"));
        assert_eq!(state.get_f64("score"), Some(0.5));
        assert_eq!(state.get_i64("missing"), None);
        assert_eq!(state.get_i64("name"), None);
    }

    #[test]
    fn test_data_preserves_insertion_order() {
        let state = GraphState::new().with("z", 1).with("a", 2).with("m", 3);
        let keys: Vec<&String> = state.data.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_increment_from_missing() {
        let mut state = GraphState::new();
        assert_eq!(state.increment("n"), 1);
        assert_eq!(state.increment("n"), 2);
        assert_eq!(state.get("n"), Some(&json!(2)));
    }

    #[test]
    fn test_route_and_end() {
        let mut state = GraphState::at("start");
        assert_eq!(state.current_node, "start");
        state.route_to("b");
        state.end();
        assert_eq!(state.next_node.as_deref(), Some("b"));
        assert!(state.should_end);
    }

    #[test]
    fn test_remove_and_contains() {
        let mut state = GraphState::new().with("k", "v");
        assert!(state.contains("k"));
        assert_eq!(state.remove("k"), Some(json!("v")));
        assert!(!state.contains("k"));
    }

    #[test]
    fn test_parse_as() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Review {
            score: u8,
        }

        let state = GraphState::new().with("review", json!({"score": 7}));
        let review: Option<Review> = state.parse_as("review").unwrap();
        assert_eq!(review, Some(Review { score: 7 }));

        let missing: Option<Review> = state.parse_as("other").unwrap();
        assert!(missing.is_none());

        let bad = GraphState::new().with("review", "not an object");
        assert!(bad.parse_as::<Review>("review").is_err());
    }
}
