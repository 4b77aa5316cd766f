use crate::state::GraphState;
use std::sync::Arc;

/// Predicate deciding whether an edge may be traversed.
///
/// Must be side-effect-free and fast: conditions are evaluated
/// synchronously during routing.
pub type EdgeCondition = Arc<dyn Fn(&GraphState) -> bool + Send + Sync>;

/// A directed, optionally conditioned transition between two nodes.
#[derive(Clone)]
pub struct Edge {
    /// Source node name.
    pub from: String,
    /// Target node name.
    pub to: String,
    /// `None` means unconditional.
    pub condition: Option<EdgeCondition>,
    /// Optional label shown by visualization export.
    pub label: Option<String>,
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
            label: None,
        }
    }

    /// Create a conditional edge.
    pub fn when<F>(from: impl Into<String>, to: impl Into<String>, condition: F) -> Self
    where
        F: Fn(&GraphState) -> bool + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
            label: None,
        }
    }

    /// Attach a label for visualization.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Whether this edge may be taken from `state`.
    pub fn matches(&self, state: &GraphState) -> bool {
        self.condition.as_ref().map_or(true, |c| c(state))
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("conditional", &self.condition.is_some())
            .field("label", &self.label)
            .finish()
    }
}

/// Condition: `data[key]` is the boolean `true`.
pub fn flag(key: &'static str) -> impl Fn(&GraphState) -> bool + Send + Sync + 'static {
    move |s: &GraphState| s.get_bool(key) == Some(true)
}

/// Condition: `data[key]` is the string `value`.
pub fn equals(
    key: impl Into<String>,
    value: impl Into<String>,
) -> impl Fn(&GraphState) -> bool + Send + Sync + 'static {
    let key = key.into();
    let value = value.into();
    move |s: &GraphState| s.get_str(&key) == Some(value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_builders() {
        let e = Edge::always("a", "b");
        assert_eq!(e.from, "a");
        assert_eq!(e.to, "b");
        assert!(!e.is_conditional());
        assert!(e.matches(&GraphState::new()));

        let e = Edge::when("a", "c", |s| s.get_i64("n") == Some(1)).with_label("n == 1");
        assert!(e.is_conditional());
        assert_eq!(e.label.as_deref(), Some("n == 1"));
    }

    #[test]
    fn test_condition_evaluation() {
        let e = Edge::when("a", "b", |s| s.get_i64("n").unwrap_or(0) > 2);
        assert!(!e.matches(&GraphState::new().with("n", 1)));
        assert!(e.matches(&GraphState::new().with("n", 3)));
    }

    #[test]
    fn test_flag_condition() {
        let e = Edge::when("attempt", "attempt", flag("error"));
        assert!(e.matches(&GraphState::new().with("error", true)));
        assert!(!e.matches(&GraphState::new().with("error", false)));
        assert!(!e.matches(&GraphState::new()));
    }

    #[test]
    fn test_equals_condition() {
        let e = Edge::when("route", "search", equals("intent", "search"));
        assert!(e.matches(&GraphState::new().with("intent", "search")));
        assert!(!e.matches(&GraphState::new().with("intent", "chat")));
    }
}
