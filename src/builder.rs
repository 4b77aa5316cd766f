use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::fork_join::{JoinStrategy, MergeFn};
use crate::graph::{GraphDefinition, DEFAULT_MAX_ITERATIONS};
use crate::node::{Node, NodeAction};
use crate::state::GraphState;
use std::collections::HashMap;

/// Builder for [`GraphDefinition`]s.
///
/// Validation happens once, in [`build`](Self::build): unresolved names,
/// a missing entry node, or a malformed fork fail fast there rather than
/// at run time.
///
/// # Example
///
/// ```
/// use llm_graph::{GraphBuilder, node::sync_fn};
///
/// let graph = GraphBuilder::new("retry")
///     .node("attempt", sync_fn(|mut s| {
///         let n = s.increment("n");
///         s.set("error", n < 3);
///         Ok(s)
///     }))
///     .node("done", sync_fn(|mut s| { s.end(); Ok(s) }))
///     .conditional_edge("attempt", "attempt", |s| s.get_bool("error") == Some(true))
///     .edge("attempt", "done")
///     .build()
///     .unwrap();
///
/// assert_eq!(graph.entry_node(), "attempt");
/// ```
pub struct GraphBuilder {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    entry: Option<String>,
    max_iterations: usize,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            entry: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Register an action node.
    pub fn node(self, name: impl Into<String>, action: impl NodeAction + 'static) -> Self {
        self.add_node(Node::new(name, action))
    }

    /// Register an action node with a description.
    pub fn node_with_description(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        action: impl NodeAction + 'static,
    ) -> Self {
        self.add_node(Node::new(name, action).with_description(description))
    }

    /// Register a prebuilt node.
    pub fn add_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add an unconditional edge.
    pub fn edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_edge(Edge::always(from, to))
    }

    /// Add a conditional edge. Edges out of one node are tried in the
    /// order they were added.
    pub fn conditional_edge<F>(
        self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&GraphState) -> bool + Send + Sync + 'static,
    {
        self.add_edge(Edge::when(from, to, condition))
    }

    /// Add a conditional edge carrying a label for visualization.
    pub fn labeled_edge<F>(
        self,
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&GraphState) -> bool + Send + Sync + 'static,
    {
        self.add_edge(Edge::when(from, to, condition).with_label(label))
    }

    /// Add a prebuilt edge.
    pub fn add_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Register a fork node dispatching to `branches`.
    ///
    /// The fork must get exactly one unconditional edge to its join.
    pub fn fork<I, S>(self, name: impl Into<String>, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let branches = branches.into_iter().map(Into::into).collect();
        self.add_node(Node::fork(name, branches))
    }

    /// Register a join node.
    pub fn join(self, name: impl Into<String>, strategy: JoinStrategy, merge: MergeFn) -> Self {
        self.add_node(Node::join(name, strategy, merge))
    }

    /// Set the entry node. Default: the first node registered.
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Set the iteration cap. Default: [`DEFAULT_MAX_ITERATIONS`].
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Build the graph, validating every reference.
    pub fn build(self) -> Result<GraphDefinition> {
        let entry = match self.entry.or_else(|| self.nodes.first().map(|n| n.name.clone())) {
            Some(entry) => entry,
            None => {
                return Err(GraphError::GraphValidation(format!(
                    "graph '{}' has no nodes",
                    self.name
                )))
            }
        };

        let mut nodes = HashMap::with_capacity(self.nodes.len());
        for node in self.nodes {
            if nodes.contains_key(&node.name) {
                return Err(GraphError::GraphValidation(format!(
                    "node '{}' registered twice",
                    node.name
                )));
            }
            nodes.insert(node.name.clone(), node);
        }

        let graph = GraphDefinition {
            name: self.name,
            entry_node: entry,
            nodes,
            edges: self.edges,
            max_iterations: self.max_iterations,
        };
        graph.validate()?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fork_join::merge;
    use crate::node::sync_fn;

    fn pass() -> impl NodeAction + 'static {
        sync_fn(Ok)
    }

    fn expect_invalid(result: Result<GraphDefinition>, needle: &str) {
        match result {
            Err(GraphError::GraphValidation(msg)) => {
                assert!(msg.contains(needle), "message '{}' lacks '{}'", msg, needle)
            }
            Err(other) => panic!("Expected GraphValidation, got {:?}", other),
            Ok(_) => panic!("Expected GraphValidation, got a graph"),
        }
    }

    #[test]
    fn test_build_success_and_defaults() {
        let graph = GraphBuilder::new("g")
            .node("a", pass())
            .node("b", pass())
            .edge("a", "b")
            .build()
            .unwrap();

        assert_eq!(graph.name(), "g");
        assert_eq!(graph.entry_node(), "a");
        assert_eq!(graph.max_iterations(), DEFAULT_MAX_ITERATIONS);
        assert_eq!(graph.node_names(), vec!["a", "b"]);
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_built_graph_references_resolve() {
        let graph = GraphBuilder::new("g")
            .node("a", pass())
            .node("b", pass())
            .node("c", pass())
            .edge("a", "b")
            .conditional_edge("b", "c", |_| true)
            .edge("c", "a")
            .entry("b")
            .build()
            .unwrap();

        assert!(graph.contains(graph.entry_node()));
        for edge in graph.edges() {
            assert!(graph.contains(&edge.from));
            assert!(graph.contains(&edge.to));
        }
    }

    #[test]
    fn test_empty_graph_fails() {
        expect_invalid(GraphBuilder::new("empty").build(), "no nodes");
    }

    #[test]
    fn test_missing_entry_fails() {
        let result = GraphBuilder::new("g").node("a", pass()).entry("nope").build();
        expect_invalid(result, "entry node 'nope'");
    }

    #[test]
    fn test_dangling_edge_fails() {
        let result = GraphBuilder::new("g").node("a", pass()).edge("a", "ghost").build();
        expect_invalid(result, "unknown node 'ghost'");

        let result = GraphBuilder::new("g").node("a", pass()).edge("ghost", "a").build();
        expect_invalid(result, "unknown node 'ghost'");
    }

    #[test]
    fn test_duplicate_node_fails() {
        let result = GraphBuilder::new("g").node("a", pass()).node("a", pass()).build();
        expect_invalid(result, "registered twice");
    }

    #[test]
    fn test_zero_iterations_fails() {
        let result = GraphBuilder::new("g").node("a", pass()).max_iterations(0).build();
        expect_invalid(result, "max_iterations");
    }

    #[test]
    fn test_routing_takes_first_matching_edge() {
        let graph = GraphBuilder::new("g")
            .node("a", pass())
            .node("b", pass())
            .node("c", pass())
            .conditional_edge("a", "b", |s| s.get_bool("go_b") == Some(true))
            .edge("a", "c")
            .edge("a", "b")
            .build()
            .unwrap();

        let state = GraphState::new().with("go_b", true);
        assert_eq!(graph.route("a", &state), Some("b"));
        assert_eq!(graph.route("a", &GraphState::new()), Some("c"));
        assert_eq!(graph.route("b", &GraphState::new()), None);
    }

    fn fork_graph(strategy: JoinStrategy) -> GraphBuilder {
        GraphBuilder::new("fan")
            .node("start", pass())
            .fork("split", ["x", "y"])
            .node("x", pass())
            .node("y", pass())
            .join("gather", strategy, merge::union())
            .edge("start", "split")
            .edge("x", "gather")
            .edge("y", "gather")
    }

    #[test]
    fn test_fork_with_join_builds() {
        let graph = fork_graph(JoinStrategy::All)
            .edge("split", "gather")
            .build()
            .unwrap();
        assert_eq!(graph.join_for("split"), Some("gather"));
        assert!(graph.node("split").unwrap().is_fork());
    }

    #[test]
    fn test_fork_without_join_edge_fails() {
        expect_invalid(fork_graph(JoinStrategy::All).build(), "exactly one");
    }

    #[test]
    fn test_fork_into_non_join_fails() {
        let result = fork_graph(JoinStrategy::All).edge("split", "x").build();
        expect_invalid(result, "not a join");
    }

    #[test]
    fn test_fork_unknown_branch_fails() {
        let result = GraphBuilder::new("g")
            .fork("split", ["ghost"])
            .join("gather", JoinStrategy::All, merge::union())
            .edge("split", "gather")
            .build();
        expect_invalid(result, "unknown branch node 'ghost'");
    }

    #[test]
    fn test_fork_without_branches_fails() {
        let result = GraphBuilder::new("g")
            .fork("split", Vec::<String>::new())
            .join("gather", JoinStrategy::All, merge::union())
            .edge("split", "gather")
            .build();
        expect_invalid(result, "no branches");
    }

    #[test]
    fn test_count_exceeding_branches_fails() {
        let result = fork_graph(JoinStrategy::Count(3))
            .edge("split", "gather")
            .build();
        expect_invalid(result, "requires 3 branches");
    }

    #[test]
    fn test_count_zero_fails() {
        let result = fork_graph(JoinStrategy::Count(0))
            .edge("split", "gather")
            .build();
        expect_invalid(result, "at least one branch");
    }
}
