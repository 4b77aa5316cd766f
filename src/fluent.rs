//! Cursor-based graph construction.
//!
//! [`FluentGraph`] keeps a cursor on the most recently placed node so
//! linear chains read top to bottom. Anything the cursor sugar cannot
//! express falls back to explicit [`edge`](FluentGraph::edge) calls.

use crate::builder::GraphBuilder;
use crate::error::{GraphError, Result};
use crate::fork_join::{JoinStrategy, MergeFn};
use crate::graph::GraphDefinition;
use crate::node::{sync_fn, NodeAction};
use crate::state::GraphState;

/// Name of the built-in terminal node wired in by [`FluentGraph::end`].
pub const END: &str = "__end__";

/// Fluent graph builder.
///
/// # Example
///
/// ```
/// use llm_graph::{FluentGraph, node::sync_fn};
///
/// let graph = FluentGraph::new("review")
///     .start("draft", sync_fn(|mut s| { s.increment("drafts"); Ok(s) }))
///     .next("critique", sync_fn(|mut s| {
///         s.set("approved", s.get_i64("drafts") == Some(2));
///         Ok(s)
///     }))
///     .if_else(|s| s.get_bool("approved") == Some(true), "publish", Some("draft"))
///     .add("publish", sync_fn(Ok))
///     .at("publish")
///     .end()
///     .build()
///     .unwrap();
///
/// assert_eq!(graph.entry_node(), "draft");
/// ```
pub struct FluentGraph {
    builder: GraphBuilder,
    cursor: Option<String>,
    has_end: bool,
    error: Option<String>,
}

impl FluentGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            builder: GraphBuilder::new(name),
            cursor: None,
            has_end: false,
            error: None,
        }
    }

    /// Register the entry node and put the cursor on it.
    pub fn start(mut self, name: impl Into<String>, action: impl NodeAction + 'static) -> Self {
        let name = name.into();
        self.builder = self.builder.node(name.clone(), action).entry(name.clone());
        self.cursor = Some(name);
        self
    }

    /// Register a node, wire the cursor into it, and advance the cursor.
    ///
    /// Without a cursor this behaves like [`start`](Self::start).
    pub fn next(mut self, name: impl Into<String>, action: impl NodeAction + 'static) -> Self {
        let name = name.into();
        self.builder = match self.cursor.take() {
            Some(from) => self.builder.node(name.clone(), action).edge(from, name.clone()),
            None => self.builder.node(name.clone(), action).entry(name.clone()),
        };
        self.cursor = Some(name);
        self
    }

    /// Branch from the cursor: a conditional edge to `if_true`, then an
    /// unconditional fallback to `if_false` when given.
    ///
    /// The cursor stays where it is; move it with [`at`](Self::at).
    pub fn if_else<F>(mut self, condition: F, if_true: &str, if_false: Option<&str>) -> Self
    where
        F: Fn(&GraphState) -> bool + Send + Sync + 'static,
    {
        let Some(from) = self.require_cursor("if_else") else {
            return self;
        };
        self.builder = self.builder.conditional_edge(from.clone(), if_true, condition);
        if let Some(fallback) = if_false {
            self.builder = self.builder.edge(from, fallback);
        }
        self
    }

    /// Move the cursor to an already registered (or later registered) node.
    pub fn at(mut self, name: impl Into<String>) -> Self {
        self.cursor = Some(name.into());
        self
    }

    /// Register a node without wiring it or moving the cursor.
    pub fn add(mut self, name: impl Into<String>, action: impl NodeAction + 'static) -> Self {
        self.builder = self.builder.node(name, action);
        self
    }

    /// Add an unconditional edge.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.builder = self.builder.edge(from, to);
        self
    }

    /// Add a conditional edge.
    pub fn conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&GraphState) -> bool + Send + Sync + 'static,
    {
        self.builder = self.builder.conditional_edge(from, to, condition);
        self
    }

    /// Register a fork, wire the cursor into it, and move the cursor onto it.
    pub fn fork<I, S>(mut self, name: impl Into<String>, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        self.builder = self.builder.fork(name.clone(), branches);
        if let Some(from) = self.cursor.take() {
            self.builder = self.builder.edge(from, name.clone());
        }
        self.cursor = Some(name);
        self
    }

    /// Register a join, wire the cursor (normally the fork) into it, and
    /// move the cursor onto it. Branch edges into the join are explicit.
    pub fn join(mut self, name: impl Into<String>, strategy: JoinStrategy, merge: MergeFn) -> Self {
        let name = name.into();
        self.builder = self.builder.join(name.clone(), strategy, merge);
        if let Some(from) = self.cursor.take() {
            self.builder = self.builder.edge(from, name.clone());
        }
        self.cursor = Some(name);
        self
    }

    /// Wire the cursor into the terminal node [`END`].
    pub fn end(mut self) -> Self {
        let Some(from) = self.require_cursor("end") else {
            return self;
        };
        if !self.has_end {
            self.builder = self.builder.node(
                END,
                sync_fn(|mut s: GraphState| {
                    s.end();
                    Ok(s)
                }),
            );
            self.has_end = true;
        }
        self.builder = self.builder.edge(from, END);
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.builder = self.builder.max_iterations(max);
        self
    }

    /// Build and validate the graph.
    pub fn build(self) -> Result<GraphDefinition> {
        if let Some(message) = self.error {
            return Err(GraphError::GraphValidation(message));
        }
        self.builder.build()
    }

    fn require_cursor(&mut self, op: &str) -> Option<String> {
        match &self.cursor {
            Some(cursor) => Some(cursor.clone()),
            None => {
                self.error
                    .get_or_insert_with(|| format!("{}() called with no current node", op));
                None
            }
        }
    }
}
