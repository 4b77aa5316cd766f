//! Static graph definition.
//!
//! Nodes and edges live in flat, name-keyed collections owned by the
//! [`GraphDefinition`]. Cycles, self-loops included, are just repeated
//! lookups by name. Definitions are produced by
//! [`GraphBuilder`](crate::GraphBuilder) or [`FluentGraph`](crate::FluentGraph),
//! which validate them before handing them out.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::fork_join::JoinStrategy;
use crate::node::{Node, NodeKind};
use crate::state::GraphState;
use std::collections::{HashMap, HashSet};

/// Default cap on loop iterations per execution.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// A validated graph: nodes, edges, entry point, and iteration cap.
#[derive(Debug, Clone)]
pub struct GraphDefinition {
    pub(crate) name: String,
    pub(crate) entry_node: String,
    pub(crate) nodes: HashMap<String, Node>,
    /// Declaration order matters: routing takes the first matching edge.
    pub(crate) edges: Vec<Edge>,
    pub(crate) max_iterations: usize,
}

impl GraphDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_node(&self) -> &str {
        &self.entry_node
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn nodes(&self) -> &HashMap<String, Node> {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Node names sorted alphabetically (stable output for exports).
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Edges leaving `from`, in declaration order.
    pub fn outgoing<'a, 'b>(&'a self, from: &'b str) -> impl Iterator<Item = &'a Edge> + 'b
    where
        'a: 'b,
    {
        self.edges.iter().filter(move |e| e.from == from)
    }

    /// Declarative routing: the target of the first edge out of `from`
    /// whose condition is absent or true.
    pub fn route(&self, from: &str, state: &GraphState) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.from == from && e.matches(state))
            .map(|e| e.to.as_str())
    }

    /// The join node a fork continues into (its single outgoing edge).
    pub fn join_for(&self, fork: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.from == fork)
            .map(|e| e.to.as_str())
    }

    /// Check every structural invariant. Called by the builders.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(invalid(format!("graph '{}' has no nodes", self.name)));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1"));
        }
        if !self.contains(&self.entry_node) {
            return Err(invalid(format!(
                "entry node '{}' is not registered",
                self.entry_node
            )));
        }

        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !self.contains(endpoint) {
                    return Err(invalid(format!(
                        "edge {} -> {} references unknown node '{}'",
                        edge.from, edge.to, endpoint
                    )));
                }
            }
        }

        for node in self.nodes.values() {
            match &node.kind {
                NodeKind::Fork { branches } => self.validate_fork(&node.name, branches)?,
                NodeKind::Join {
                    strategy: JoinStrategy::Count(0),
                    ..
                } => {
                    return Err(invalid(format!(
                        "join '{}' requires at least one branch",
                        node.name
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn validate_fork(&self, fork: &str, branches: &[String]) -> Result<()> {
        if branches.is_empty() {
            return Err(invalid(format!("fork '{}' has no branches", fork)));
        }
        let mut seen = HashSet::new();
        for branch in branches {
            if !self.contains(branch) {
                return Err(invalid(format!(
                    "fork '{}' references unknown branch node '{}'",
                    fork, branch
                )));
            }
            if !seen.insert(branch.as_str()) {
                return Err(invalid(format!(
                    "fork '{}' lists branch '{}' twice",
                    fork, branch
                )));
            }
        }

        let outgoing: Vec<&Edge> = self.outgoing(fork).collect();
        let join = match outgoing.as_slice() {
            [edge] if !edge.is_conditional() => &edge.to,
            _ => {
                return Err(invalid(format!(
                    "fork '{}' must have exactly one unconditional edge to its join",
                    fork
                )))
            }
        };
        match self.node(join).map(|n| &n.kind) {
            Some(NodeKind::Join { strategy, .. }) => {
                if strategy.required(branches.len()) > branches.len() {
                    return Err(invalid(format!(
                        "join '{}' requires {} branches but fork '{}' has {}",
                        join,
                        strategy.required(branches.len()),
                        fork,
                        branches.len()
                    )));
                }
                Ok(())
            }
            _ => Err(invalid(format!(
                "fork '{}' continues into '{}', which is not a join",
                fork, join
            ))),
        }
    }
}

fn invalid(message: impl Into<String>) -> GraphError {
    GraphError::GraphValidation(message.into())
}
