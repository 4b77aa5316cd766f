//! Node actions and the node registry entry.
//!
//! A [`Node`] is a named unit of work. What it does is a tagged
//! [`NodeKind`]: a user action, a fork point, or a join barrier. Actions
//! implement the object-safe [`NodeAction`] trait so they can be stored as
//! `Arc<dyn NodeAction>` in a flat, name-keyed map.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::fork_join::{JoinStrategy, MergeFn};
use crate::state::GraphState;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, pinned, Send future -- the return type of [`NodeAction::invoke`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe trait for node actions.
///
/// An action receives the current state by value and returns the next
/// state. It may suspend (e.g. awaiting an LLM call) and should honor
/// `ctx.cancellation` for long-running I/O.
pub trait NodeAction: Send + Sync {
    /// Stable identifier for the action type (e.g. `"fn"`, `"retry"`).
    fn kind(&self) -> &'static str;

    /// Execute the action.
    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, state: GraphState) -> BoxFut<'a, Result<GraphState>>;
}

/// A [`NodeAction`] backed by an async closure.
///
/// The closure receives an owned clone of the [`ExecCtx`] so the returned
/// future can be `'static`.
///
/// # Example
///
/// ```
/// use llm_graph::node::from_fn;
///
/// let draft = from_fn(|ctx, mut state| async move {
///     ctx.stream(&state.current_node, "thinking...");
///     state.output = "draft".into();
///     Ok(state)
/// });
/// ```
pub struct FnAction<F> {
    f: F,
}

/// Wrap an async closure `(ExecCtx, GraphState) -> Result<GraphState>`.
pub fn from_fn<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn(ExecCtx, GraphState) -> Fut + Send + Sync,
    Fut: Future<Output = Result<GraphState>> + Send + 'static,
{
    FnAction { f }
}

impl<F, Fut> NodeAction for FnAction<F>
where
    F: Fn(ExecCtx, GraphState) -> Fut + Send + Sync,
    Fut: Future<Output = Result<GraphState>> + Send + 'static,
{
    fn kind(&self) -> &'static str {
        "fn"
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, state: GraphState) -> BoxFut<'a, Result<GraphState>> {
        Box::pin((self.f)(ctx.clone(), state))
    }
}

/// A [`NodeAction`] backed by a synchronous closure.
///
/// For pure state transformations that never suspend.
pub struct SyncAction<F> {
    f: F,
}

/// Wrap a plain closure `GraphState -> Result<GraphState>`.
pub fn sync_fn<F>(f: F) -> SyncAction<F>
where
    F: Fn(GraphState) -> Result<GraphState> + Send + Sync,
{
    SyncAction { f }
}

impl<F> NodeAction for SyncAction<F>
where
    F: Fn(GraphState) -> Result<GraphState> + Send + Sync,
{
    fn kind(&self) -> &'static str {
        "sync"
    }

    fn invoke<'a>(
        &'a self,
        _ctx: &'a ExecCtx,
        state: GraphState,
    ) -> BoxFut<'a, Result<GraphState>> {
        let result = (self.f)(state);
        Box::pin(async move { result })
    }
}

/// What a node does when the engine reaches it.
#[derive(Clone)]
pub enum NodeKind {
    /// Run a user action.
    Action(Arc<dyn NodeAction>),
    /// Clone the state into each branch and run them concurrently.
    Fork {
        /// First node of each branch, in declaration order.
        branches: Vec<String>,
    },
    /// Wait for forked branches per `strategy`, then merge their states.
    Join { strategy: JoinStrategy, merge: MergeFn },
}

impl NodeKind {
    /// Short tag used in logs and visualization.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Action(a) => a.kind(),
            NodeKind::Fork { .. } => "fork",
            NodeKind::Join { .. } => "join",
        }
    }
}

impl std::fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Action(a) => f.debug_tuple("Action").field(&a.kind()).finish(),
            NodeKind::Fork { branches } => {
                f.debug_struct("Fork").field("branches", branches).finish()
            }
            NodeKind::Join { strategy, .. } => {
                f.debug_struct("Join").field("strategy", strategy).finish()
            }
        }
    }
}

/// A named node in a [`GraphDefinition`](crate::GraphDefinition).
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique name; the registry key.
    pub name: String,
    /// Human-readable description (used by visualization export).
    pub description: String,
    pub kind: NodeKind,
}

impl Node {
    /// Create an action node.
    pub fn new(name: impl Into<String>, action: impl NodeAction + 'static) -> Self {
        Self::from_arc(name, Arc::new(action))
    }

    /// Create an action node from a shared action.
    pub fn from_arc(name: impl Into<String>, action: Arc<dyn NodeAction>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind: NodeKind::Action(action),
        }
    }

    /// Create a fork node.
    pub fn fork(name: impl Into<String>, branches: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind: NodeKind::Fork { branches },
        }
    }

    /// Create a join node.
    pub fn join(name: impl Into<String>, strategy: JoinStrategy, merge: MergeFn) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind: NodeKind::Join { strategy, merge },
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_join(&self) -> bool {
        matches!(self.kind, NodeKind::Join { .. })
    }

    pub fn is_fork(&self) -> bool {
        matches!(self.kind, NodeKind::Fork { .. })
    }
}
