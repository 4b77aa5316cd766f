use crate::state::GraphState;
use thiserror::Error;

/// Errors produced while building or executing a graph.
///
/// Run-time routing and execution failures carry the last good
/// [`GraphState`] so callers can inspect partial output. Use
/// [`GraphError::state`] to get at it without matching every variant.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The graph failed validation in [`GraphBuilder::build`](crate::GraphBuilder::build).
    #[error("Invalid graph: {0}")]
    GraphValidation(String),

    /// Routing selected a node name that is not registered.
    #[error("Unknown node '{node}'")]
    UnknownNode {
        node: String,
        state: Box<GraphState>,
    },

    /// No explicit route was set and no outgoing edge matched.
    #[error("No applicable edge out of node '{node}'")]
    NoApplicableEdge {
        node: String,
        state: Box<GraphState>,
    },

    /// A node action returned an error.
    #[error("Node '{node}' failed: {message}")]
    NodeExecution {
        node: String,
        message: String,
        /// State as it was before the failing node ran.
        state: Box<GraphState>,
    },

    /// The loop ran `max` iterations without `should_end` being set.
    #[error("Iteration limit of {max} exceeded")]
    IterationLimitExceeded { max: usize, state: Box<GraphState> },

    /// A forked branch failed under [`JoinStrategy::All`](crate::JoinStrategy::All).
    #[error("Branch '{branch}' failed: {message}")]
    BranchExecution { branch: String, message: String },

    /// A join could no longer be satisfied because too many branches failed.
    #[error("Join '{join}' failed: {message}")]
    JoinFailed { join: String, message: String },

    /// Checkpoint storage failed (I/O, serialization, invalid id).
    #[error("Checkpoint persistence failed: {0}")]
    Persistence(String),

    /// Resume was requested for a checkpoint id that does not exist.
    #[error("Checkpoint '{0}' not found")]
    CheckpointNotFound(String),

    /// Engine configuration is inconsistent (e.g. auto-checkpointing
    /// without a store).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Execution was cancelled via the context's cancellation token.
    #[error("Graph execution was cancelled")]
    Cancelled,

    /// JSON (de)serialization failed at the serde level.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors, typically raised inside node actions.
    #[error("{0}")]
    Other(String),
}

impl GraphError {
    /// The last good state carried by run-time errors, if any.
    pub fn state(&self) -> Option<&GraphState> {
        match self {
            GraphError::UnknownNode { state, .. }
            | GraphError::NoApplicableEdge { state, .. }
            | GraphError::NodeExecution { state, .. }
            | GraphError::IterationLimitExceeded { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Consume the error and return its carried state, if any.
    pub fn into_state(self) -> Option<GraphState> {
        match self {
            GraphError::UnknownNode { state, .. }
            | GraphError::NoApplicableEdge { state, .. }
            | GraphError::NodeExecution { state, .. }
            | GraphError::IterationLimitExceeded { state, .. } => Some(*state),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GraphError::Cancelled)
    }
}

impl From<anyhow::Error> for GraphError {
    fn from(err: anyhow::Error) -> Self {
        GraphError::Other(err.to_string())
    }
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        GraphError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_accessor_on_routing_errors() {
        let mut state = GraphState::new();
        state.set("n", 2);
        let err = GraphError::NoApplicableEdge {
            node: "a".into(),
            state: Box::new(state),
        };
        assert_eq!(err.state().and_then(|s| s.get_i64("n")), Some(2));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_state_absent_on_build_errors() {
        let err = GraphError::GraphValidation("entry missing".into());
        assert!(err.state().is_none());
        assert!(err.into_state().is_none());
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: GraphError = anyhow::anyhow!("llm timeout").into();
        match err {
            GraphError::Other(msg) => assert_eq!(msg, "llm timeout"),
            other => panic!("Expected Other, got {:?}", other),
        }
    }

    #[test]
    fn test_io_error_is_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: GraphError = io.into();
        assert!(matches!(err, GraphError::Persistence(_)));
    }
}
