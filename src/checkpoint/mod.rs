//! Checkpoint persistence.
//!
//! A [`Checkpoint`] is a snapshot of a run's data plus its position in the
//! graph. `current_node` is the node that runs *next* on resume, so the
//! node that produced the checkpoint is never re-run.
//!
//! Storage sits behind the async [`CheckpointStore`] trait:
//! - [`InMemoryCheckpointStore`] for tests and short-lived processes
//! - [`FileCheckpointStore`] for one-JSON-file-per-checkpoint persistence

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use crate::error::Result;
use crate::state::{GraphState, StateData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serializable snapshot of an execution.
///
/// Serialized with camelCase field names and RFC 3339 timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub graph_name: String,
    /// Node to run next on resume.
    pub current_node: String,
    pub state_data: StateData,
    /// Last `output` text at the time of the snapshot.
    ///
    /// Not one of the core checkpoint fields. It is written only when
    /// non-empty and defaults to empty on read, so files without it load
    /// unchanged.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    /// Nodes visited so far, in order.
    #[serde(default)]
    pub execution_history: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Snapshot `state`, positioned to resume at `next_node`.
    pub fn new(
        id: impl Into<String>,
        graph_name: impl Into<String>,
        next_node: impl Into<String>,
        state: &GraphState,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            graph_name: graph_name.into(),
            current_node: next_node.into(),
            state_data: state.data.clone(),
            output: state.output.clone(),
            execution_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the visited-node history.
    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.execution_history = history;
        self
    }

    /// Rebuild the state this checkpoint resumes with.
    pub fn to_state(&self) -> GraphState {
        GraphState {
            current_node: self.current_node.clone(),
            next_node: None,
            should_end: false,
            output: self.output.clone(),
            data: self.state_data.clone(),
        }
    }
}

/// Async persistence backend for checkpoints.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Insert or overwrite by id. Sets `updated_at` to now.
    async fn save(&self, checkpoint: &mut Checkpoint) -> Result<()>;

    /// Fetch by id; `None` when absent.
    async fn load(&self, id: &str) -> Result<Option<Checkpoint>>;

    /// All checkpoints of `graph_name`, most recently updated first.
    async fn list(&self, graph_name: &str) -> Result<Vec<Checkpoint>>;

    /// Remove by id. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;
}

fn sort_newest_first(checkpoints: &mut [Checkpoint]) {
    checkpoints.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_camel_case() {
        let state = GraphState::new().with("n", 2);
        let cp = Checkpoint::new("run-1", "retry", "done", &state)
            .with_history(vec!["attempt".into()]);

        let value = serde_json::to_value(&cp).unwrap();
        assert_eq!(value["graphName"], json!("retry"));
        assert_eq!(value["currentNode"], json!("done"));
        assert_eq!(value["stateData"], json!({"n": 2}));
        assert_eq!(value["executionHistory"], json!(["attempt"]));
        assert!(value["createdAt"].is_string());
        assert!(value.get("output").is_none());
    }

    #[test]
    fn test_output_serialized_when_present() {
        let mut state = GraphState::new();
        state.output = "draft 2".into();
        let cp = Checkpoint::new("run-2", "essay", "review", &state);

        let value = serde_json::to_value(&cp).unwrap();
        assert_eq!(value["output"], json!("draft 2"));
        let back: Checkpoint = serde_json::from_value(value).unwrap();
        assert_eq!(back.output, "draft 2");
    }

    #[test]
    fn test_to_state_resumes_at_current_node() {
        let mut state = GraphState::new().with("draft", "v2");
        state.output = "partial".into();
        state.should_end = true;

        let restored = Checkpoint::new("c", "g", "review", &state).to_state();
        assert_eq!(restored.current_node, "review");
        assert_eq!(restored.get_str("draft"), Some("v2"));
        assert_eq!(restored.output, "partial");
        assert!(!restored.should_end);
        assert!(restored.next_node.is_none());
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let raw = r#"{
            "id": "c1",
            "graphName": "g",
            "currentNode": "a",
            "stateData": {"k": true},
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:05Z"
        }"#;
        let cp: Checkpoint = serde_json::from_str(raw).unwrap();
        assert!(cp.execution_history.is_empty());
        assert_eq!(cp.to_state().get_bool("k"), Some(true));
        assert!(cp.updated_at > cp.created_at);
    }
}
