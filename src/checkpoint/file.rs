use super::{sort_newest_first, Checkpoint, CheckpointStore};
use crate::error::{GraphError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Checkpoints stored as `{id}.json` files in one directory.
///
/// Writes go to a temporary file that is then renamed over the target,
/// so a reader never sees a half-written checkpoint. Concurrent saves of
/// the same id are serialized; different ids proceed in parallel.
///
/// # Example
///
/// ```no_run
/// use llm_graph::checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore};
/// use llm_graph::GraphState;
///
/// # async fn demo() -> llm_graph::Result<()> {
/// let store = FileCheckpointStore::open("./checkpoints")?;
/// let mut cp = Checkpoint::new("run-1", "retry", "attempt", &GraphState::new());
/// store.save(&mut cp).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileCheckpointStore {
    /// Use `dir` for checkpoint files, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            GraphError::Persistence(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `None` for ids that cannot name a file in `dir`: empty, `.`, `..`,
    /// or containing a path separator or NUL.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
            return None;
        }
        Some(self.dir.join(format!("{}.json", id)))
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the map entry for `id` once no other caller holds its lock.
    async fn release(&self, id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks.get(id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(id);
        }
    }

    async fn write_file(&self, path: &Path, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.updated_at = Utc::now();
        let body = serde_json::to_vec_pretty(checkpoint)?;

        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", checkpoint.id, uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, &body).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(GraphError::Persistence(format!(
                "write {}: {}",
                tmp.display(),
                e
            )));
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(GraphError::Persistence(format!(
                "rename to {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        let path = self.path_for(&checkpoint.id).ok_or_else(|| {
            GraphError::Persistence(format!("invalid checkpoint id '{}'", checkpoint.id))
        })?;
        let id = checkpoint.id.clone();
        let lock = self.lock_for(&id).await;
        let result = {
            let _guard = lock.lock().await;
            self.write_file(&path, checkpoint).await
        };
        self.release(&id, lock).await;

        if result.is_ok() {
            debug!(id = %id, path = %path.display(), "Checkpoint written");
        }
        result
    }

    async fn load(&self, id: &str) -> Result<Option<Checkpoint>> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| GraphError::Persistence(format!("corrupt checkpoint '{}': {}", id, e)))
    }

    async fn list(&self, graph_name: &str) -> Result<Vec<Checkpoint>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let body = match tokio::fs::read(&path).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable checkpoint");
                    continue;
                }
            };
            match serde_json::from_slice::<Checkpoint>(&body) {
                Ok(cp) if cp.graph_name == graph_name => found.push(cp),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt checkpoint");
                }
            }
        }

        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let Some(path) = self.path_for(id) else {
            return Ok(());
        };
        let lock = self.lock_for(id).await;
        let result = {
            let _guard = lock.lock().await;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        };
        self.release(id, lock).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GraphState;
    use std::time::Duration;

    fn checkpoint(id: &str, graph: &str) -> Checkpoint {
        Checkpoint::new(id, graph, "review", &GraphState::new().with("draft", id))
            .with_history(vec!["write".into()])
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("checkpoints");
        let store = FileCheckpointStore::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        let mut cp = checkpoint("run-1", "g");
        store.save(&mut cp).await.unwrap();

        assert!(tmp.path().join("run-1.json").is_file());
        let loaded = store.load("run-1").await.unwrap().unwrap();
        assert_eq!(loaded, cp);
    }

    #[tokio::test]
    async fn test_file_is_pretty_camel_case_json() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        store.save(&mut checkpoint("c", "g")).await.unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("c.json")).unwrap();
        assert!(raw.contains("\n"));
        assert!(raw.contains("\"graphName\": \"g\""));
        assert!(raw.contains("\"executionHistory\""));
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        for id in ["../escape", "a/b", "a\\b", "", "..", "nul\0"] {
            let err = store.save(&mut checkpoint(id, "g")).await.unwrap_err();
            assert!(matches!(err, GraphError::Persistence(_)), "id {:?}", id);
        }
    }

    #[tokio::test]
    async fn test_unusable_ids_read_as_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        for id in ["a/b", "..", ""] {
            assert!(store.load(id).await.unwrap().is_none(), "id {:?}", id);
            store.delete(id).await.unwrap();
        }
        assert!(store.list("g").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dotted_ids_are_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        let mut cp = checkpoint("v1..v2", "g");
        store.save(&mut cp).await.unwrap();

        assert!(tmp.path().join("v1..v2.json").is_file());
        assert_eq!(store.load("v1..v2").await.unwrap().unwrap(), cp);
        store.delete("v1..v2").await.unwrap();
        assert!(store.load("v1..v2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_use() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCheckpointStore::open(tmp.path()).unwrap());

        for i in 0..20 {
            let id = format!("run-{}", i);
            store.save(&mut checkpoint(&id, "g")).await.unwrap();
            store.delete(&id).await.unwrap();
        }
        assert!(store.locks.lock().await.is_empty());

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let mut cp = Checkpoint::new("busy", "g", format!("n{}", i), &GraphState::new());
                store.save(&mut cp).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(store.locks.lock().await.is_empty());
        assert!(store.load("busy").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        store.save(&mut checkpoint("old", "g")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.save(&mut checkpoint("new", "g")).await.unwrap();
        store.save(&mut checkpoint("elsewhere", "h")).await.unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let ids: Vec<String> = store.list("g").await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_corrupt_load_is_persistence_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("bad.json"), "[]").unwrap();
        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, GraphError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(tmp.path()).unwrap();
        store.save(&mut checkpoint("gone", "g")).await.unwrap();

        store.delete("gone").await.unwrap();
        store.delete("gone").await.unwrap();
        assert!(store.load("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_saves_same_id_leave_valid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCheckpointStore::open(tmp.path()).unwrap());

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let mut cp = Checkpoint::new("shared", "g", format!("n{}", i), &GraphState::new());
                store.save(&mut cp).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let loaded = store.load("shared").await.unwrap().unwrap();
        assert!(loaded.current_node.starts_with('n'));
        let leftovers = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
