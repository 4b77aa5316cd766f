use super::{sort_newest_first, Checkpoint, CheckpointStore};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Checkpoints held in a process-local map. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }

    /// Drop every checkpoint.
    pub async fn clear(&self) {
        self.checkpoints.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.updated_at = Utc::now();
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(id).cloned())
    }

    async fn list(&self, graph_name: &str) -> Result<Vec<Checkpoint>> {
        let mut found: Vec<Checkpoint> = self
            .checkpoints
            .read()
            .await
            .values()
            .filter(|c| c.graph_name == graph_name)
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.checkpoints.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GraphState;
    use std::time::Duration;

    fn checkpoint(id: &str, graph: &str) -> Checkpoint {
        Checkpoint::new(id, graph, "next", &GraphState::new().with("id", id))
    }

    #[tokio::test]
    async fn test_save_then_load_equal() {
        let store = InMemoryCheckpointStore::new();
        let mut cp = checkpoint("a", "g");
        store.save(&mut cp).await.unwrap();

        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded, cp);
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_and_touches_updated_at() {
        let store = InMemoryCheckpointStore::new();
        let mut cp = checkpoint("a", "g");
        store.save(&mut cp).await.unwrap();
        let first = cp.updated_at;

        tokio::time::sleep(Duration::from_millis(5)).await;
        cp.current_node = "later".into();
        store.save(&mut cp).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded.current_node, "later");
        assert!(loaded.updated_at > first);
        assert_eq!(loaded.created_at, cp.created_at);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let store = InMemoryCheckpointStore::new();
        for id in ["one", "two", "three"] {
            store.save(&mut checkpoint(id, "g")).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        store.save(&mut checkpoint("other", "h")).await.unwrap();

        let ids: Vec<String> = store.list("g").await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["three", "two", "one"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryCheckpointStore::new();
        store.save(&mut checkpoint("a", "g")).await.unwrap();

        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryCheckpointStore::new();
        store.save(&mut checkpoint("a", "g")).await.unwrap();
        store.save(&mut checkpoint("b", "g")).await.unwrap();
        store.clear().await;
        assert_eq!(store.len().await, 0);
    }
}
