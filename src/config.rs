//! Engine configuration.
//!
//! [`EngineConfig`] is plain serde data so it can live in a JSON (or, with
//! the `yaml` feature, YAML) file next to the rest of an application's
//! settings. Every field has a default; an empty document is valid.

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings applied by [`ExecutionEngine::from_config`](crate::ExecutionEngine::from_config).
///
/// # Example
///
/// ```
/// use llm_graph::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "maxIterations": 50 }"#).unwrap();
/// assert_eq!(config.max_iterations, Some(50));
/// assert!(!config.auto_checkpoint);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Overrides the graph's own iteration cap.
    pub max_iterations: Option<usize>,

    /// Save a checkpoint after every routed step. Default: false.
    pub auto_checkpoint: bool,

    /// Directory for a [`FileCheckpointStore`](crate::checkpoint::FileCheckpointStore).
    /// Without it, no store is opened.
    pub checkpoint_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_auto_checkpoint(mut self, enabled: bool) -> Self {
        self.auto_checkpoint = enabled;
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| GraphError::InvalidConfig(format!("bad JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML. Requires the `yaml` feature flag.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|e| GraphError::InvalidConfig(format!("bad YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, picking the format by extension
    /// (`.yaml`/`.yml` need the `yaml` feature; anything else is JSON).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GraphError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            #[cfg(feature = "yaml")]
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            #[cfg(not(feature = "yaml"))]
            Some("yaml") | Some("yml") => Err(GraphError::InvalidConfig(
                "YAML config requires the `yaml` feature".into(),
            )),
            _ => Self::from_json_str(&raw),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == Some(0) {
            return Err(GraphError::InvalidConfig(
                "maxIterations must be at least 1".into(),
            ));
        }
        if self.auto_checkpoint && self.checkpoint_dir.is_none() {
            return Err(GraphError::InvalidConfig(
                "autoCheckpoint requires checkpointDir".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_full_json() {
        let config = EngineConfig::from_json_str(
            r#"{"maxIterations": 10, "autoCheckpoint": true, "checkpointDir": "/tmp/cp"}"#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, Some(10));
        assert!(config.auto_checkpoint);
        assert_eq!(config.checkpoint_dir, Some(PathBuf::from("/tmp/cp")));
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let err = EngineConfig::from_json_str(r#"{"maxIterations": 0}"#).unwrap_err();
        assert!(matches!(err, GraphError::InvalidConfig(_)));
    }

    #[test]
    fn test_auto_checkpoint_needs_dir() {
        let err = EngineConfig::new().with_auto_checkpoint(true).validate().unwrap_err();
        assert!(err.to_string().contains("checkpointDir"));
        assert!(EngineConfig::new()
            .with_auto_checkpoint(true)
            .with_checkpoint_dir("cp")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_from_file_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("engine.json");
        std::fs::write(&path, r#"{"maxIterations": 3}"#).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap().max_iterations, Some(3));
    }

    #[test]
    fn test_from_file_missing() {
        let err = EngineConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, GraphError::InvalidConfig(_)));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_yaml() {
        let config =
            EngineConfig::from_yaml_str("maxIterations: 12\nautoCheckpoint: false\n").unwrap();
        assert_eq!(config.max_iterations, Some(12));
    }
}
