//! Data types for hub API operations

use crate::api::error::{HubError, HubResult};
use std::path::PathBuf;

/// Default patterns for a weights snapshot.
pub const DEFAULT_PATTERNS: [&str; 2] = ["*.safetensors", "*.json"];

/// Extension of weight shard files.
pub const SHARD_EXTENSION: &str = "safetensors";

/// A downloaded model directory
#[derive(Debug, Clone)]
pub struct ModelBundle {
    /// Model identifier
    pub model_id: String,
    /// Path to the model directory
    pub model_dir: PathBuf,
}

impl ModelBundle {
    /// Get path to config.json
    pub fn config_path(&self) -> PathBuf {
        self.model_dir.join("config.json")
    }

    /// Load model configuration synchronously
    pub fn load_config_sync(&self) -> HubResult<serde_json::Value> {
        let content = std::fs::read_to_string(self.config_path())?;
        serde_json::from_str(&content).map_err(|e| HubError::ParseError(e.to_string()))
    }
}
