//! Error types for model loading

use rustml_core::TensorError;
use rustml_hub::HubError;
use rustml_nn::{MismatchReport, NnError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for load operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that end a load.
///
/// Credential and connectivity failures during acquisition never appear
/// here; they are recovered by falling back to the local cache.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Transfer failed: {0}")]
    Transfer(#[source] HubError),

    #[error("Failed to read shard {}: {source}", path.display())]
    ShardParse {
        path: PathBuf,
        #[source]
        source: HubError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parameters do not match the module graph: {0}")]
    StructuralMismatch(MismatchReport),

    #[error("Conflicting parameter keys: {0}")]
    KeyConflict(String),

    #[error("Quantization failed: {0}")]
    Quantize(#[source] NnError),

    #[error("Module graph error: {0}")]
    Module(#[source] NnError),

    #[error("Sanitize failed: {0}")]
    Sanitize(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] TensorError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Load cancelled")]
    Cancelled,
}

impl LoadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}
