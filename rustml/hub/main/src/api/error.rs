//! Error types for hub operations

use thiserror::Error;

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;

/// Errors that can occur in hub operations
#[derive(Error, Debug)]
pub enum HubError {
    /// The hub refused the credentials (HTTP 401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The hub could not be reached at all.
    #[error("Hub unreachable: {0}")]
    Offline(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("SafeTensors error: {0}")]
    SafeTensorsError(#[from] crate::core::safetensors::SafeTensorsError),

    #[error("Tensor error: {0}")]
    TensorError(#[from] rustml_core::TensorError),
}

impl HubError {
    /// True for failures after which a cached copy may still be used.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HubError::Unauthorized(_) | HubError::Offline(_))
    }
}
