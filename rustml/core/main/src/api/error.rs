//! Error types for tensor operations

use crate::api::types::DType;
use thiserror::Error;

/// Result type for tensor operations
pub type TensorResult<T> = Result<T, TensorError>;

/// Errors that can occur in tensor operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error("DType mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    #[error("Conversion error: {0}")]
    ConversionError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Parameter tree conflict at '{0}'")]
    TreeConflict(String),
}
