//! Error types for neural network operations

use crate::api::types::MismatchReport;
use rustml_core::TensorError;
use rustml_quant::QuantError;
use thiserror::Error;

/// Result type for neural network operations
pub type NnResult<T> = Result<T, NnError>;

/// Errors that can occur in neural network operations
#[derive(Error, Debug)]
pub enum NnError {
    #[error("Tensor error: {0}")]
    TensorError(#[from] TensorError),

    #[error("Quantization error: {0}")]
    QuantError(#[from] QuantError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Structural mismatch: {0}")]
    StructuralMismatch(MismatchReport),

    #[error("{layer} has no parameter '{name}'")]
    UnknownParameter { layer: &'static str, name: String },

    #[error("No module at path '{0}'")]
    UnknownModule(String),

    #[error("{0} cannot be quantized")]
    NotQuantizable(&'static str),
}
