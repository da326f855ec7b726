use thiserror::Error;

pub type QuantResult<T> = Result<T, QuantError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuantError {
    #[error("Unsupported bit width {0} (supported: 2, 4, 8)")]
    UnsupportedBits(u32),

    #[error("Group size must be positive")]
    ZeroGroupSize,

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    #[error("Group alignment error: {0}")]
    GroupAlignment(String),
}
