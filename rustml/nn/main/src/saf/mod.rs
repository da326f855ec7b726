//! Facade re-exports for rustml-nn

pub use crate::api::error::*;
pub use crate::api::traits::*;
pub use crate::api::types::*;
pub use crate::core::linear::Linear;
pub use crate::core::embedding::Embedding;
pub use crate::core::rms_norm::RmsNorm;
pub use crate::core::block::ParameterBlock;
pub use crate::core::quantized::{QuantizedEmbedding, QuantizedLinear, QuantizedWeight};
pub use crate::core::module::{ModuleGraph, ModuleNode};
