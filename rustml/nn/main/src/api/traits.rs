//! Neural network traits

use crate::api::error::{NnError, NnResult};
use rustml_core::LazyTensor;
use std::fmt;

/// A leaf of the module graph: owns named parameter slots.
pub trait Layer: fmt::Debug + Send + Sync {
    /// Short type name used in logs and errors.
    fn kind(&self) -> &'static str;

    /// Parameter slots in declaration order.
    fn parameters(&self) -> Vec<(String, LazyTensor)>;

    /// Replace the value of an existing slot.
    fn set_parameter(&mut self, name: &str, value: LazyTensor) -> NnResult<()>;

    fn is_quantizable(&self) -> bool {
        false
    }

    fn is_quantized(&self) -> bool {
        false
    }

    /// Build the quantized replacement for this layer.
    fn to_quantized(&self, _group_size: usize, _bits: u32) -> NnResult<Box<dyn Layer>> {
        Err(NnError::NotQuantizable(self.kind()))
    }
}
