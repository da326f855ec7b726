//! Core traits

use crate::core::lazy::LazyTensor;

/// A value that owns lazy tensors and can expose them for forcing.
///
/// Implementors return every tensor that must be materialized for the value
/// to be fully computed, in a stable order.
pub trait Evaluatable {
    fn inner_state(&self) -> Vec<LazyTensor>;
}
