//! Load traits

use crate::api::error::LoadResult;
use crate::api::types::WeightMapping;

/// Model-specific rewriting of loaded keys and shapes.
///
/// Called exactly once per load, after materialization and before
/// quantization. The output is trusted as-is.
pub trait Sanitize {
    fn sanitize(&self, weights: WeightMapping) -> LoadResult<WeightMapping>;
}

impl<F> Sanitize for F
where
    F: Fn(WeightMapping) -> LoadResult<WeightMapping>,
{
    fn sanitize(&self, weights: WeightMapping) -> LoadResult<WeightMapping> {
        self(weights)
    }
}
