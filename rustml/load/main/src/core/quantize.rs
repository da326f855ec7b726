//! The quantization phase.

use crate::api::error::{LoadError, LoadResult};
use crate::api::types::{QuantizationSpec, WeightMapping};
use crate::core::cancel::CancellationToken;
use rustml_nn::ModuleGraph;

/// Suffix of the side tensor that marks a module as quantized in a checkpoint.
pub const SCALES_SUFFIX: &str = "scales";

/// Quantize every module whose `<path>.scales` is present in `weights`.
///
/// Modules without one are left alone. Returns the quantized paths.
pub fn quantize_model(
    graph: &mut ModuleGraph,
    spec: &QuantizationSpec,
    weights: &WeightMapping,
    cancel: &CancellationToken,
) -> LoadResult<Vec<String>> {
    cancel.checkpoint()?;
    let quantized = graph
        .quantize(spec.group_size(), spec.bits(), |path, _| {
            weights.contains_key(&format!("{}{}{}", path, rustml_core::SEPARATOR, SCALES_SUFFIX))
        })
        .map_err(LoadError::Quantize)?;
    log::info!(
        "Quantized {} module(s) (group size {}, {} bits)",
        quantized.len(),
        spec.group_size(),
        spec.bits()
    );
    Ok(quantized)
}
