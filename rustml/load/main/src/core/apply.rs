//! Binding a weight mapping onto a module graph.

use crate::api::error::{LoadError, LoadResult};
use crate::api::types::WeightMapping;
use crate::core::cancel::CancellationToken;
use rustml_core::{ParamTree, TensorError};
use rustml_nn::{ModuleGraph, NnError, Verify};
use std::time::Instant;

/// Unflatten `weights` and bind it with full two-way verification.
///
/// A slot without a value or a value without a slot fails the load with
/// `LoadError::StructuralMismatch`; in that case no slot is bound.
pub fn apply(graph: &mut ModuleGraph, weights: &WeightMapping, cancel: &CancellationToken) -> LoadResult<()> {
    cancel.checkpoint()?;
    let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

    let tree = ParamTree::unflatten(weights.iter().map(|(k, v)| (k.as_str(), v.clone()))).map_err(|e| match e {
        TensorError::TreeConflict(key) => LoadError::KeyConflict(key),
        other => LoadError::Evaluation(other),
    })?;
    graph.update(&tree, Verify::All).map_err(|e| match e {
        NnError::StructuralMismatch(report) => LoadError::StructuralMismatch(report),
        other => LoadError::Module(other),
    })?;

    log::info!("Applied {} parameter(s)", weights.len());
    if let Some(t) = _t {
        log::trace!("[perf] load::apply n={} {:.3}ms", weights.len(), t.elapsed().as_secs_f64() * 1000.0);
    }
    cancel.checkpoint()
}
