//! Merging shard files into one weight mapping.

use crate::api::error::{LoadError, LoadResult};
use crate::api::types::WeightMapping;
use crate::core::cancel::CancellationToken;
use rustml_hub::{load_safetensors_lazy, SHARD_EXTENSION};
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// Read every `*.safetensors` file under `dir`, recursively, in file-name
/// order, into one mapping. A key seen again in a later shard replaces the
/// earlier value. Tensor bytes are not read here. Symlinks are followed, as
/// hub snapshots link each file into the shared blob store.
///
/// Cancellation is checked after each shard; a cancelled materialization
/// returns `LoadError::Cancelled` and its partial mapping is dropped.
pub fn materialize(dir: &Path, cancel: &CancellationToken) -> LoadResult<WeightMapping> {
    let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

    let mut weights = WeightMapping::new();
    let mut shards = 0usize;
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || !path.extension().is_some_and(|e| e == SHARD_EXTENSION) {
            continue;
        }

        let tensors = load_safetensors_lazy(path).map_err(|source| LoadError::ShardParse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Merged {} tensor(s) from {}", tensors.len(), path.display());
        for (name, tensor) in tensors {
            if weights.insert(name.clone(), tensor).is_some() {
                log::debug!("{} overridden by {}", name, path.display());
            }
        }
        shards += 1;
        cancel.checkpoint()?;
    }

    log::info!("Materialized {} tensor(s) from {} shard(s) in {}", weights.len(), shards, dir.display());
    if let Some(t) = _t {
        log::trace!("[perf] load::materialize n={} {:.3}ms", weights.len(), t.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(weights)
}
