//! Resolving a model reference to a local directory.

use crate::api::error::{LoadError, LoadResult};
use crate::api::types::ModelReference;
use rustml_hub::{ProgressCallback, SnapshotSource};
use std::path::PathBuf;
use std::time::Instant;

/// Directory holding the files of `reference`.
///
/// A local directory is returned as-is without touching `source`. A remote
/// id is snapshotted with `patterns`; if the hub rejects the credentials or
/// cannot be reached, the canonical cache directory is used instead and the
/// failure is only logged. Any other transfer failure is returned.
pub fn resolve(
    reference: &ModelReference,
    source: &dyn SnapshotSource,
    patterns: &[String],
    progress: &ProgressCallback<'_>,
) -> LoadResult<PathBuf> {
    let repo_id = match reference {
        ModelReference::LocalDirectory(dir) => return Ok(dir.clone()),
        ModelReference::RemoteId(id) => id,
    };
    let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

    let dir = match source.snapshot(repo_id, patterns, progress) {
        Ok(dir) => dir,
        Err(e) if e.is_recoverable() => {
            let fallback = source.local_repo_dir(repo_id);
            log::warn!("{}; using cached copy at {}", e, fallback.display());
            fallback
        }
        Err(e) => return Err(LoadError::Transfer(e)),
    };

    if let Some(t) = _t {
        log::trace!("[perf] load::resolve {} {:.3}ms", repo_id, t.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(dir)
}
