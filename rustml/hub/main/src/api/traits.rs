//! Hub traits

use crate::api::error::HubResult;
use std::path::PathBuf;

/// Cumulative `(transferred, total)` byte counts. May be called from any thread.
pub type ProgressCallback<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Something that can materialize a repository snapshot on disk.
pub trait SnapshotSource {
    /// Fetch the files of `repo_id` matching any of `patterns` and return the
    /// directory holding them. Blocks until the snapshot is complete.
    fn snapshot(&self, repo_id: &str, patterns: &[String], progress: &ProgressCallback<'_>) -> HubResult<PathBuf>;

    /// Where a previous snapshot of `repo_id` lives, computed without any
    /// network access. The directory need not exist.
    fn local_repo_dir(&self, repo_id: &str) -> PathBuf;
}
