//! HuggingFace Hub API client over the hf-hub sync API.
//!
//! Snapshots land in the hf-hub cache layout:
//! `<cache>/models--org--name/snapshots/<commit>/<file>`, with the commit of
//! the last fetch recorded in `<cache>/models--org--name/refs/main`.

use crate::api::error::{HubError, HubResult};
use crate::api::traits::{ProgressCallback, SnapshotSource};
use crate::api::types::ModelBundle;
use hf_hub::api::sync::{Api, ApiBuilder, ApiError};
use hf_hub::api::Progress;
use hf_hub::{Cache, Repo};
use std::path::{Path, PathBuf};
use std::time::Instant;

const REPO_PREFIX: &str = "models--";
const REPO_SEPARATOR: &str = "--";

/// HuggingFace Hub API client
#[derive(Debug, Clone)]
pub struct HubApi {
    /// Cache directory for downloaded models
    cache_dir: PathBuf,
    /// API token (optional, for private models)
    token: Option<String>,
}

impl Default for HubApi {
    fn default() -> Self {
        Self::new()
    }
}

impl HubApi {
    /// Create a new Hub API client
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rustml")
            .join("hub");

        // Auto-detect HF_TOKEN from environment
        let token = std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty());

        Self { cache_dir, token }
    }

    /// Create with custom cache directory
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::new()
        }
    }

    /// Set API token for private models
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the cache directory
    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Build the hf-hub sync API, passing through any token from self.token.
    /// The hf-hub crate (0.4.x) does NOT read HF_TOKEN from the environment;
    /// it only reads a token file in the cache dir.  We bridge that gap here.
    fn hf_sync_api(&self) -> HubResult<Api> {
        let mut builder = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .with_progress(false);
        if let Some(ref t) = self.token {
            builder = builder.with_token(Some(t.clone()));
        }
        builder
            .build()
            .map_err(|e| HubError::NetworkError(format!("Failed to create hf-hub API: {}", e)))
    }

    fn repo_root(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(Repo::model(model_id.to_string()).folder_name())
    }

    /// Files in `model_id` whose names match any of `patterns`.
    pub fn list_files(&self, model_id: &str, patterns: &[String]) -> HubResult<Vec<String>> {
        let compiled = compile_patterns(patterns)?;
        let info = self
            .hf_sync_api()?
            .model(model_id.to_string())
            .info()
            .map_err(|e| classify(model_id, e))?;
        Ok(info
            .siblings
            .into_iter()
            .map(|s| s.rfilename)
            .filter(|name| compiled.iter().any(|p| p.matches(name)))
            .collect())
    }

    /// Check if a model has a usable snapshot in the cache
    pub fn is_cached(&self, model_id: &str) -> bool {
        self.local_repo_dir(model_id).is_dir()
    }

    /// Get a cached model bundle without downloading
    pub fn get_cached(&self, model_id: &str) -> Option<ModelBundle> {
        self.is_cached(model_id).then(|| ModelBundle {
            model_id: model_id.to_string(),
            model_dir: self.local_repo_dir(model_id),
        })
    }

    /// Repository ids with an entry in the cache, sorted.
    pub fn cached_models(&self) -> HubResult<Vec<String>> {
        if !self.cache_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut models = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_prefix(REPO_PREFIX) {
                models.push(id.replacen(REPO_SEPARATOR, "/", 1));
            }
        }
        models.sort();
        Ok(models)
    }
}

impl SnapshotSource for HubApi {
    fn snapshot(&self, repo_id: &str, patterns: &[String], progress: &ProgressCallback<'_>) -> HubResult<PathBuf> {
        let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

        let files = self.list_files(repo_id, patterns)?;
        if files.is_empty() {
            log::warn!("No files in {} match {:?}", repo_id, patterns);
        }

        let api = self.hf_sync_api()?;
        let repo = api.model(repo_id.to_string());
        let cache = Cache::new(self.cache_dir.clone()).repo(Repo::model(repo_id.to_string()));

        let mut totals = Totals::default();
        for file in &files {
            if cache.get(file).is_some() {
                log::debug!("{}: {} already cached", repo_id, file);
                continue;
            }
            log::debug!("{}: downloading {}", repo_id, file);
            repo.download_with_progress(file, Forward { totals: &mut totals, callback: progress })
                .map_err(|e| classify(repo_id, e))?;
        }

        let dir = self.local_repo_dir(repo_id);
        log::info!("Snapshot of {} ({} file(s)) at {}", repo_id, files.len(), dir.display());
        if let Some(t) = _t {
            log::trace!("[perf] hub::snapshot {} bytes={} {:.3}ms",
                repo_id, totals.transferred, t.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(dir)
    }

    fn local_repo_dir(&self, repo_id: &str) -> PathBuf {
        let root = self.repo_root(repo_id);
        match read_ref(&root) {
            Some(commit) => root.join("snapshots").join(commit),
            None => root,
        }
    }
}

fn read_ref(repo_root: &Path) -> Option<String> {
    let commit = std::fs::read_to_string(repo_root.join("refs").join("main")).ok()?;
    let commit = commit.trim();
    (!commit.is_empty()).then(|| commit.to_string())
}

fn compile_patterns(patterns: &[String]) -> HubResult<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| HubError::ParseError(format!("pattern '{}': {}", p, e)))
        })
        .collect()
}

/// Sort a transfer failure into the recoverable cases by its structure. The
/// rendered message carries the repo id and URL, so it is never inspected.
pub(crate) fn classify(repo_id: &str, err: ApiError) -> HubError {
    let context = format!("{}: {}", repo_id, err);
    match err {
        ApiError::RequestError(inner) => match *inner {
            ureq::Error::Status(code, _) => by_status(code, context),
            ureq::Error::Transport(transport) => by_transport(transport.kind(), context),
        },
        ApiError::TooManyRetries(last) => classify(repo_id, *last),
        ApiError::IoError(e) => HubError::IoError(e),
        _ => HubError::NetworkError(context),
    }
}

fn by_status(code: u16, context: String) -> HubError {
    match code {
        401 | 403 => HubError::Unauthorized(context),
        404 => HubError::ModelNotFound(context),
        _ => HubError::NetworkError(context),
    }
}

fn by_transport(kind: ureq::ErrorKind, context: String) -> HubError {
    match kind {
        ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Io => {
            HubError::Offline(context)
        }
        _ => HubError::NetworkError(context),
    }
}

#[derive(Debug, Default)]
struct Totals {
    transferred: u64,
    total: u64,
}

/// Turns per-file hf-hub progress into cumulative counts across the snapshot.
struct Forward<'a> {
    totals: &'a mut Totals,
    callback: &'a ProgressCallback<'a>,
}

impl Progress for Forward<'_> {
    fn init(&mut self, size: usize, _filename: &str) {
        self.totals.total += size as u64;
        (self.callback)(self.totals.transferred, self.totals.total);
    }

    fn update(&mut self, size: usize) {
        self.totals.transferred += size as u64;
        (self.callback)(self.totals.transferred, self.totals.total);
    }

    fn finish(&mut self) {}
}
