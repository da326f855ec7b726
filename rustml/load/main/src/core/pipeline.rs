//! The ordered load pipeline.

use crate::api::error::{LoadError, LoadResult};
use crate::api::traits::Sanitize;
use crate::api::types::{LoadConfig, LoadReport, ModelReference, QuantizationSpec, WeightMapping};
use crate::core::acquire::resolve;
use crate::core::apply::apply;
use crate::core::cancel::CancellationToken;
use crate::core::eval::{eval_all, Value};
use crate::core::materialize::materialize;
use crate::core::quantize::quantize_model;
use rustml_hub::{HubApi, ProgressCallback, SnapshotSource};
use rustml_nn::ModuleGraph;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

fn phase<T>(name: &str, f: impl FnOnce() -> LoadResult<T>) -> LoadResult<T> {
    let start = Instant::now();
    let result = f();
    match &result {
        Ok(_) => log::info!("{} done in {:.1}ms", name, start.elapsed().as_secs_f64() * 1000.0),
        Err(LoadError::Cancelled) => log::info!("{} cancelled", name),
        Err(e) => log::debug!("{} failed: {}", name, e),
    }
    result
}

/// Runs acquire, materialize, sanitize, quantize, apply and evaluate, in
/// that order, on the calling thread.
///
/// The module graph is only mutated by the quantize and apply phases, and
/// only after everything before them has succeeded.
pub struct ModelLoader {
    config: LoadConfig,
    cancel: CancellationToken,
    progress: Arc<ProgressCallback<'static>>,
}

impl ModelLoader {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            progress: Arc::new(|_: u64, _: u64| {}),
        }
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Receive cumulative `(transferred, total)` byte counts during acquisition.
    pub fn with_progress(mut self, progress: Arc<ProgressCallback<'static>>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A hub client configured from `cache_dir` and `token`.
    pub fn hub(&self) -> HubApi {
        let api = match &self.config.cache_dir {
            Some(dir) => HubApi::with_cache_dir(dir),
            None => HubApi::new(),
        };
        match &self.config.token {
            Some(token) => api.with_token(token.clone()),
            None => api,
        }
    }

    /// Acquire, materialize and sanitize. Nothing outside the returned
    /// mapping is touched.
    pub fn load_weights(
        &self,
        reference: &ModelReference,
        source: &dyn SnapshotSource,
        sanitizer: &dyn Sanitize,
    ) -> LoadResult<(PathBuf, WeightMapping)> {
        log::info!("Loading {}", reference);
        let dir = phase("acquire", || {
            resolve(reference, source, &self.config.patterns, self.progress.as_ref())
        })?;
        let weights = phase("materialize", || materialize(&dir, &self.cancel))?;
        let weights = phase("sanitize", || sanitizer.sanitize(weights))?;
        Ok((dir, weights))
    }

    /// Quantize (when `quantization` is given), apply and evaluate.
    ///
    /// Evaluation forces the graph's parameters and every entry of
    /// `weights`, so nothing loaded stays lazy.
    pub fn finish(
        &self,
        dir: &Path,
        weights: WeightMapping,
        graph: &mut ModuleGraph,
        quantization: Option<&QuantizationSpec>,
    ) -> LoadResult<LoadReport> {
        let quantized = match quantization {
            Some(spec) => phase("quantize", || quantize_model(graph, spec, &weights, &self.cancel))?,
            None => Vec::new(),
        };
        phase("apply", || apply(graph, &weights, &self.cancel))?;

        let roots = [Value::Evaluatable(&*graph), Value::TensorMap(&weights)];
        let eval = phase("evaluate", || eval_all(&roots, self.config.batch_size, &self.cancel))?;

        Ok(LoadReport {
            directory: dir.to_path_buf(),
            tensors: weights.len(),
            quantized,
            eval,
        })
    }

    /// The whole pipeline.
    pub fn load(
        &self,
        reference: &ModelReference,
        source: &dyn SnapshotSource,
        sanitizer: &dyn Sanitize,
        graph: &mut ModuleGraph,
        quantization: Option<&QuantizationSpec>,
    ) -> LoadResult<LoadReport> {
        let (dir, weights) = self.load_weights(reference, source, sanitizer)?;
        self.finish(&dir, weights, graph, quantization)
    }
}
