//! Types for model loading

use crate::api::error::{LoadError, LoadResult};
use rustml_core::LazyTensor;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Flat dotted key to lazy tensor. Keys are unique; a later shard overwrites
/// an earlier one.
pub type WeightMapping = BTreeMap<String, LazyTensor>;

/// Default number of tensors forced per evaluation batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Where a model's files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReference {
    /// Hub repository id, e.g. `org/model`
    RemoteId(String),
    /// A directory that already holds the files
    LocalDirectory(PathBuf),
}

impl ModelReference {
    /// An existing directory is local; anything else is a repository id.
    pub fn parse(input: &str) -> Self {
        let path = Path::new(input);
        if path.is_dir() {
            ModelReference::LocalDirectory(path.to_path_buf())
        } else {
            ModelReference::RemoteId(input.to_string())
        }
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelReference::RemoteId(id) => write!(f, "{}", id),
            ModelReference::LocalDirectory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

/// Group size and bit width for the quantization phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizationSpec {
    group_size: usize,
    bits: u32,
}

impl QuantizationSpec {
    pub fn new(group_size: usize, bits: u32) -> LoadResult<Self> {
        if group_size == 0 || bits == 0 {
            return Err(LoadError::InvalidConfig(format!(
                "group size and bits must be positive, got {} and {}",
                group_size, bits
            )));
        }
        Ok(Self { group_size, bits })
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }
}

/// Loader settings. Every field has a default, so a partial JSON file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Tensors forced per evaluation batch
    pub batch_size: usize,
    /// Snapshot file patterns
    pub patterns: Vec<String>,
    /// Hub cache directory; the hub client's default when unset
    pub cache_dir: Option<PathBuf>,
    /// Hub token; `HF_TOKEN` when unset
    pub token: Option<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            patterns: rustml_hub::DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            cache_dir: None,
            token: None,
        }
    }
}

impl LoadConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> LoadResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| LoadError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }
}

/// What the evaluation phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalReport {
    /// Handles collected, duplicates included
    pub tensors: usize,
    /// Size of each forced batch, in forcing order
    pub batch_sizes: Vec<usize>,
}

/// Summary of a completed load.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub directory: PathBuf,
    /// Entries in the sanitized mapping
    pub tensors: usize,
    /// Module paths rewritten by the quantization phase
    pub quantized: Vec<String>,
    pub eval: EvalReport,
}
