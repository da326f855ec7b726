//! Stock sanitizers.

use crate::api::error::{LoadError, LoadResult};
use crate::api::traits::Sanitize;
use crate::api::types::WeightMapping;
use std::collections::HashMap;

/// Leaves the mapping as loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSanitize;

impl Sanitize for NoSanitize {
    fn sanitize(&self, weights: WeightMapping) -> LoadResult<WeightMapping> {
        Ok(weights)
    }
}

/// Renames keys from checkpoint conventions to module-graph paths.
///
/// Per key, the first rule that applies wins: dropped prefixes, then exact
/// renames, then the longest matching prefix rewrite. Keys no rule touches
/// pass through unchanged. Two keys landing on the same target is an error.
#[derive(Debug, Clone, Default)]
pub struct KeyRemap {
    exact: HashMap<String, String>,
    prefixes: Vec<(String, String)>,
    dropped: Vec<String>,
}

impl KeyRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.exact.insert(from.into(), to.into());
        self
    }

    /// Replace a leading `from` with `to`; an empty `to` strips it.
    pub fn prefix(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.prefixes.push((from.into(), to.into()));
        self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Discard keys starting with `prefix`.
    pub fn drop_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dropped.push(prefix.into());
        self
    }

    fn map_key(&self, key: String) -> Option<String> {
        if self.dropped.iter().any(|p| key.starts_with(p.as_str())) {
            return None;
        }
        if let Some(to) = self.exact.get(&key) {
            return Some(to.clone());
        }
        for (from, to) in &self.prefixes {
            if let Some(rest) = key.strip_prefix(from.as_str()) {
                return Some(format!("{}{}", to, rest));
            }
        }
        Some(key)
    }
}

impl Sanitize for KeyRemap {
    fn sanitize(&self, weights: WeightMapping) -> LoadResult<WeightMapping> {
        let before = weights.len();
        let mut out = WeightMapping::new();
        for (key, tensor) in weights {
            let Some(target) = self.map_key(key.clone()) else {
                continue;
            };
            if out.contains_key(&target) {
                return Err(LoadError::Sanitize(format!(
                    "'{}' maps onto '{}', which is already taken",
                    key, target
                )));
            }
            out.insert(target, tensor);
        }
        log::debug!("KeyRemap kept {} of {} key(s)", out.len(), before);
        Ok(out)
    }
}
