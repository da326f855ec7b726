//! # RustML Hub
//!
//! HuggingFace Hub integration for loading pre-trained models.
//!
//! This crate provides functionality to:
//! - Snapshot a model repository, restricted to file patterns, into the
//!   shared hub cache
//! - Locate a repository's canonical cache directory without the network
//! - Read SafeTensors shards as lazy, mmap-backed tensors
//!
//! ## Example
//!
//! ```rust,ignore
//! use rustml_hub::{HubApi, SnapshotSource};
//!
//! let api = HubApi::new();
//! let patterns = vec!["*.safetensors".to_string(), "*.json".to_string()];
//! let dir = api.snapshot("org/model", &patterns, &|done, total| {
//!     println!("{}/{}", done, total);
//! })?;
//! ```

pub mod api;
pub(crate) mod core;
mod saf;

pub use saf::*;
