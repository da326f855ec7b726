//! # RustML Load
//!
//! Model weight acquisition and materialization.
//!
//! A load runs strictly ordered phases on one task:
//!
//! 1. **acquire**: resolve a `ModelReference` to a directory, snapshotting
//!    remote repositories and falling back to the local cache when the hub
//!    rejects credentials or cannot be reached
//! 2. **materialize**: merge every `*.safetensors` shard under the directory
//!    into one flat `WeightMapping` of lazy tensors
//! 3. **sanitize**: model-specific key and shape rewriting
//! 4. **quantize** (optional): rewrite modules that ship `<path>.scales`
//! 5. **apply**: bind the mapping onto the module graph with symmetric
//!    structural verification
//! 6. **evaluate**: force every lazy tensor in fixed-size batches
//!
//! A `CancellationToken` is polled between shards, around binding, and
//! before every evaluation batch.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rustml_load::{LoadConfig, LoadResult, ModelLoader, ModelReference, NoSanitize, QuantizationSpec};
//! use rustml_nn::{Linear, ModuleGraph, ModuleNode};
//!
//! fn main() -> LoadResult<()> {
//!     let mut graph = ModuleGraph::new(ModuleNode::dict([(
//!         "lm_head",
//!         ModuleNode::leaf(Linear::new(768, 50257, false)),
//!     )]));
//!     let loader = ModelLoader::new(LoadConfig::default());
//!     let hub = loader.hub();
//!     let spec = QuantizationSpec::new(64, 4)?;
//!     let report = loader.load(&ModelReference::parse("org/model"), &hub, &NoSanitize, &mut graph, Some(&spec))?;
//!     println!("{} tensor(s) from {}", report.tensors, report.directory.display());
//!     Ok(())
//! }
//! ```

pub mod api;
mod core;
mod saf;

pub use saf::*;
