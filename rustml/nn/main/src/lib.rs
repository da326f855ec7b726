//! # RustML Neural Network
//!
//! Module graphs for RustML: layers that own lazily-computed parameters,
//! arranged in a tree of dicts and lists that mirrors checkpoint key paths.
//!
//! This crate provides:
//! - Layers: `Linear`, `Embedding`, `RmsNorm`, `ParameterBlock`
//! - Quantized layers: `QuantizedLinear`, `QuantizedEmbedding`
//! - `ModuleGraph`: symmetric, verified parameter binding (`update`) and
//!   in-place selective quantization (`quantize`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use rustml_nn::{Linear, ModuleGraph, ModuleNode, Verify};
//!
//! let mut graph = ModuleGraph::new(ModuleNode::dict([
//!     ("proj", ModuleNode::leaf(Linear::new(64, 64, true))),
//! ]));
//! graph.update(&tree, Verify::All)?;
//! ```

pub mod api;
mod core;
mod saf;

pub use saf::*;
