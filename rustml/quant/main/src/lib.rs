//! # RustML Quant
//!
//! Group-wise affine quantization of weight matrices.
//!
//! Each row is split into groups of `group_size` values. A group stores one
//! f32 scale and one f32 bias (the group minimum); each value becomes an
//! unsigned `bits`-wide code packed into u32 words, lowest bits first:
//!
//! ```text
//! w ~= scale * code + bias
//! ```

pub mod api;
mod core;
mod saf;

pub use saf::*;
