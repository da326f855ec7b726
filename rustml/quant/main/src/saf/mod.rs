//! Facade re-exports for rustml-quant

pub use crate::api::types::*;
pub use crate::api::error::*;
pub use crate::core::quantize::{
    QuantizedGroups, dequantize_affine, packed_row_len, quantize_affine, validate_params,
};
