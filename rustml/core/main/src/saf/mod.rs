//! Facade re-exports for rustml-core

pub use crate::api::types::*;
pub use crate::api::error::*;
pub use crate::api::traits::*;
pub use crate::core::tensor::{Tensor, Storage, TensorShape, f32_vec_to_bytes};
pub use crate::core::lazy::{LazyTensor, eval_many};
pub use crate::core::tree::{ParamTree, SEPARATOR};
