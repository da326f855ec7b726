//! Facade re-exports for rustml-load

pub use crate::api::error::*;
pub use crate::api::traits::*;
pub use crate::api::types::*;
pub use crate::core::acquire::resolve;
pub use crate::core::apply::apply;
pub use crate::core::cancel::CancellationToken;
pub use crate::core::chunk::batches;
pub use crate::core::eval::{collect, eval_all, IntoValue, Value};
pub use crate::core::materialize::materialize;
pub use crate::core::pipeline::ModelLoader;
pub use crate::core::quantize::quantize_model;
pub use crate::core::sanitize::{KeyRemap, NoSanitize};
