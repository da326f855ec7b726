//! Facade re-exports for rustml-hub

pub use crate::api::types::*;
pub use crate::api::error::*;
pub use crate::api::traits::*;
pub use crate::core::hub_api::HubApi;
pub use crate::core::safetensors::{SafeTensorsError, load_safetensors_lazy};
