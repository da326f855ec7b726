pub(crate) mod hub_api;
pub(crate) mod safetensors;
