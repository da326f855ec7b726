pub(crate) mod block;
pub(crate) mod embedding;
pub(crate) mod linear;
pub(crate) mod module;
pub(crate) mod quantized;
pub(crate) mod rms_norm;
pub(crate) mod scaffold;
