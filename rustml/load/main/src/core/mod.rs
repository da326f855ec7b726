pub(crate) mod acquire;
pub(crate) mod apply;
pub(crate) mod cancel;
pub(crate) mod chunk;
pub(crate) mod eval;
pub(crate) mod materialize;
pub(crate) mod pipeline;
pub(crate) mod quantize;
pub(crate) mod sanitize;
