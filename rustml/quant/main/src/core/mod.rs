pub(crate) mod quantize;
