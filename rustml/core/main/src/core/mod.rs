pub(crate) mod lazy;
pub(crate) mod tensor;
pub(crate) mod tree;
