//! A leaf holding arbitrary named tensors (position tables, gates, buffers).

use crate::api::error::{NnError, NnResult};
use crate::api::traits::Layer;
use rustml_core::LazyTensor;

#[derive(Debug, Clone, Default)]
pub struct ParameterBlock {
    params: Vec<(String, LazyTensor)>,
}

impl ParameterBlock {
    pub fn new<I, K>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, LazyTensor)>,
        K: Into<String>,
    {
        Self {
            params: params.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&LazyTensor> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

impl Layer for ParameterBlock {
    fn kind(&self) -> &'static str {
        "ParameterBlock"
    }

    fn parameters(&self) -> Vec<(String, LazyTensor)> {
        self.params.clone()
    }

    fn set_parameter(&mut self, name: &str, value: LazyTensor) -> NnResult<()> {
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => {
                *slot = value;
                Ok(())
            }
            None => Err(NnError::UnknownParameter { layer: self.kind(), name: name.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_slots_are_fixed() {
        let mut block = ParameterBlock::new([("pos", LazyTensor::zeros(vec![4])), ("gate", LazyTensor::zeros(vec![1]))]);
        let names: Vec<String> = block.parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["pos", "gate"]);

        let v = LazyTensor::zeros(vec![4]);
        block.set_parameter("pos", v.clone()).unwrap();
        assert!(block.get("pos").unwrap().same_node(&v));
        assert!(block.set_parameter("other", v).is_err());
    }
}
