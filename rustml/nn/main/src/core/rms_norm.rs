//! RMSNorm: x * weight / rms(x). Used by Llama-family models.
//! Unlike LayerNorm, does not subtract mean and has no bias parameter.

use crate::api::error::{NnError, NnResult};
use crate::api::traits::Layer;
use rustml_core::{LazyTensor, Tensor};

/// RMSNorm layer
#[derive(Debug, Clone)]
pub struct RmsNorm {
    pub weight: LazyTensor,
    pub eps: f32,
}

impl RmsNorm {
    /// Create a new RMSNorm with weights initialized to 1.
    pub fn new(dim: usize, eps: f32) -> Self {
        let weight = LazyTensor::from_fn(vec![dim], rustml_core::DType::F32, move || {
            Tensor::from_vec(vec![1.0; dim], vec![dim])
        });
        Self { weight, eps }
    }

    /// Create from a pre-loaded weight tensor.
    pub fn from_weight(weight: LazyTensor, eps: f32) -> Self {
        Self { weight, eps }
    }

    pub fn forward(&self, x: &Tensor) -> NnResult<Tensor> {
        let w = self.weight.eval()?.to_f32_vec()?;
        let dim = w.len();
        if x.shape().last().copied() != Some(dim) {
            return Err(NnError::ShapeMismatch(format!(
                "Expected input [..., {}], got {:?}",
                dim,
                x.shape()
            )));
        }
        let xs = x.to_f32_vec()?;
        let mut out = Vec::with_capacity(xs.len());
        for row in xs.chunks_exact(dim.max(1)) {
            let mean_sq = row.iter().map(|v| v * v).sum::<f32>() / dim as f32;
            let inv = 1.0 / (mean_sq + self.eps).sqrt();
            out.extend(row.iter().zip(&w).map(|(v, g)| v * inv * g));
        }
        Ok(Tensor::from_vec(out, x.shape().to_vec())?)
    }
}

impl Layer for RmsNorm {
    fn kind(&self) -> &'static str {
        "RmsNorm"
    }

    fn parameters(&self) -> Vec<(String, LazyTensor)> {
        vec![("weight".to_string(), self.weight.clone())]
    }

    fn set_parameter(&mut self, name: &str, value: LazyTensor) -> NnResult<()> {
        if name != "weight" {
            return Err(NnError::UnknownParameter { layer: self.kind(), name: name.to_string() });
        }
        self.weight = value;
        Ok(())
    }
}
