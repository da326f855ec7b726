//! Embedding layer implementation

use crate::api::error::{NnError, NnResult};
use crate::api::traits::Layer;
use crate::core::quantized::{QuantizedEmbedding, QuantizedWeight};
use rustml_core::{DType, LazyTensor, Tensor};

/// Embedding layer that maps token indices to dense vectors
#[derive(Debug, Clone)]
pub struct Embedding {
    /// Embedding weight matrix [num_embeddings, embedding_dim]
    pub weight: LazyTensor,
}

impl Embedding {
    pub fn new(num_embeddings: usize, embedding_dim: usize) -> Self {
        Self {
            weight: LazyTensor::zeros(vec![num_embeddings, embedding_dim]),
        }
    }

    /// Create an embedding layer from existing weights
    pub fn from_weights(weight: LazyTensor) -> NnResult<Self> {
        if weight.shape().len() != 2 {
            return Err(NnError::InvalidConfig("Embedding weight must be 2D".into()));
        }
        Ok(Self { weight })
    }

    pub fn num_embeddings(&self) -> usize {
        self.weight.shape().first().copied().unwrap_or(0)
    }

    pub fn embedding_dim(&self) -> usize {
        self.weight.shape().get(1).copied().unwrap_or(0)
    }

    /// Lookup rows for `indices`. Output shape: [indices.len(), embedding_dim]
    pub fn forward(&self, indices: &[usize]) -> NnResult<Tensor> {
        let table = self.weight.eval()?.to_f32_vec()?;
        gather_rows(&table, indices, self.num_embeddings(), self.embedding_dim())
    }
}

pub(crate) fn gather_rows(table: &[f32], indices: &[usize], rows: usize, dim: usize) -> NnResult<Tensor> {
    let mut out = Vec::with_capacity(indices.len() * dim);
    for &idx in indices {
        if idx >= rows {
            return Err(NnError::InvalidConfig(format!(
                "Index {} out of range for {} embeddings",
                idx, rows
            )));
        }
        out.extend_from_slice(&table[idx * dim..(idx + 1) * dim]);
    }
    Ok(Tensor::from_vec(out, vec![indices.len(), dim])?)
}

impl Layer for Embedding {
    fn kind(&self) -> &'static str {
        "Embedding"
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

    fn is_quantizable(&self) -> bool {
        true
    }

    fn to_quantized(&self, group_size: usize, bits: u32) -> NnResult<Box<dyn Layer>> {
        let weight = match self.weight.dtype() {
            DType::U32 => QuantizedWeight::from_packed(&self.weight, group_size, bits)?,
            _ => QuantizedWeight::from_float(&self.weight, group_size, bits)?,
        };
        Ok(Box::new(QuantizedEmbedding::new(weight)))
    }
}
