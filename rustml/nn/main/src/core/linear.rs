//! Linear layer implementation.

use crate::api::error::{NnError, NnResult};
use crate::api::traits::Layer;
use crate::core::quantized::{QuantizedLinear, QuantizedWeight};
use rustml_core::{DType, LazyTensor, Tensor};
use std::time::Instant;

/// A fully connected linear layer: y = xW^T + b
#[derive(Debug, Clone)]
pub struct Linear {
    /// Weight matrix [out_features, in_features]
    pub weight: LazyTensor,
    /// Optional bias vector [out_features]
    pub bias: Option<LazyTensor>,
}

impl Linear {
    /// Create a zero-initialized linear layer. Nothing is allocated until
    /// the parameters are forced.
    pub fn new(in_features: usize, out_features: usize, use_bias: bool) -> Self {
        Self {
            weight: LazyTensor::zeros(vec![out_features, in_features]),
            bias: use_bias.then(|| LazyTensor::zeros(vec![out_features])),
        }
    }

    /// Create a linear layer from existing weights
    pub fn from_weights(weight: LazyTensor, bias: Option<LazyTensor>) -> NnResult<Self> {
        let shape = weight.shape();
        if shape.len() != 2 {
            return Err(NnError::InvalidConfig("Weight must be 2D".into()));
        }
        if let Some(ref b) = bias {
            if b.shape() != [shape[0]] {
                return Err(NnError::ShapeMismatch(format!(
                    "Bias shape {:?} doesn't match out_features {}",
                    b.shape(),
                    shape[0]
                )));
            }
        }
        Ok(Self { weight, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape().get(1).copied().unwrap_or(0)
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape().first().copied().unwrap_or(0)
    }

    /// Forward pass: y = xW^T + b
    ///
    /// Input shape: [..., in_features]
    /// Output shape: [..., out_features]
    pub fn forward(&self, x: &Tensor) -> NnResult<Tensor> {
        let w = self.weight.eval()?.to_f32_vec()?;
        let bias = match &self.bias {
            Some(b) => Some(b.eval()?.to_f32_vec()?),
            None => None,
        };
        affine_forward(x, &w, bias.as_deref(), self.in_features(), self.out_features())
    }
}

/// Shared forward kernel for float and dequantized weights.
pub(crate) fn affine_forward(
    x: &Tensor,
    w: &[f32],
    bias: Option<&[f32]>,
    in_features: usize,
    out_features: usize,
) -> NnResult<Tensor> {
    let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

    let shape = x.shape();
    if shape.last().copied() != Some(in_features) {
        return Err(NnError::ShapeMismatch(format!(
            "Expected input [..., {}], got {:?}",
            in_features, shape
        )));
    }
    let xs = x.to_f32_vec()?;
    let rows = xs.len() / in_features.max(1);

    let mut out = Vec::with_capacity(rows * out_features);
    for row in xs.chunks_exact(in_features.max(1)).take(rows) {
        for (o, w_row) in w.chunks_exact(in_features.max(1)).enumerate().take(out_features) {
            let dot: f32 = row.iter().zip(w_row).map(|(a, b)| a * b).sum();
            out.push(dot + bias.map_or(0.0, |b| b[o]));
        }
    }

    let mut out_shape = shape.to_vec();
    if let Some(last) = out_shape.last_mut() {
        *last = out_features;
    }
    if let Some(t) = _t {
        log::trace!("[perf] nn::linear::forward [{}x{}]->[{}] {:.3}ms",
            rows, in_features, out_features, t.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(Tensor::from_vec(out, out_shape)?)
}

impl Layer for Linear {
    fn kind(&self) -> &'static str {
        "Linear"
    }

    fn parameters(&self) -> Vec<(String, LazyTensor)> {
        let mut params = vec![("weight".to_string(), self.weight.clone())];
        if let Some(b) = &self.bias {
            params.push(("bias".to_string(), b.clone()));
        }
        params
    }

    fn set_parameter(&mut self, name: &str, value: LazyTensor) -> NnResult<()> {
        match (name, &mut self.bias) {
            ("weight", _) => self.weight = value,
            ("bias", Some(b)) => *b = value,
            _ => {
                return Err(NnError::UnknownParameter {
                    layer: "Linear",
                    name: name.to_string(),
                })
            }
        }
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
        Ok(Box::new(QuantizedLinear::new(weight, self.bias.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy(values: Vec<f32>, shape: Vec<usize>) -> LazyTensor {
        LazyTensor::from_tensor(Tensor::from_vec(values, shape).unwrap())
    }

    #[test]
    fn test_linear_forward() {
        let layer = Linear::from_weights(
            lazy(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]),
            Some(lazy(vec![0.5, 0.0, -1.0], vec![3])),
        )
        .unwrap();
        let x = Tensor::from_vec(vec![2.0, 3.0], vec![1, 2]).unwrap();
        let y = layer.forward(&x).unwrap();
        assert_eq!(y.shape(), &[1, 3]);
        assert_eq!(y.to_f32_vec().unwrap(), vec![2.5, 3.0, 4.0]);
    }

    #[test]
    fn test_linear_rejects_bad_input() {
        let layer = Linear::new(4, 2, false);
        let x = Tensor::from_vec(vec![1.0; 3], vec![3]).unwrap();
        assert!(matches!(layer.forward(&x), Err(NnError::ShapeMismatch(_))));
    }

    #[test]
    fn test_from_weights_validates_bias() {
        let err = Linear::from_weights(lazy(vec![0.0; 4], vec![2, 2]), Some(lazy(vec![0.0; 3], vec![3])));
        assert!(matches!(err, Err(NnError::ShapeMismatch(_))));
    }

    #[test]
    fn test_parameters_and_slots() {
        let mut layer = Linear::new(4, 2, false);
        let names: Vec<String> = layer.parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["weight"]);
        assert!(!layer.weight.is_evaluated());

        assert!(matches!(
            layer.set_parameter("bias", LazyTensor::zeros(vec![2])),
            Err(NnError::UnknownParameter { .. })
        ));
        let w = LazyTensor::zeros(vec![2, 4]);
        layer.set_parameter("weight", w.clone()).unwrap();
        assert!(layer.weight.same_node(&w));
    }
}
