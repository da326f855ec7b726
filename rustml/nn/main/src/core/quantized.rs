//! Quantized replacements for `Linear` and `Embedding`.
//!
//! Weights are stored as packed U32 codes with per-group `scales` and
//! `biases`, laid out row-major: `[rows, cols * bits / 32]` words and
//! `[rows, cols / group_size]` group parameters.

use crate::api::error::{NnError, NnResult};
use crate::api::traits::Layer;
use crate::core::embedding::gather_rows;
use crate::core::linear::affine_forward;
use rustml_core::{DType, LazyTensor, Tensor, TensorError, TensorResult};
use rustml_quant::{dequantize_affine, packed_row_len, quantize_affine, validate_params, WORD_BITS};
use std::sync::{Arc, OnceLock};

type Parts = TensorResult<(Tensor, Tensor, Tensor)>;

/// Packed weight plus its group parameters.
#[derive(Debug, Clone)]
pub struct QuantizedWeight {
    pub weight: LazyTensor,
    pub scales: LazyTensor,
    pub biases: LazyTensor,
    pub group_size: usize,
    pub bits: u32,
}

impl QuantizedWeight {
    /// Defer quantization of a 2-D float weight.
    ///
    /// Layout is validated now; the codes are computed when any of the three
    /// parts is first forced, and computed once for all three.
    pub fn from_float(source: &LazyTensor, group_size: usize, bits: u32) -> NnResult<Self> {
        validate_params(group_size, bits)?;
        let (rows, cols) = matrix_dims(source)?;
        if !source.dtype().is_float() {
            return Err(NnError::InvalidConfig(format!(
                "cannot quantize a {} weight",
                source.dtype()
            )));
        }
        check_row(cols, group_size, bits)?;

        let cell: Arc<OnceLock<Parts>> = Arc::new(OnceLock::new());
        let part = |shape: Vec<usize>, dtype: DType, pick: fn((Tensor, Tensor, Tensor)) -> Tensor| {
            let cell = cell.clone();
            let source = source.clone();
            LazyTensor::from_fn(shape, dtype, move || {
                cell.get_or_init(|| quantize_parts(&source, rows, cols, group_size, bits))
                    .clone()
                    .map(pick)
            })
        };

        let groups = cols / group_size;
        Ok(Self {
            weight: part(vec![rows, packed_row_len(cols, bits)], DType::U32, |p| p.0),
            scales: part(vec![rows, groups], DType::F32, |p| p.1),
            biases: part(vec![rows, groups], DType::F32, |p| p.2),
            group_size,
            bits,
        })
    }

    /// Wrap weight words that are already packed.
    ///
    /// The group parameters start as zero placeholders; they are expected to
    /// be bound from the checkpoint's side tensors.
    pub fn from_packed(packed: &LazyTensor, group_size: usize, bits: u32) -> NnResult<Self> {
        validate_params(group_size, bits)?;
        let (rows, words) = matrix_dims(packed)?;
        if packed.dtype() != DType::U32 {
            return Err(NnError::InvalidConfig(format!(
                "packed weight must be u32, got {}",
                packed.dtype()
            )));
        }
        let cols = words * WORD_BITS as usize / bits as usize;
        check_row(cols, group_size, bits)?;
        Ok(Self {
            weight: packed.clone(),
            scales: LazyTensor::zeros(vec![rows, cols / group_size]),
            biases: LazyTensor::zeros(vec![rows, cols / group_size]),
            group_size,
            bits,
        })
    }

    pub fn rows(&self) -> usize {
        self.weight.shape().first().copied().unwrap_or(0)
    }

    /// Unpacked row length.
    pub fn cols(&self) -> usize {
        self.weight.shape().get(1).copied().unwrap_or(0) * WORD_BITS as usize / self.bits as usize
    }

    /// Reconstruct the float matrix, row-major.
    pub fn dequantize(&self) -> NnResult<Vec<f32>> {
        let packed = self.weight.eval()?.to_u32_vec()?;
        let scales = self.scales.eval()?.to_f32_vec()?;
        let biases = self.biases.eval()?.to_f32_vec()?;
        Ok(dequantize_affine(&packed, &scales, &biases, self.cols(), self.group_size, self.bits)?)
    }

    fn parameters(&self) -> Vec<(String, LazyTensor)> {
        vec![
            ("weight".to_string(), self.weight.clone()),
            ("scales".to_string(), self.scales.clone()),
            ("biases".to_string(), self.biases.clone()),
        ]
    }

    fn slot(&mut self, name: &str) -> Option<&mut LazyTensor> {
        match name {
            "weight" => Some(&mut self.weight),
            "scales" => Some(&mut self.scales),
            "biases" => Some(&mut self.biases),
            _ => None,
        }
    }
}

fn matrix_dims(t: &LazyTensor) -> NnResult<(usize, usize)> {
    match t.shape() {
        [rows, cols] => Ok((*rows, *cols)),
        other => Err(NnError::ShapeMismatch(format!(
            "quantized weights must be 2D, got {:?}",
            other
        ))),
    }
}

fn check_row(cols: usize, group_size: usize, bits: u32) -> NnResult<()> {
    if cols % group_size != 0 || (cols * bits as usize) % WORD_BITS as usize != 0 {
        return Err(NnError::ShapeMismatch(format!(
            "row length {} does not split into groups of {} at {} bits",
            cols, group_size, bits
        )));
    }
    Ok(())
}

fn quantize_parts(source: &LazyTensor, rows: usize, cols: usize, group_size: usize, bits: u32) -> Parts {
    let data = source.eval()?.to_f32_vec()?;
    let q = quantize_affine(&data, cols, group_size, bits)
        .map_err(|e| TensorError::EvaluationFailed(e.to_string()))?;
    let groups = cols / group_size;
    Ok((
        Tensor::from_u32_vec(q.packed, vec![rows, packed_row_len(cols, bits)])?,
        Tensor::from_vec(q.scales, vec![rows, groups])?,
        Tensor::from_vec(q.biases, vec![rows, groups])?,
    ))
}

/// Linear layer over a quantized weight.
#[derive(Debug, Clone)]
pub struct QuantizedLinear {
    pub weight: QuantizedWeight,
    pub bias: Option<LazyTensor>,
}

impl QuantizedLinear {
    pub fn new(weight: QuantizedWeight, bias: Option<LazyTensor>) -> Self {
        Self { weight, bias }
    }

    /// Dequantize-then-matmul. Input shape: [..., in_features]
    pub fn forward(&self, x: &Tensor) -> NnResult<Tensor> {
        let w = self.weight.dequantize()?;
        let bias = match &self.bias {
            Some(b) => Some(b.eval()?.to_f32_vec()?),
            None => None,
        };
        affine_forward(x, &w, bias.as_deref(), self.weight.cols(), self.weight.rows())
    }
}

impl Layer for QuantizedLinear {
    fn kind(&self) -> &'static str {
        "QuantizedLinear"
    }

    fn parameters(&self) -> Vec<(String, LazyTensor)> {
        let mut params = self.weight.parameters();
        if let Some(b) = &self.bias {
            params.push(("bias".to_string(), b.clone()));
        }
        params
    }

    fn set_parameter(&mut self, name: &str, value: LazyTensor) -> NnResult<()> {
        let slot = match name {
            "bias" => self.bias.as_mut(),
            _ => self.weight.slot(name),
        };
        match slot {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(NnError::UnknownParameter { layer: "QuantizedLinear", name: name.to_string() }),
        }
    }

    fn is_quantized(&self) -> bool {
        true
    }
}

/// Embedding table over a quantized weight.
#[derive(Debug, Clone)]
pub struct QuantizedEmbedding {
    pub weight: QuantizedWeight,
}

impl QuantizedEmbedding {
    pub fn new(weight: QuantizedWeight) -> Self {
        Self { weight }
    }

    pub fn forward(&self, indices: &[usize]) -> NnResult<Tensor> {
        let table = self.weight.dequantize()?;
        gather_rows(&table, indices, self.weight.rows(), self.weight.cols())
    }
}

impl Layer for QuantizedEmbedding {
    fn kind(&self) -> &'static str {
        "QuantizedEmbedding"
    }

    fn parameters(&self) -> Vec<(String, LazyTensor)> {
        self.weight.parameters()
    }

    fn set_parameter(&mut self, name: &str, value: LazyTensor) -> NnResult<()> {
        match self.weight.slot(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(NnError::UnknownParameter { layer: "QuantizedEmbedding", name: name.to_string() }),
        }
    }

    fn is_quantized(&self) -> bool {
        true
    }
}
