//! Multi-dtype Tensor with Arc<Storage> backend.

use crate::api::error::{TensorError, TensorResult};
use crate::api::types::DType;
use half::{bf16, f16};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Safely convert a Vec<f32> into a Vec<u8> without unsafe code.
pub fn f32_vec_to_bytes(v: Vec<f32>) -> Vec<u8> {
    match bytemuck::try_cast_vec::<f32, u8>(v) {
        Ok(bytes) => bytes,
        Err((_, original)) => bytemuck::cast_slice::<f32, u8>(&original).to_vec(),
    }
}

fn u32_vec_to_bytes(v: Vec<u32>) -> Vec<u8> {
    match bytemuck::try_cast_vec::<u32, u8>(v) {
        Ok(bytes) => bytes,
        Err((_, original)) => bytemuck::cast_slice::<u32, u8>(&original).to_vec(),
    }
}

/// Underlying storage for tensor data.
pub enum Storage {
    Owned(Vec<u8>),
    MMap {
        mmap: Arc<memmap2::Mmap>,
        offset: usize,
        len: usize,
    },
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Owned(v) => write!(f, "Owned({} bytes)", v.len()),
            Storage::MMap { offset, len, .. } => {
                write!(f, "MMap(offset={}, len={})", offset, len)
            }
        }
    }
}

/// Shape type: stack-allocated for <=4 dims.
pub type TensorShape = SmallVec<[usize; 4]>;

/// An immutable, contiguous multi-dimensional array.
///
/// Tensors are cheap to clone: the byte storage is shared.
#[derive(Clone)]
pub struct Tensor {
    data: Arc<Storage>,
    shape: TensorShape,
    dtype: DType,
}

impl Tensor {
    /// Create a tensor from raw bytes with the given shape and dtype.
    pub fn new(data: Vec<u8>, shape: impl Into<TensorShape>, dtype: DType) -> TensorResult<Self> {
        let shape: TensorShape = shape.into();
        let expected = shape.iter().product::<usize>() * dtype.size();
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                expected: vec![expected],
                got: vec![data.len()],
            });
        }
        Ok(Self {
            data: Arc::new(Storage::Owned(data)),
            shape,
            dtype,
        })
    }

    /// Create a tensor backed by a memory-mapped file region.
    ///
    /// The region is not validated against `shape`; callers obtain offsets
    /// from a parsed file header.
    pub fn from_mmap(
        mmap: Arc<memmap2::Mmap>,
        offset: usize,
        len: usize,
        shape: impl Into<TensorShape>,
        dtype: DType,
    ) -> Self {
        Self {
            data: Arc::new(Storage::MMap { mmap, offset, len }),
            shape: shape.into(),
            dtype,
        }
    }

    /// Create an F32 tensor from a vector.
    pub fn from_vec(data: Vec<f32>, shape: impl Into<TensorShape>) -> TensorResult<Self> {
        let shape: TensorShape = shape.into();
        if data.len() != shape.iter().product::<usize>() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Self {
            data: Arc::new(Storage::Owned(f32_vec_to_bytes(data))),
            shape,
            dtype: DType::F32,
        })
    }

    /// Create a U32 tensor from packed words.
    pub fn from_u32_vec(data: Vec<u32>, shape: impl Into<TensorShape>) -> TensorResult<Self> {
        let shape: TensorShape = shape.into();
        if data.len() != shape.iter().product::<usize>() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Self {
            data: Arc::new(Storage::Owned(u32_vec_to_bytes(data))),
            shape,
            dtype: DType::U32,
        })
    }

    /// Create an F32 tensor filled with zeros.
    pub fn zeros(shape: impl Into<TensorShape>) -> Self {
        let shape: TensorShape = shape.into();
        let n: usize = shape.iter().product();
        Self {
            data: Arc::new(Storage::Owned(vec![0u8; n * 4])),
            shape,
            dtype: DType::F32,
        }
    }

    // ==================== Properties ====================

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of bytes held by the storage.
    pub fn byte_len(&self) -> usize {
        match self.data.as_ref() {
            Storage::Owned(v) => v.len(),
            Storage::MMap { len, .. } => *len,
        }
    }

    /// True when the bytes live in a memory-mapped file.
    pub fn is_mapped(&self) -> bool {
        matches!(self.data.as_ref(), Storage::MMap { .. })
    }

    /// Returns the raw byte slice from any Storage variant.
    pub fn as_raw_bytes(&self) -> TensorResult<&[u8]> {
        match self.data.as_ref() {
            Storage::Owned(v) => Ok(v.as_slice()),
            Storage::MMap { mmap, offset, len } => mmap
                .get(*offset..*offset + *len)
                .ok_or_else(|| {
                    TensorError::InvalidOperation(format!(
                        "mapped region {}..{} exceeds file of {} bytes",
                        offset,
                        offset + len,
                        mmap.len()
                    ))
                }),
        }
    }

    /// Copy the bytes into owned storage, detaching from any file mapping.
    pub fn to_owned_storage(&self) -> TensorResult<Self> {
        if let Storage::Owned(_) = self.data.as_ref() {
            return Ok(self.clone());
        }
        let bytes = self.as_raw_bytes()?.to_vec();
        Self::new(bytes, self.shape.clone(), self.dtype)
    }

    /// Convert a float tensor to an f32 vector.
    pub fn to_f32_vec(&self) -> TensorResult<Vec<f32>> {
        let bytes = self.as_raw_bytes()?;
        match self.dtype {
            DType::F32 => Ok(bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()),
            DType::F16 => Ok(bytes
                .chunks_exact(2)
                .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect()),
            DType::BF16 => Ok(bytes
                .chunks_exact(2)
                .map(|c| bf16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect()),
            other => Err(TensorError::ConversionError(format!(
                "cannot convert {} tensor to f32",
                other
            ))),
        }
    }

    /// Read packed U32 words.
    pub fn to_u32_vec(&self) -> TensorResult<Vec<u32>> {
        if self.dtype != DType::U32 {
            return Err(TensorError::DTypeMismatch {
                expected: DType::U32,
                got: self.dtype,
            });
        }
        Ok(self
            .as_raw_bytes()?
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape.as_slice())
            .field("dtype", &self.dtype)
            .field("storage", &self.data)
            .finish()
    }
}
