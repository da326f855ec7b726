//! SafeTensors shard reader
//!
//! SafeTensors is a simple and safe format for storing tensors.
//! Format specification: https://github.com/huggingface/safetensors
//!
//! Shards are memory-mapped and their headers parsed eagerly; tensor bytes
//! are only touched when the returned lazy handles are forced.

use crate::api::error::HubResult;
use rustml_core::{DType, LazyTensor, Tensor};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors specific to SafeTensors loading
#[derive(Error, Debug)]
pub enum SafeTensorsError {
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Unsupported dtype: {0}")]
    UnsupportedDtype(String),
}

fn map_dtype(dtype: safetensors::Dtype) -> Result<DType, SafeTensorsError> {
    match dtype {
        safetensors::Dtype::F32 => Ok(DType::F32),
        safetensors::Dtype::F16 => Ok(DType::F16),
        safetensors::Dtype::BF16 => Ok(DType::BF16),
        safetensors::Dtype::I32 => Ok(DType::I32),
        safetensors::Dtype::I64 => Ok(DType::I64),
        safetensors::Dtype::U8 => Ok(DType::U8),
        safetensors::Dtype::U32 => Ok(DType::U32),
        other => Err(SafeTensorsError::UnsupportedDtype(format!("{:?}", other))),
    }
}

/// Read a shard's tensors as lazy handles, sorted by name.
///
/// Forcing a handle copies its bytes out of the mapping into owned storage.
/// The mapping stays alive as long as any unforced handle does.
pub fn load_safetensors_lazy(path: &Path) -> HubResult<Vec<(String, LazyTensor)>> {
    let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

    let file = File::open(path)?;
    // SAFETY: The file is opened read-only and lives for the duration of the
    // returned tensors (via Arc<Mmap>). Memory-mapped reads are safe as long as
    // no external process truncates/modifies the file while mapped.
    let mmap = unsafe { memmap2::MmapOptions::new().map(&file) }?;
    let mmap_arc = Arc::new(mmap);

    let st = safetensors::SafeTensors::deserialize(mmap_arc.as_ref())
        .map_err(|e| SafeTensorsError::InvalidHeader(e.to_string()))?;

    let mut tensors = Vec::with_capacity(st.len());
    for (name, view) in st.tensors() {
        let dtype = map_dtype(view.dtype())?;
        let shape: Vec<usize> = view.shape().to_vec();
        let data_len = view.data().len();

        // Calculate offset relative to mmap start
        let mmap_ptr = mmap_arc.as_ptr() as usize;
        let data_ptr = view.data().as_ptr() as usize;
        let offset = data_ptr - mmap_ptr;

        let mapped = Tensor::from_mmap(mmap_arc.clone(), offset, data_len, shape.clone(), dtype);
        let lazy = LazyTensor::from_fn(shape, dtype, move || mapped.to_owned_storage());
        tensors.push((name, lazy));
    }
    tensors.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(t) = _t {
        log::trace!("[perf] hub::load_safetensors_lazy {} n={} {:.3}ms",
            path.display(), tensors.len(), t.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(tensors)
}
