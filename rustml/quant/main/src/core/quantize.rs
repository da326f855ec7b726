use crate::api::error::{QuantError, QuantResult};
use crate::api::types::*;
use rayon::prelude::*;
use std::time::Instant;

/// Packed codes plus per-group affine parameters for a row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedGroups {
    /// `rows * packed_row_len(row_len, bits)` words
    pub packed: Vec<u32>,
    /// `rows * row_len / group_size` scales
    pub scales: Vec<f32>,
    /// `rows * row_len / group_size` biases (group minimums)
    pub biases: Vec<f32>,
}

/// Check that `group_size`/`bits` describe a representable layout.
pub fn validate_params(group_size: usize, bits: u32) -> QuantResult<()> {
    if !SUPPORTED_BITS.contains(&bits) {
        return Err(QuantError::UnsupportedBits(bits));
    }
    if group_size == 0 {
        return Err(QuantError::ZeroGroupSize);
    }
    Ok(())
}

/// Number of u32 words holding one row of `row_len` codes.
pub fn packed_row_len(row_len: usize, bits: u32) -> usize {
    row_len * bits as usize / WORD_BITS as usize
}

fn check_layout(n_elements: usize, row_len: usize, group_size: usize, bits: u32) -> QuantResult<()> {
    validate_params(group_size, bits)?;
    let per_word = (WORD_BITS / bits) as usize;
    if row_len == 0 || n_elements % row_len != 0 {
        return Err(QuantError::GroupAlignment(format!(
            "{} elements do not form rows of {}",
            n_elements, row_len
        )));
    }
    if row_len % group_size != 0 {
        return Err(QuantError::GroupAlignment(format!(
            "row length {} is not divisible by group size {}",
            row_len, group_size
        )));
    }
    if row_len % per_word != 0 {
        return Err(QuantError::GroupAlignment(format!(
            "row length {} does not pack into {}-bit words of {} codes",
            row_len, WORD_BITS, per_word
        )));
    }
    Ok(())
}

fn quantize_row(row: &[f32], group_size: usize, bits: u32) -> (Vec<u32>, Vec<f32>, Vec<f32>) {
    let per_word = (WORD_BITS / bits) as usize;
    let max_code = ((1u32 << bits) - 1) as f32;
    let mut codes = Vec::with_capacity(row.len());
    let mut scales = Vec::with_capacity(row.len() / group_size);
    let mut biases = Vec::with_capacity(row.len() / group_size);

    for group in row.chunks_exact(group_size) {
        let (lo, hi) = group
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let scale = if hi > lo { (hi - lo) / max_code } else { 1.0 };
        for &v in group {
            codes.push(((v - lo) / scale).round().clamp(0.0, max_code) as u32);
        }
        scales.push(scale);
        biases.push(lo);
    }

    let packed = codes
        .chunks_exact(per_word)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u32, |word, (i, &q)| word | (q << (bits as usize * i)))
        })
        .collect();

    (packed, scales, biases)
}

/// Quantize a row-major f32 matrix with `row_len` columns.
///
/// Requires `row_len` divisible by `group_size` and by the number of codes
/// per word. Rows are processed in parallel.
pub fn quantize_affine(
    data: &[f32],
    row_len: usize,
    group_size: usize,
    bits: u32,
) -> QuantResult<QuantizedGroups> {
    check_layout(data.len(), row_len, group_size, bits)?;
    let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

    let rows: Vec<(Vec<u32>, Vec<f32>, Vec<f32>)> = data
        .par_chunks(row_len)
        .map(|row| quantize_row(row, group_size, bits))
        .collect();

    let n_rows = rows.len();
    let mut out = QuantizedGroups {
        packed: Vec::with_capacity(n_rows * packed_row_len(row_len, bits)),
        scales: Vec::with_capacity(n_rows * row_len / group_size),
        biases: Vec::with_capacity(n_rows * row_len / group_size),
    };
    for (packed, scales, biases) in rows {
        out.packed.extend(packed);
        out.scales.extend(scales);
        out.biases.extend(biases);
    }

    if let Some(t) = _t {
        log::trace!("[perf] quant::quantize_affine [{}x{}] g={} b={} {:.3}ms",
            n_rows, row_len, group_size, bits, t.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(out)
}

/// Reconstruct f32 values from packed codes and group parameters.
pub fn dequantize_affine(
    packed: &[u32],
    scales: &[f32],
    biases: &[f32],
    row_len: usize,
    group_size: usize,
    bits: u32,
) -> QuantResult<Vec<f32>> {
    validate_params(group_size, bits)?;
    let per_word = (WORD_BITS / bits) as usize;
    let n_elements = packed.len() * per_word;
    check_layout(n_elements, row_len, group_size, bits)?;

    let n_groups = n_elements / group_size;
    if scales.len() != n_groups || biases.len() != n_groups {
        return Err(QuantError::ShapeMismatch {
            expected: vec![n_groups, n_groups],
            actual: vec![scales.len(), biases.len()],
        });
    }

    let mask = (1u32 << bits) - 1;
    let out = packed
        .iter()
        .flat_map(|&word| (0..per_word).map(move |i| (word >> (bits as usize * i)) & mask))
        .enumerate()
        .map(|(idx, q)| {
            let g = idx / group_size;
            q as f32 * scales[g] + biases[g]
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| (i as f32 * 0.37).sin()).collect()
    }

    #[test]
    fn test_validate_params() {
        assert!(validate_params(64, 4).is_ok());
        assert_eq!(validate_params(64, 3), Err(QuantError::UnsupportedBits(3)));
        assert_eq!(validate_params(0, 4), Err(QuantError::ZeroGroupSize));
    }

    #[test]
    fn test_output_layout() {
        let data = ramp(4 * 128);
        let q = quantize_affine(&data, 128, 64, 4).unwrap();
        assert_eq!(q.packed.len(), 4 * packed_row_len(128, 4));
        assert_eq!(q.packed.len(), 4 * 16);
        assert_eq!(q.scales.len(), 4 * 2);
        assert_eq!(q.biases.len(), 4 * 2);
    }

    #[test]
    fn test_quantize_q4_error_bound() {
        let data = ramp(2 * 64);
        let q = quantize_affine(&data, 64, 32, 4).unwrap();
        let back = dequantize_affine(&q.packed, &q.scales, &q.biases, 64, 32, 4).unwrap();
        assert_eq!(back.len(), data.len());
        for (i, (a, b)) in data.iter().zip(back.iter()).enumerate() {
            let g = i / 32;
            assert!((a - b).abs() <= q.scales[g] / 2.0 + 1e-6, "index {}: {} vs {}", i, a, b);
        }
    }

    #[test]
    fn test_quantize_q8_is_tighter_than_q4() {
        let data = ramp(256);
        let err = |bits| {
            let q = quantize_affine(&data, 256, 64, bits).unwrap();
            let back = dequantize_affine(&q.packed, &q.scales, &q.biases, 256, 64, bits).unwrap();
            data.iter().zip(back).map(|(a, b)| (a - b).abs()).fold(0.0f32, f32::max)
        };
        assert!(err(8) < err(4));
        assert!(err(4) < err(2));
    }

    #[test]
    fn test_constant_group() {
        let data = vec![0.5f32; 64];
        let q = quantize_affine(&data, 64, 64, 2).unwrap();
        assert_eq!(q.biases, vec![0.5]);
        let back = dequantize_affine(&q.packed, &q.scales, &q.biases, 64, 64, 2).unwrap();
        assert!(back.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_alignment_errors() {
        assert!(matches!(
            quantize_affine(&ramp(96), 96, 64, 4),
            Err(QuantError::GroupAlignment(_))
        ));
        assert!(matches!(
            quantize_affine(&ramp(100), 64, 32, 4),
            Err(QuantError::GroupAlignment(_))
        ));
        // 8-bit codes pack four per word, so a 2-element row cannot pack.
        assert!(matches!(
            quantize_affine(&ramp(4), 2, 2, 8),
            Err(QuantError::GroupAlignment(_))
        ));
    }

    #[test]
    fn test_dequantize_rejects_short_scales() {
        let q = quantize_affine(&ramp(128), 128, 64, 4).unwrap();
        assert!(matches!(
            dequantize_affine(&q.packed, &q.scales[..1], &q.biases, 128, 64, 4),
            Err(QuantError::ShapeMismatch { .. })
        ));
    }
}
