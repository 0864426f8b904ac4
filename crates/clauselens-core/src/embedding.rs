//! Vector utilities shared by the index, coverage, and clustering code.
//!
//! - [`cosine_similarity`]: similarity between two raw vectors
//! - [`l2_normalize`]: scale a vector to unit length in place
//! - [`dot`]: inner product (cosine similarity for unit vectors)
//! - [`centroid`]: component-wise mean of a set of vectors
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` encoding
//!
//! Concrete embedding providers live in the `clauselens` application
//! crate; this module only deals with the numbers they return.

use crate::error::{CoreError, Result};

/// A fixed-length embedding vector.
pub type Embedding = Vec<f32>;

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or when
/// either vector has zero magnitude. Callers that must treat a length
/// disagreement as fatal check with [`ensure_dims`] first.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale `v` to unit L2 norm. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Return a unit-length copy of `v`.
pub fn normalized(v: &[f32]) -> Embedding {
    let mut out = v.to_vec();
    l2_normalize(&mut out);
    out
}

/// Fail with [`CoreError::DimensionMismatch`] unless `v` has `expected` components.
pub fn ensure_dims(v: &[f32], expected: usize) -> Result<()> {
    if v.len() != expected {
        return Err(CoreError::DimensionMismatch {
            expected,
            actual: v.len(),
        });
    }
    Ok(())
}

/// Component-wise mean of `vectors`.
///
/// All vectors must share the length of the first one.
pub fn centroid<'a, I>(vectors: I) -> Result<Embedding>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut iter = vectors.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| CoreError::invalid("centroid of an empty set"))?;
    let mut sum: Vec<f64> = first.iter().map(|&x| x as f64).collect();
    let mut count = 1usize;

    for v in iter {
        ensure_dims(v, sum.len())?;
        for (acc, &x) in sum.iter_mut().zip(v.iter()) {
            *acc += x as f64;
        }
        count += 1;
    }

    Ok(sum.into_iter().map(|x| (x / count as f64) as f32).collect())
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// # Example
///
/// ```rust
/// use clauselens_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian `f32` bytes back into a float vector.
///
/// Trailing bytes that do not form a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
