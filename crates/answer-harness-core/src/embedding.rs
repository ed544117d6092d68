//! Embedding trait and vector utilities.
//!
//! Defines the [`Embedder`] trait implemented by the application's inference
//! backends, plus pure helpers for normalization, similarity, and the BLOB
//! encoding used by the SQLite store.
//!
//! Every vector handed to the rest of the pipeline is unit length, so cosine
//! and Euclidean orderings agree and the store can treat `1 - dot` as the
//! distance metric.

use async_trait::async_trait;

use crate::error::HarnessError;

/// A text embedding backend.
///
/// Implementations must return unit-normalized vectors of a fixed
/// dimensionality and must fail with [`HarnessError::Embedding`] when the
/// backend is unreachable, never a zero or garbage vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"bge-base-en-v1.5"`).
    fn model_name(&self) -> &str;

    /// Embedding dimensionality, fixed per deployment.
    fn dims(&self) -> usize;

    /// Embed a batch of passages, one vector per input, in input order.
    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, HarnessError>;
}

/// Scale a vector to unit L2 length, in place. Zero vectors are left as-is.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
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

/// Cosine distance (`1 - similarity`), the ordering key for search results.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
