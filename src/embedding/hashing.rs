//! Offline feature-hashing embedder.
//!
//! Each lower-cased alphanumeric token is hashed with SHA-256; the first
//! eight digest bytes pick a bucket and the ninth picks a sign. The summed
//! vector is L2-normalized, so texts sharing vocabulary land close together.
//! No model download and no network access are needed, which makes this the
//! provider of choice for tests and air-gapped builds.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use study_retrieval_core::embedding::EmbeddingProvider;

pub const DEFAULT_DIMS: usize = 256;

/// Deterministic bag-of-words embedder.
pub struct HashingProvider {
    dims: usize,
}

impl HashingProvider {
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Embed a single text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
