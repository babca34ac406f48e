//! Feature-hashing embedder.
//!
//! Stands in for a neural embedding service during development and in
//! tests: deterministic, dependency-free and L2-normalised. Each
//! whitespace token is hashed into one bucket with XxHash64.

use std::hash::{Hash, Hasher};

use localrag_core::traits::Embedder;
use localrag_core::{Error, Result};
use twox_hash::XxHash64;

pub struct HashingEmbedder { dim: usize }

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 { return Err(Error::InvalidConfig("embedding dimension must be positive".into())); }
        Ok(Self { dim })
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; }
        Ok(v)
    }
}

/// Embedder used when no model service is configured.
pub fn get_default_embedder(dim: usize) -> Result<Box<dyn Embedder>> {
    tracing::info!(dim, "using hashing embedder");
    Ok(Box::new(HashingEmbedder::new(dim)?))
}
