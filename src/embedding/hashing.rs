//! Feature-hashing embedder.
//!
//! Each lowercase word is hashed with SHA-256 into one of `dim` buckets with a
//! sign taken from the hash, then the row is L2-normalized. Output is
//! deterministic across processes, which keeps snapshots and search ordering
//! stable without model files.

use super::{l2_normalize_rows, Embedder};
use crate::error::{AppError, Result};
use ndarray::Array2;
use sha2::{Digest, Sha256};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "with",
];

pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(bytes);
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        ((h % self.dim as u64) as usize, sign)
    }
}

/// Lowercased alphanumeric words, minus stopwords.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
}

impl Embedder for HashingEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>> {
        let mut matrix = Array2::zeros((texts.len(), self.dim));
        for (i, text) in texts.iter().enumerate() {
            for token in tokenize(text) {
                let (idx, sign) = self.bucket(&token);
                matrix[[i, idx]] += sign;
            }
        }
        l2_normalize_rows(&mut matrix);
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(AppError::ModelError(
                "Hashing embedder produced non-finite values".to_string(),
            ));
        }
        Ok(matrix)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn fingerprint(&self) -> String {
        format!("hashing-sha256/{}", self.dim)
    }
}
