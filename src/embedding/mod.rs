//! Text embedders used by the index.
//!
//! Every embedder returns L2-normalized rows, so cosine similarity reduces to
//! a dot product.

pub mod bi_encoder;
pub mod hashing;

pub use bi_encoder::BiEncoderEmbedder;
pub use hashing::HashingEmbedder;

use crate::config::{Config, EmbeddingBackend};
use crate::error::Result;
use ndarray::{Array1, Array2};
use std::sync::Arc;

pub trait Embedder: Send + Sync {
    /// Embed a batch of texts into a `(texts.len(), dim)` matrix.
    fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>>;

    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let matrix = self.embed_batch(&[text.to_string()])?;
        Ok(matrix.row(0).to_owned())
    }

    fn dim(&self) -> usize;

    /// Number of embedding calls that may run at once.
    fn max_concurrency(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    /// Identifies the vector space. Snapshots written under a different
    /// fingerprint are re-embedded on load.
    fn fingerprint(&self) -> String;
}

/// Build the embedder selected by `EMBEDDING_BACKEND`.
pub fn from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding_backend {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(config.embedding_dim))),
        EmbeddingBackend::Onnx => {
            let pool_size = config.pool_size.unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            });
            let embedder = BiEncoderEmbedder::load(
                &config.bi_encoder_model_path,
                &config.bi_encoder_tokenizer_path,
                config.max_sequence_length,
                pool_size,
            )?;
            Ok(Arc::new(embedder))
        }
    }
}

/// Cosine similarity between a normalized query and normalized rows.
pub fn cosine_similarity(query: &Array1<f32>, rows: &Array2<f32>) -> Vec<f32> {
    if rows.ncols() != query.len() {
        return vec![0.0; rows.nrows()];
    }
    rows.outer_iter().map(|row| query.dot(&row)).collect()
}

/// Scale each row to unit length. Zero rows stay zero.
pub(crate) fn l2_normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.rows_mut() {
        let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine_similarity_of_normalized_rows() {
        let query = array![1.0f32, 0.0];
        let rows = array![[1.0f32, 0.0], [0.0, 1.0], [0.6, 0.8]];
        let sims = cosine_similarity(&query, &rows);
        assert_eq!(sims, vec![1.0, 0.0, 0.6]);
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        let query = array![1.0f32, 0.0, 0.0];
        let rows = array![[1.0f32, 0.0]];
        assert_eq!(cosine_similarity(&query, &rows), vec![0.0]);
    }

    #[test]
    fn test_normalize_leaves_zero_rows() {
        let mut m = array![[3.0f32, 4.0], [0.0, 0.0]];
        l2_normalize_rows(&mut m);
        assert!((m[[0, 0]] - 0.6).abs() < 1e-6);
        assert!((m[[0, 1]] - 0.8).abs() < 1e-6);
        assert_eq!(m[[1, 0]], 0.0);
    }
}
