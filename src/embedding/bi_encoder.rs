//! ONNX bi-encoder embedder.
//!
//! Mean-pools `last_hidden_state` over the attention mask and L2-normalizes
//! the result. Sessions live in a fixed pool; a lock-free queue hands out
//! free indices so concurrent searches never share a session.

use super::{l2_normalize_rows, Embedder};
use crate::error::{AppError, Result};
use crossbeam::queue::ArrayQueue;
use ndarray::Array2;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;

pub struct BiEncoderEmbedder {
    sessions: Vec<Mutex<Session>>,
    available: ArrayQueue<usize>,
    tokenizer: Tokenizer,
    max_length: usize,
    embedding_dim: usize,
    model_name: String,
}

impl BiEncoderEmbedder {
    /// Load the tokenizer once and `pool_size` sessions from the same model bytes.
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        pool_size: usize,
    ) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| AppError::TokenizationError(format!("Failed to load tokenizer: {}", e)))?;

        let model_bytes = std::fs::read(model_path)
            .map_err(|e| AppError::ModelError(format!("Failed to read model file: {}", e)))?;

        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        let available = ArrayQueue::new(pool_size);

        for i in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .with_intra_threads(1)
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e| AppError::ModelError(e.to_string()))?;
            sessions.push(Mutex::new(session));
            available
                .push(i)
                .map_err(|_| AppError::ModelError("Failed to initialize session pool".into()))?;
        }

        let model_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bi-encoder".to_string());

        tracing::info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            max_length,
            pool_size,
            "Bi-encoder loaded"
        );

        Ok(Self {
            sessions,
            available,
            tokenizer,
            max_length,
            // BGE-base
            embedding_dim: 768,
            model_name,
        })
    }

    fn acquire_session(&self) -> Result<usize> {
        self.available
            .pop()
            .ok_or_else(|| AppError::ResourceError("No available embedding sessions".into()))
    }

    fn release_session(&self, index: usize) {
        let _ = self.available.push(index);
    }

    fn run_on_session(&self, session_idx: usize, texts: &[String]) -> Result<Array2<f32>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AppError::TokenizationError(e.to_string()))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_length))
            .max()
            .unwrap_or(1)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            for j in 0..ids.len().min(max_len) {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let shape = [batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
            .map_err(|e| AppError::ModelError(e.to_string()))?;

        let mut session = self.sessions[session_idx]
            .lock()
            .map_err(|_| AppError::ModelError("Embedding session poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| AppError::ModelError(format!("Bi-encoder inference failed: {}", e)))?;

        let hidden_state = outputs
            .get("last_hidden_state")
            .ok_or_else(|| AppError::ModelError("No 'last_hidden_state' output found".to_string()))?;
        let (shape_info, data) = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let hidden_size = shape_info[2] as usize;

        let mut embeddings = Array2::zeros((batch_size, hidden_size));
        for i in 0..batch_size {
            let mut count = 0.0f32;
            for j in 0..max_len {
                if attention_mask[i * max_len + j] == 1 {
                    let base = i * max_len * hidden_size + j * hidden_size;
                    for k in 0..hidden_size {
                        embeddings[[i, k]] += data[base + k];
                    }
                    count += 1.0;
                }
            }
            if count > 0.0 {
                embeddings.row_mut(i).mapv_inplace(|v| v / count);
            }
        }
        l2_normalize_rows(&mut embeddings);

        Ok(embeddings)
    }
}

impl Embedder for BiEncoderEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, self.embedding_dim)));
        }

        let session_idx = self.acquire_session()?;
        let result = self.run_on_session(session_idx, texts);
        self.release_session(session_idx);
        result
    }

    fn dim(&self) -> usize {
        self.embedding_dim
    }

    /// One call per pooled session.
    fn max_concurrency(&self) -> usize {
        self.sessions.len()
    }

    fn fingerprint(&self) -> String {
        format!("onnx/{}/{}", self.model_name, self.embedding_dim)
    }
}
