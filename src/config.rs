use std::env;
use std::path::PathBuf;

/// Which embedder backs the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing. Needs no model files.
    Hashing,
    /// ONNX bi-encoder loaded from `BI_ENCODER_MODEL_PATH`.
    Onnx,
}

impl EmbeddingBackend {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "onnx" | "bi-encoder" | "model" => Self::Onnx,
            _ => Self::Hashing,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Tenant used when a request carries no `x-tenant-id` header.
    pub default_tenant: String,
    /// Maximum characters per chunk at ingestion.
    pub chunk_size: usize,
    /// Characters carried over between consecutive chunks of a page.
    pub chunk_overlap: usize,
    /// Add an extractive `summary` and `keywords` to each chunk's metadata.
    pub enable_metadata_enrichment: bool,
    pub embedding_backend: EmbeddingBackend,
    /// Dimension of the hashing embedder. Ignored by the ONNX backend.
    pub embedding_dim: usize,
    pub bi_encoder_model_path: PathBuf,
    pub bi_encoder_tokenizer_path: PathBuf,
    pub max_sequence_length: usize,
    /// Optional override for the ONNX session pool size. If None, uses available cores.
    pub pool_size: Option<usize>,
    /// Index snapshot. Loaded at startup and rewritten after every mutation.
    pub snapshot_path: Option<PathBuf>,
    /// Optional JSON file of ingest requests applied at startup.
    pub seed_path: Option<PathBuf>,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: 30,
            default_tenant: "default".to_string(),
            chunk_size: 1000,
            chunk_overlap: 50,
            enable_metadata_enrichment: false,
            embedding_backend: EmbeddingBackend::Hashing,
            embedding_dim: 512,
            bi_encoder_model_path: PathBuf::from("./bi-encoder-model/model_int8.onnx"),
            bi_encoder_tokenizer_path: PathBuf::from("./bi-encoder-model/tokenizer.json"),
            max_sequence_length: 512,
            pool_size: None,
            snapshot_path: None,
            seed_path: None,
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// `EMBEDDING_BACKEND=onnx` switches to the bi-encoder; anything else keeps
    /// the hashing embedder.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let chunk_size: usize = env::var("CHUNK_SIZE")
            .unwrap_or_else(|_| defaults.chunk_size.to_string())
            .parse()?;
        let chunk_overlap: usize = env::var("CHUNK_OVERLAP")
            .unwrap_or_else(|_| defaults.chunk_overlap.to_string())
            .parse()?;
        if chunk_size == 0 {
            anyhow::bail!("CHUNK_SIZE must be at least 1");
        }
        if chunk_overlap >= chunk_size {
            anyhow::bail!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                chunk_overlap,
                chunk_size
            );
        }

        let embedding_dim: usize = env::var("EMBEDDING_DIM")
            .unwrap_or_else(|_| defaults.embedding_dim.to_string())
            .parse()?;
        if embedding_dim == 0 {
            anyhow::bail!("EMBEDDING_DIM must be at least 1");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| defaults.shutdown_timeout_secs.to_string())
                .parse()?,
            default_tenant: env::var("DEFAULT_TENANT")
                .ok()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(defaults.default_tenant),
            chunk_size,
            chunk_overlap,
            enable_metadata_enrichment: env::var("ENABLE_METADATA_ENRICHMENT")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.enable_metadata_enrichment),
            embedding_backend: env::var("EMBEDDING_BACKEND")
                .map(|v| EmbeddingBackend::parse(&v))
                .unwrap_or(defaults.embedding_backend),
            embedding_dim,
            bi_encoder_model_path: env::var("BI_ENCODER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.bi_encoder_model_path),
            bi_encoder_tokenizer_path: env::var("BI_ENCODER_TOKENIZER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.bi_encoder_tokenizer_path),
            max_sequence_length: env::var("MAX_SEQ_LENGTH")
                .unwrap_or_else(|_| defaults.max_sequence_length.to_string())
                .parse()?,
            pool_size: env::var("POOL_SIZE").ok().and_then(|s| s.parse().ok()),
            snapshot_path: env::var("SNAPSHOT_PATH").ok().map(PathBuf::from),
            seed_path: env::var("SEED_PATH").ok().map(PathBuf::from),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .unwrap_or_else(|_| defaults.max_body_bytes.to_string())
                .parse()?,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
