//! docindex - tenant-scoped document index with an LLM tool surface
//!
//! This library exposes the index, ingestion and tool layers so the HTTP
//! binary, integration tests and other hosts can share them.

pub mod config;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod index;
pub mod ingestion;
pub mod persistence;
pub mod state;
pub mod tools;

// Re-export key types for convenience
pub use config::{Config, EmbeddingBackend};
pub use error::{AppError, Result};
pub use handlers::router;
pub use index::{DocumentBackend, DocumentIndexService, InMemoryIndex, Locator};
pub use ingestion::{IngestReport, IngestRequest, Ingestor};
pub use state::AppState;
pub use tools::{Tool, ToolContext, ToolEnvelope, ToolRegistry};
