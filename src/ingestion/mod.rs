//! Ingestion: chunking raw pages into documents the index can search.

pub mod chunker;
pub mod pipeline;
pub mod types;

pub use chunker::{PageChunk, RecursiveChunker};
pub use pipeline::{infer_document_type, Ingestor};
pub use types::{IngestReport, IngestRequest, SeedDocument};
