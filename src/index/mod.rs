//! Document index: storage, similarity search and segment lookup.

pub mod memory;
pub mod service;
pub mod types;

pub use memory::{InMemoryIndex, StoredDocument};
pub use service::{DocumentIndexService, DEFAULT_CONTENT_K, DEFAULT_HEADER_K};
pub use types::{
    Chunk, ChunkHit, Document, DocumentHeader, DocumentScope, DocumentSummary, HeaderHit, Locator,
    Metadata,
};

use crate::error::Result;

/// Read side of the index that the service delegates to.
///
/// Every call names its tenant; there is no cross-tenant read. Calls are
/// blocking and may run CPU-bound similarity work.
pub trait DocumentBackend: Send + Sync {
    /// Up to `k` documents ranked by summary similarity, best first.
    fn search_headers(&self, tenant_id: &str, query: &str, k: usize) -> Result<Vec<HeaderHit>>;

    /// Up to `k` chunks of admitted documents ranked by content similarity.
    fn search_chunks(
        &self,
        tenant_id: &str,
        query: &str,
        k: usize,
        scope: &DocumentScope,
    ) -> Result<Vec<ChunkHit>>;

    /// Chunks matching `locator` in ascending `chunk_index`. Unknown
    /// documents yield an empty list.
    fn fetch_segment(
        &self,
        tenant_id: &str,
        document_id: &str,
        locator: Locator,
    ) -> Result<Vec<Chunk>>;
}
