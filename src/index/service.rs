//! Document Index Service.
//!
//! Validates requests, short-circuits the trivially empty ones, and runs the
//! backend call on the blocking pool. Searches first wait for an embedding
//! permit, so callers may dispatch any number of calls in parallel and the
//! excess queues here instead of failing inside the embedder.

use crate::error::{AppError, Result};
use crate::index::types::{Chunk, ChunkHit, DocumentScope, HeaderHit, Locator};
use crate::index::DocumentBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

pub const DEFAULT_HEADER_K: i64 = 5;
pub const DEFAULT_CONTENT_K: i64 = 4;

/// How long a caller waits for an embedding permit before giving up.
pub const PERMIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct DocumentIndexService {
    backend: Arc<dyn DocumentBackend>,
    permits: Arc<Semaphore>,
}

impl DocumentIndexService {
    /// Service with one embedding permit per CPU core.
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        let num_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::with_permits(backend, Arc::new(Semaphore::new(num_cores)))
    }

    /// Service sharing `permits` with other embedding callers, e.g. ingestion.
    /// Size it to [`Embedder::max_concurrency`](crate::embedding::Embedder::max_concurrency).
    pub fn with_permits(backend: Arc<dyn DocumentBackend>, permits: Arc<Semaphore>) -> Self {
        Self { backend, permits }
    }

    /// Rank documents by summary similarity.
    ///
    /// A blank query or `k <= 0` returns an empty list without touching the
    /// backend.
    pub async fn search_headers(
        &self,
        tenant_id: &str,
        query: &str,
        k: i64,
    ) -> Result<Vec<HeaderHit>> {
        validate_tenant(tenant_id)?;
        let Some(k) = effective_k(query, k) else {
            return Ok(Vec::new());
        };
        let _permit = acquire_permit(&self.permits).await?;

        let backend = Arc::clone(&self.backend);
        let tenant = tenant_id.to_string();
        let query = query.to_string();
        let start = std::time::Instant::now();

        let hits = tokio::task::spawn_blocking(move || backend.search_headers(&tenant, &query, k))
            .await
            .map_err(|e| AppError::BackendError(format!("Header search task failed: {}", e)))??;

        tracing::debug!(
            tenant_id,
            k,
            results = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Header search completed"
        );
        metrics::histogram!("index_search_latency_ms", "kind" => "headers")
            .record(start.elapsed().as_millis() as f64);

        Ok(hits)
    }

    /// Rank chunks by content similarity, limited to `scope`.
    pub async fn search_content(
        &self,
        tenant_id: &str,
        query: &str,
        k: i64,
        scope: DocumentScope,
    ) -> Result<Vec<ChunkHit>> {
        validate_tenant(tenant_id)?;
        let Some(k) = effective_k(query, k) else {
            return Ok(Vec::new());
        };
        let _permit = acquire_permit(&self.permits).await?;

        let backend = Arc::clone(&self.backend);
        let tenant = tenant_id.to_string();
        let query = query.to_string();
        let start = std::time::Instant::now();
        let restricted = !scope.is_unrestricted();

        let hits = tokio::task::spawn_blocking(move || {
            backend.search_chunks(&tenant, &query, k, &scope)
        })
        .await
        .map_err(|e| AppError::BackendError(format!("Content search task failed: {}", e)))??;

        tracing::debug!(
            tenant_id,
            k,
            restricted,
            results = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Content search completed"
        );
        metrics::histogram!("index_search_latency_ms", "kind" => "content")
            .record(start.elapsed().as_millis() as f64);

        Ok(hits)
    }

    /// Fetch the chunk or page addressed by `locator`.
    pub async fn get_segment(
        &self,
        tenant_id: &str,
        document_id: &str,
        locator: Locator,
    ) -> Result<Vec<Chunk>> {
        validate_tenant(tenant_id)?;
        if document_id.trim().is_empty() {
            return Err(AppError::ValidationError(
                "document_id cannot be empty".to_string(),
            ));
        }

        let backend = Arc::clone(&self.backend);
        let tenant = tenant_id.to_string();
        let document = document_id.to_string();

        let chunks = tokio::task::spawn_blocking(move || {
            backend.fetch_segment(&tenant, &document, locator)
        })
        .await
        .map_err(|e| AppError::BackendError(format!("Segment fetch task failed: {}", e)))??;

        tracing::debug!(
            tenant_id,
            document_id,
            ?locator,
            segments = chunks.len(),
            "Segment fetched"
        );

        Ok(chunks)
    }
}

/// Wait for an embedding permit (503 if service overloaded).
pub async fn acquire_permit(permits: &Semaphore) -> Result<SemaphorePermit<'_>> {
    tokio::time::timeout(PERMIT_TIMEOUT, permits.acquire())
        .await
        .map_err(|_| {
            AppError::ResourceError("Service temporarily overloaded, please retry".to_string())
        })?
        .map_err(|_| AppError::ResourceError("Semaphore closed".to_string()))
}

fn validate_tenant(tenant_id: &str) -> Result<()> {
    if tenant_id.trim().is_empty() {
        return Err(AppError::ValidationError(
            "tenant_id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// `None` when the request can only produce an empty result.
fn effective_k(query: &str, k: i64) -> Option<usize> {
    if query.trim().is_empty() || k <= 0 {
        return None;
    }
    usize::try_from(k).ok()
}
