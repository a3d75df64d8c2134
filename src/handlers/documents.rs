//! Administrative document endpoints: ingest, batch ingest, list and delete.
//!
//! These mutate the index and are not exposed as tools.

use crate::error::{AppError, Result};
use crate::handlers::tenant_id;
use crate::index::service::acquire_permit;
use crate::index::DocumentSummary;
use crate::ingestion::{IngestReport, IngestRequest};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub tenant_id: String,
    pub document_count: usize,
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Serialize)]
pub struct BatchIngestResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<IngestReport>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub document_id: String,
    pub deleted: bool,
}

/// POST /documents - Chunk, embed and store a document, then snapshot.
pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>> {
    let tenant = tenant_id(&headers, &state.config.default_tenant)?;
    let _permit = acquire_permit(&state.embed_permits).await?;

    // Chunking and embedding are CPU-bound
    let worker = Arc::clone(&state);
    let report = tokio::task::spawn_blocking(move || {
        let report = worker.ingestor.ingest(&tenant, request)?;
        worker.persist()?;
        Ok::<_, AppError>(report)
    })
    .await
    .map_err(|e| AppError::BackendError(format!("Ingestion task failed: {}", e)))??;

    Ok(Json(report))
}

/// POST /documents/batch - Ingest several documents, one report each.
///
/// A failing entry does not stop the batch. The snapshot is written once,
/// after the last entry, if anything was stored.
pub async fn ingest_batch_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(requests): Json<Vec<IngestRequest>>,
) -> Result<Json<BatchIngestResponse>> {
    let tenant = tenant_id(&headers, &state.config.default_tenant)?;
    if requests.is_empty() {
        return Err(AppError::ValidationError(
            "Batch must contain at least one document".to_string(),
        ));
    }
    let _permit = acquire_permit(&state.embed_permits).await?;

    let worker = Arc::clone(&state);
    let results = tokio::task::spawn_blocking(move || {
        let results = worker.ingestor.ingest_batch(&tenant, requests);
        if results.iter().any(|r| r.success) {
            worker.persist()?;
        }
        Ok::<_, AppError>(results)
    })
    .await
    .map_err(|e| AppError::BackendError(format!("Batch ingestion task failed: {}", e)))??;

    let succeeded = results.iter().filter(|r| r.success).count();
    Ok(Json(BatchIngestResponse {
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        results,
    }))
}

/// GET /documents - Documents of the caller's tenant, in insertion order.
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DocumentListResponse>> {
    let tenant = tenant_id(&headers, &state.config.default_tenant)?;
    let documents = state.index.list(&tenant)?;

    Ok(Json(DocumentListResponse {
        tenant_id: tenant,
        document_count: documents.len(),
        documents,
    }))
}

/// DELETE /documents/:id - Remove one document of the caller's tenant.
///
/// Deleting an unknown id is not an error; `deleted` reports whether
/// anything was removed.
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>> {
    let tenant = tenant_id(&headers, &state.config.default_tenant)?;

    let id = document_id.clone();
    let deleted = tokio::task::spawn_blocking(move || {
        let deleted = state.index.delete(&tenant, &id)?;
        if deleted {
            state.persist()?;
        }
        Ok::<_, AppError>(deleted)
    })
    .await
    .map_err(|e| AppError::BackendError(format!("Delete task failed: {}", e)))??;

    Ok(Json(DeleteResponse {
        document_id,
        deleted,
    }))
}
