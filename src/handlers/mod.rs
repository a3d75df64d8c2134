pub mod documents;
pub mod health;
pub mod tools;

pub use documents::{
    delete_document_handler, ingest_batch_handler, ingest_handler, list_documents_handler,
};
pub use health::{health_handler, ready_handler};
pub use tools::{call_tool_handler, list_tools_handler};

use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderMap,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// Header naming the tenant a request acts for.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant from the `x-tenant-id` header, or `default` when absent.
///
/// A present but blank header is passed through and rejected downstream.
pub fn tenant_id(headers: &HeaderMap, default: &str) -> Result<String> {
    match headers.get(TENANT_HEADER) {
        Some(value) => value
            .to_str()
            .map(|v| v.trim().to_string())
            .map_err(|_| {
                AppError::ValidationError(format!("{} must be valid ASCII", TENANT_HEADER))
            }),
        None => Ok(default.to_string()),
    }
}

/// Application routes without the metrics endpoint and tracing middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        // Tool surface
        .route("/tools", get(list_tools_handler))
        .route("/tools/:name", post(call_tool_handler))
        // Administration - ingestion needs a larger body limit for whole documents
        .route(
            "/documents",
            get(list_documents_handler)
                .post(ingest_handler)
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .route(
            "/documents/batch",
            post(ingest_batch_handler).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .route("/documents/:id", delete(delete_document_handler))
        // Health endpoints
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_tenant_header_overrides_default() {
        let mut headers = HeaderMap::new();
        assert_eq!(tenant_id(&headers, "default").unwrap(), "default");

        headers.insert(TENANT_HEADER, HeaderValue::from_static(" acme "));
        assert_eq!(tenant_id(&headers, "default").unwrap(), "acme");
    }

    #[test]
    fn test_blank_tenant_header_is_kept_blank() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static(""));
        assert_eq!(tenant_id(&headers, "default").unwrap(), "");
    }
}
