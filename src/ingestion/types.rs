//! Request and report shapes for document ingestion.

use crate::index::Metadata;
use serde::{Deserialize, Serialize};

/// A document to ingest.
///
/// Either `pages` or `text` carries the content; `text` is treated as a
/// single page. When both are given, `pages` wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Source file name, e.g. `factbook.pdf`.
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Precomputed summary. An extractive one is generated when absent.
    #[serde(default)]
    pub summary: Option<String>,
    /// Caller-chosen id. A random UUID is assigned when absent.
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Custom metadata copied onto the document and every chunk.
    #[serde(default)]
    pub metadata: Metadata,
}

impl IngestRequest {
    pub fn pages(&self) -> Vec<String> {
        if !self.pages.is_empty() {
            self.pages.clone()
        } else {
            self.text.iter().cloned().collect()
        }
    }
}

/// One entry of a seed file: an ingest request plus an optional tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(flatten)]
    pub request: IngestRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub document_id: String,
    pub document_name: String,
    pub tenant_id: String,
    pub chunks_created: usize,
    pub pages: usize,
    /// Ids of earlier documents with the same name that this one replaced.
    pub replaced: Vec<String>,
    pub processing_time_seconds: f64,
    /// Set when a batch entry failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
