//! Documents, chunks and the request/result shapes of the index.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub type Metadata = Map<String, Value>;

/// One contiguous span of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based, unique within the owning document.
    pub chunk_index: u32,
    /// One-based page the chunk was cut from, if the source had pages.
    pub page_number: Option<u32>,
    pub content: String,
    pub metadata: Metadata,
}

/// An ingested document, scoped to one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub tenant_id: String,
    pub title: String,
    /// Source file name, e.g. `B.docx`. Matched by `document_names` scoping.
    pub name: String,
    pub summary: String,
    pub document_type: String,
    pub metadata: Metadata,
    /// Ordered by `chunk_index`.
    pub chunks: Vec<Chunk>,
}

/// Header-level view of a document. Never carries chunk content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub document_id: String,
    pub title: String,
    pub name: String,
    pub summary: String,
}

impl From<&Document> for DocumentHeader {
    fn from(doc: &Document) -> Self {
        Self {
            document_id: doc.document_id.clone(),
            title: doc.title.clone(),
            name: doc.name.clone(),
            summary: doc.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderHit {
    pub header: DocumentHeader,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHit {
    pub document_id: String,
    pub chunk: Chunk,
    pub score: f32,
}

/// Document listing entry for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    #[serde(flatten)]
    pub header: DocumentHeader,
    pub document_type: String,
    pub chunk_count: usize,
    pub page_count: usize,
}

/// Address of a segment inside a document.
///
/// Built only by validation, so a request naming both or neither
/// locator cannot reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Zero-based chunk index.
    ChunkIndex(u32),
    /// One-based page number.
    PageNumber(u32),
}

impl Locator {
    /// Validate raw request fields into a locator.
    ///
    /// Exactly one of the two must be present. `chunk_index` is zero-based and
    /// `page_number` one-based; out-of-range values are rejected here too.
    pub fn from_parts(chunk_index: Option<i64>, page_number: Option<i64>) -> Result<Self> {
        match (chunk_index, page_number) {
            (Some(_), Some(_)) | (None, None) => Err(AppError::ValidationError(
                "Exactly one of chunk_index or page_number must be provided".to_string(),
            )),
            (Some(index), None) => u32::try_from(index)
                .map(Locator::ChunkIndex)
                .map_err(|_| {
                    AppError::ValidationError(format!(
                        "chunk_index must be a non-negative integer, got {}",
                        index
                    ))
                }),
            (None, Some(page)) => match u32::try_from(page) {
                Ok(p) if p >= 1 => Ok(Locator::PageNumber(p)),
                _ => Err(AppError::ValidationError(format!(
                    "page_number must be 1 or greater, got {}",
                    page
                ))),
            },
        }
    }

    pub fn chunk_index(&self) -> Option<u32> {
        match self {
            Locator::ChunkIndex(i) => Some(*i),
            Locator::PageNumber(_) => None,
        }
    }

    pub fn page_number(&self) -> Option<u32> {
        match self {
            Locator::PageNumber(p) => Some(*p),
            Locator::ChunkIndex(_) => None,
        }
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Locator::ChunkIndex(i) => chunk.chunk_index == *i,
            Locator::PageNumber(p) => chunk.page_number == Some(*p),
        }
    }
}

/// Allowlist for content search.
///
/// A document qualifies when its id is in `document_ids` OR its name is in
/// `document_names`. With both sets empty every document qualifies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentScope {
    pub document_ids: HashSet<String>,
    pub document_names: HashSet<String>,
}

impl DocumentScope {
    pub fn new(
        document_ids: impl IntoIterator<Item = String>,
        document_names: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            document_ids: document_ids.into_iter().collect(),
            document_names: document_names.into_iter().collect(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.document_ids.is_empty() && self.document_names.is_empty()
    }

    pub fn admits(&self, document: &Document) -> bool {
        self.is_unrestricted()
            || self.document_ids.contains(&document.document_id)
            || self.document_names.contains(&document.name)
    }
}
