//! In-memory, tenant-partitioned index.
//!
//! Documents are kept per tenant in insertion order together with their
//! summary and chunk embeddings. Searches are brute-force cosine similarity
//! over the tenant's rows followed by a stable sort, so equal scores keep
//! insertion order.

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{AppError, Result};
use crate::index::types::{
    Chunk, ChunkHit, Document, DocumentHeader, DocumentScope, DocumentSummary, HeaderHit, Locator,
};
use crate::index::DocumentBackend;
use ndarray::{Array1, Array2};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A document plus the vectors it is searched by.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub document: Document,
    pub summary_embedding: Array1<f32>,
    /// One row per chunk, aligned with `document.chunks`.
    pub chunk_embeddings: Array2<f32>,
}

pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    tenants: RwLock<HashMap<String, Vec<StoredDocument>>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<StoredDocument>>>> {
        self.tenants
            .read()
            .map_err(|_| AppError::BackendError("Index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<StoredDocument>>>> {
        self.tenants
            .write()
            .map_err(|_| AppError::BackendError("Index lock poisoned".to_string()))
    }

    /// Compute the summary and chunk embeddings for a document.
    pub fn embed_document(&self, document: Document) -> Result<StoredDocument> {
        let summary_embedding = self.embedder.embed(&document.summary)?;
        let texts: Vec<String> = document.chunks.iter().map(|c| c.content.clone()).collect();
        let chunk_embeddings = if texts.is_empty() {
            Array2::zeros((0, self.embedder.dim()))
        } else {
            self.embedder.embed_batch(&texts)?
        };

        Ok(StoredDocument {
            document,
            summary_embedding,
            chunk_embeddings,
        })
    }

    /// Store a document, replacing any earlier document of the same tenant
    /// with the same id or the same name. Returns the replaced ids.
    pub fn insert(&self, stored: StoredDocument) -> Result<Vec<String>> {
        if stored.chunk_embeddings.nrows() != stored.document.chunks.len() {
            return Err(AppError::BackendError(format!(
                "Document {} has {} chunks but {} embeddings",
                stored.document.document_id,
                stored.document.chunks.len(),
                stored.chunk_embeddings.nrows()
            )));
        }

        let mut tenants = self.write()?;
        let docs = tenants
            .entry(stored.document.tenant_id.clone())
            .or_default();

        let mut replaced = Vec::new();
        docs.retain(|existing| {
            let same = existing.document.document_id == stored.document.document_id
                || existing.document.name == stored.document.name;
            if same {
                replaced.push(existing.document.document_id.clone());
            }
            !same
        });

        tracing::debug!(
            tenant_id = %stored.document.tenant_id,
            document_id = %stored.document.document_id,
            chunks = stored.document.chunks.len(),
            replaced = replaced.len(),
            "Document stored"
        );

        docs.push(stored);
        Ok(replaced)
    }

    pub fn delete(&self, tenant_id: &str, document_id: &str) -> Result<bool> {
        let mut tenants = self.write()?;
        let Some(docs) = tenants.get_mut(tenant_id) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.document.document_id != document_id);
        let deleted = docs.len() != before;
        if docs.is_empty() {
            tenants.remove(tenant_id);
        }
        Ok(deleted)
    }

    pub fn list(&self, tenant_id: &str) -> Result<Vec<DocumentSummary>> {
        let tenants = self.read()?;
        Ok(tenants
            .get(tenant_id)
            .map(|docs| {
                docs.iter()
                    .map(|d| DocumentSummary {
                        header: DocumentHeader::from(&d.document),
                        document_type: d.document.document_type.clone(),
                        chunk_count: d.document.chunks.len(),
                        page_count: d
                            .document
                            .chunks
                            .iter()
                            .filter_map(|c| c.page_number)
                            .collect::<BTreeSet<_>>()
                            .len(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Clone every stored document, tenants in name order.
    pub fn export(&self) -> Result<Vec<StoredDocument>> {
        let tenants = self.read()?;
        let mut names: Vec<&String> = tenants.keys().collect();
        names.sort();
        Ok(names
            .into_iter()
            .flat_map(|t| tenants[t].iter().cloned())
            .collect())
    }

    pub fn document_count(&self) -> usize {
        self.read()
            .map(|t| t.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl DocumentBackend for InMemoryIndex {
    fn search_headers(&self, tenant_id: &str, query: &str, k: usize) -> Result<Vec<HeaderHit>> {
        let query_embedding = self.embedder.embed(query)?;
        let tenants = self.read()?;
        let Some(docs) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<HeaderHit> = docs
            .iter()
            .map(|d| HeaderHit {
                header: DocumentHeader::from(&d.document),
                score: if d.summary_embedding.len() == query_embedding.len() {
                    query_embedding.dot(&d.summary_embedding)
                } else {
                    0.0
                },
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn search_chunks(
        &self,
        tenant_id: &str,
        query: &str,
        k: usize,
        scope: &DocumentScope,
    ) -> Result<Vec<ChunkHit>> {
        let query_embedding = self.embedder.embed(query)?;
        let tenants = self.read()?;
        let Some(docs) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(usize, usize, f32)> = Vec::new();
        for (doc_idx, stored) in docs.iter().enumerate() {
            if !scope.admits(&stored.document) {
                continue;
            }
            let sims = cosine_similarity(&query_embedding, &stored.chunk_embeddings);
            scored.extend(
                sims.into_iter()
                    .enumerate()
                    .map(|(chunk_idx, score)| (doc_idx, chunk_idx, score)),
            );
        }

        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(doc_idx, chunk_idx, score)| {
                let document = &docs[doc_idx].document;
                let mut chunk = document.chunks[chunk_idx].clone();
                chunk.metadata.insert("score".to_string(), json!(score));
                ChunkHit {
                    document_id: document.document_id.clone(),
                    chunk,
                    score,
                }
            })
            .collect())
    }

    fn fetch_segment(
        &self,
        tenant_id: &str,
        document_id: &str,
        locator: Locator,
    ) -> Result<Vec<Chunk>> {
        let tenants = self.read()?;
        let Some(stored) = tenants
            .get(tenant_id)
            .and_then(|docs| docs.iter().find(|d| d.document.document_id == document_id))
        else {
            return Ok(Vec::new());
        };

        let mut chunks: Vec<Chunk> = stored
            .document
            .chunks
            .iter()
            .filter(|c| locator.matches(c))
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }
}
