//! Turns ingest requests into stored, embedded documents.

use crate::embedding::hashing::tokenize;
use crate::error::{AppError, Result};
use crate::index::{Chunk, Document, InMemoryIndex};
use crate::ingestion::chunker::RecursiveChunker;
use crate::ingestion::types::{IngestReport, IngestRequest, SeedDocument};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Maximum length of a generated summary before truncation
const MAX_SUMMARY_LENGTH: usize = 400;

/// Maximum length of an enriched per-chunk summary
const MAX_CHUNK_SUMMARY_LENGTH: usize = 200;

const MAX_KEYWORDS: usize = 5;

pub struct Ingestor {
    index: Arc<InMemoryIndex>,
    chunker: RecursiveChunker,
    enrich_metadata: bool,
}

impl Ingestor {
    pub fn new(index: Arc<InMemoryIndex>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            index,
            chunker: RecursiveChunker::new(chunk_size, chunk_overlap),
            enrich_metadata: false,
        }
    }

    /// Add an extractive `summary` and top `keywords` to every chunk's metadata.
    pub fn with_metadata_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_metadata = enabled;
        self
    }

    /// Chunk, embed and store a document. Blocking; call from the blocking pool.
    pub fn ingest(&self, tenant_id: &str, request: IngestRequest) -> Result<IngestReport> {
        let start = std::time::Instant::now();

        let pages = request.pages().len();
        let document = self.build_document(tenant_id, request)?;
        let document_id = document.document_id.clone();
        let document_name = document.name.clone();
        let chunks_created = document.chunks.len();

        let stored = self.index.embed_document(document)?;
        let replaced = self.index.insert(stored)?;

        let elapsed = start.elapsed();
        tracing::info!(
            tenant_id,
            document_id = %document_id,
            document_name = %document_name,
            chunks_created,
            replaced = replaced.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Document ingested"
        );
        metrics::counter!("documents_ingested_total").increment(1);
        metrics::histogram!("ingest_chunks").record(chunks_created as f64);

        Ok(IngestReport {
            success: true,
            document_id,
            document_name,
            tenant_id: tenant_id.to_string(),
            chunks_created,
            pages,
            replaced,
            processing_time_seconds: elapsed.as_secs_f64(),
            error: None,
        })
    }

    /// Ingest several documents for one tenant. Every request gets a report;
    /// a failed one carries `success: false` and its error instead of
    /// aborting the rest. Blocking.
    pub fn ingest_batch(&self, tenant_id: &str, requests: Vec<IngestRequest>) -> Vec<IngestReport> {
        let total = requests.len();
        let reports: Vec<IngestReport> = requests
            .into_iter()
            .map(|request| {
                let start = std::time::Instant::now();
                let document_name = request.name.clone();
                let document_id = request.document_id.clone().unwrap_or_default();
                self.ingest(tenant_id, request).unwrap_or_else(|e| {
                    tracing::warn!(
                        tenant_id,
                        document_name = %document_name,
                        error = %e,
                        "Batch entry failed"
                    );
                    metrics::counter!("documents_ingest_failed_total").increment(1);
                    IngestReport {
                        success: false,
                        document_id,
                        document_name,
                        tenant_id: tenant_id.to_string(),
                        chunks_created: 0,
                        pages: 0,
                        replaced: Vec::new(),
                        processing_time_seconds: start.elapsed().as_secs_f64(),
                        error: Some(e.message().to_string()),
                    }
                })
            })
            .collect();

        tracing::info!(
            tenant_id,
            total,
            succeeded = reports.iter().filter(|r| r.success).count(),
            "Batch ingestion completed"
        );
        reports
    }

    /// Validate a request and cut it into a [`Document`] without embedding it.
    pub fn build_document(&self, tenant_id: &str, request: IngestRequest) -> Result<Document> {
        if tenant_id.trim().is_empty() {
            return Err(AppError::ValidationError(
                "tenant_id cannot be empty".to_string(),
            ));
        }
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::ValidationError(
                "Document name cannot be empty".to_string(),
            ));
        }

        let pages = request.pages();
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(AppError::ValidationError(format!(
                "Document '{}' has no text content",
                name
            )));
        }

        let document_id = match request.document_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| title_from_name(&name));
        let document_type = infer_document_type(&name).to_string();
        let summary = request
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| extractive_summary(&pages));

        let mut document_metadata = request.metadata.clone();
        document_metadata.insert("document_type".to_string(), json!(document_type));
        document_metadata.insert("source_filename".to_string(), json!(name));

        let chunks = self
            .chunker
            .chunk_pages(&pages)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let chunk_index = i as u32;
                let mut metadata = request.metadata.clone();
                if self.enrich_metadata {
                    metadata.insert(
                        "summary".to_string(),
                        json!(leading_sentences(&piece.text, MAX_CHUNK_SUMMARY_LENGTH)),
                    );
                    metadata.insert(
                        "keywords".to_string(),
                        json!(top_keywords(&piece.text, MAX_KEYWORDS)),
                    );
                }
                metadata.insert("document_id".to_string(), json!(document_id));
                metadata.insert("document_name".to_string(), json!(name));
                metadata.insert("title".to_string(), json!(title));
                metadata.insert("tenant_id".to_string(), json!(tenant_id));
                metadata.insert("document_type".to_string(), json!(document_type));
                metadata.insert("chunk_index".to_string(), json!(chunk_index));
                metadata.insert("page_number".to_string(), json!(piece.page_number));
                Chunk {
                    chunk_index,
                    page_number: Some(piece.page_number),
                    content: piece.text,
                    metadata,
                }
            })
            .collect();

        Ok(Document {
            document_id,
            tenant_id: tenant_id.to_string(),
            title,
            name,
            summary,
            document_type,
            metadata: document_metadata,
            chunks,
        })
    }

    /// Ingest every entry of a JSON seed file. Entries without a tenant go to
    /// `default_tenant`. Malformed entries are logged and skipped.
    pub fn ingest_seed_file(&self, path: &Path, default_tenant: &str) -> Result<Vec<IngestReport>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::ValidationError(format!("Failed to read seed file: {}", e))
        })?;
        let entries: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
            AppError::ValidationError(format!("Seed file must be a JSON array: {}", e))
        })?;

        let mut reports = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.into_iter().enumerate() {
            let seed: SeedDocument = match serde_json::from_value(entry) {
                Ok(seed) => seed,
                Err(e) => {
                    tracing::warn!(index = idx, error = %e, "Skipping malformed seed entry");
                    continue;
                }
            };
            let tenant = seed.tenant_id.as_deref().unwrap_or(default_tenant);
            match self.ingest(tenant, seed.request) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(index = idx, error = %e, "Skipping seed entry"),
            }
        }

        tracing::info!(
            path = %path.display(),
            ingested = reports.len(),
            "Seed documents loaded"
        );
        Ok(reports)
    }
}

/// Document type from the file extension.
pub fn infer_document_type(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("pdf") => "pdf_document",
        Some("txt") => "text_document",
        Some("md") | Some("markdown") => "markdown_document",
        Some("docx") | Some("doc") => "word_document",
        _ => "unknown",
    }
}

fn title_from_name(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(name)
        .replace(['_', '-'], " ")
}

/// Leading sentences of the first non-blank page, up to MAX_SUMMARY_LENGTH
/// characters.
fn extractive_summary(pages: &[String]) -> String {
    match pages.iter().find(|p| !p.trim().is_empty()) {
        Some(page) => leading_sentences(page, MAX_SUMMARY_LENGTH),
        None => String::new(),
    }
}

/// Whole leading sentences that fit in `max` characters, whitespace
/// collapsed. Falls back to a truncated prefix when the first sentence is
/// already too long.
fn leading_sentences(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut summary = String::new();
    for sentence in flat.split_inclusive(['.', '!', '?']) {
        if summary.chars().count() + sentence.chars().count() > max {
            break;
        }
        summary.push_str(sentence);
    }

    if summary.trim().is_empty() {
        truncate_summary(&flat, max)
    } else {
        summary.trim().to_string()
    }
}

/// Truncate to `max` characters with an ellipsis, at a word boundary when
/// one is close.
fn truncate_summary(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(max)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let truncated = &text[..cut];

    match truncated.rfind(' ') {
        Some(pos) if truncated[..pos].chars().count() > max.saturating_sub(50) => {
            format!("{}...", &truncated[..pos])
        }
        _ => format!("{}...", truncated),
    }
}

/// Most frequent non-stopword tokens of at least three characters. Ties keep
/// first-occurrence order.
fn top_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, token) in tokenize(text).enumerate() {
        if token.chars().count() < 3 || token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(limit).map(|(token, _, _)| token).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn ingestor() -> Ingestor {
        let index = Arc::new(InMemoryIndex::new(Arc::new(HashingEmbedder::new(64))));
        Ingestor::new(index, 200, 20)
    }

    fn request(name: &str, pages: &[&str]) -> IngestRequest {
        IngestRequest {
            name: name.to_string(),
            pages: pages.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_document_type_inference() {
        assert_eq!(infer_document_type("test.pdf"), "pdf_document");
        assert_eq!(infer_document_type("test.TXT"), "text_document");
        assert_eq!(infer_document_type("test.md"), "markdown_document");
        assert_eq!(infer_document_type("B.docx"), "word_document");
        assert_eq!(infer_document_type("test.unknown"), "unknown");
        assert_eq!(infer_document_type("noext"), "unknown");
    }

    #[test]
    fn test_build_document_stamps_chunk_metadata() {
        let mut req = request("fin_report.pdf", &["Revenue grew.", "Costs fell."]);
        req.metadata.insert("author".to_string(), json!("Finance Team"));
        req.metadata.insert("year".to_string(), json!(2024));

        let doc = ingestor().build_document("tenant-123", req).unwrap();

        assert_eq!(doc.title, "fin report");
        assert_eq!(doc.document_type, "pdf_document");
        assert_eq!(doc.chunks.len(), 2);
        for (i, chunk) in doc.chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.page_number, Some(i as u32 + 1));
            assert_eq!(chunk.metadata["tenant_id"], "tenant-123");
            assert_eq!(chunk.metadata["author"], "Finance Team");
            assert_eq!(chunk.metadata["year"], 2024);
            assert_eq!(chunk.metadata["document_id"], json!(doc.document_id));
        }
    }

    #[test]
    fn test_reserved_metadata_overrides_custom() {
        let mut req = request("a.txt", &["text"]);
        req.metadata.insert("tenant_id".to_string(), json!("spoofed"));
        let doc = ingestor().build_document("real", req).unwrap();
        assert_eq!(doc.chunks[0].metadata["tenant_id"], "real");
    }

    #[test]
    fn test_text_field_is_single_page() {
        let req = IngestRequest {
            name: "notes.txt".to_string(),
            text: Some("Plain text body.".to_string()),
            ..Default::default()
        };
        let doc = ingestor().build_document("t", req).unwrap();
        assert_eq!(doc.chunks.len(), 1);
        assert_eq!(doc.chunks[0].page_number, Some(1));
    }

    #[test]
    fn test_empty_content_is_rejected() {
        let err = ingestor()
            .build_document("t", request("empty.txt", &["  ", ""]))
            .unwrap_err();
        assert!(err.is_validation());

        let err = ingestor()
            .build_document("t", request("  ", &["body"]))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_supplied_id_and_summary_are_kept() {
        let mut req = request("a.txt", &["body"]);
        req.document_id = Some("doc-1".to_string());
        req.summary = Some("Given summary".to_string());
        let doc = ingestor().build_document("t", req).unwrap();
        assert_eq!(doc.document_id, "doc-1");
        assert_eq!(doc.summary, "Given summary");
    }

    #[test]
    fn test_extractive_summary_takes_leading_sentences() {
        let long_tail = "Filler sentence here. ".repeat(40);
        let page = format!("First point.  Second   point! {}", long_tail);
        let summary = extractive_summary(&[String::new(), page]);
        assert!(summary.starts_with("First point. Second point!"));
        assert!(summary.chars().count() <= MAX_SUMMARY_LENGTH);
    }

    #[test]
    fn test_truncate_summary_without_sentences() {
        let text = "word ".repeat(200);
        let summary = extractive_summary(&[text]);
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= MAX_SUMMARY_LENGTH + 3);
    }

    #[test]
    fn test_ingest_replaces_same_name() {
        let ingestor = ingestor();
        let first = ingestor.ingest("t", request("deck.pdf", &["v1"])).unwrap();
        let second = ingestor.ingest("t", request("deck.pdf", &["v2"])).unwrap();

        assert_eq!(second.replaced, vec![first.document_id]);
        assert_eq!(ingestor.index.document_count(), 1);
    }

    #[test]
    fn test_long_document_creates_multiple_chunks() {
        let content = (0..100)
            .map(|i| format!("This is sentence number {}.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let report = ingestor().ingest("t", request("long.txt", &[&content])).unwrap();
        assert!(report.success);
        assert!(report.chunks_created > 1);
        assert_eq!(report.pages, 1);
    }

    #[test]
    fn test_seed_file_skips_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "a.txt", "text": "Alpha body."},
                {"tenant_id": "other", "name": "b.txt", "pages": ["Beta body."]},
                {"text": "missing name"},
                {"name": "empty.txt", "pages": [" "]}
            ]"#,
        )
        .unwrap();

        let reports = ingestor().ingest_seed_file(&path, "default").unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].tenant_id, "default");
        assert_eq!(reports[1].tenant_id, "other");
    }

    #[test]
    fn test_trailing_blank_pages_are_counted() {
        let report = ingestor()
            .ingest("t", request("deck.pdf", &["Intro slide.", "Body slide.", "  ", ""]))
            .unwrap();
        assert_eq!(report.pages, 4);
        assert_eq!(report.chunks_created, 2);
    }

    #[test]
    fn test_batch_reports_every_document() {
        let ingestor = ingestor();
        let reports = ingestor.ingest_batch(
            "tenant-123",
            vec![
                request("q1.pdf", &["First quarter results."]),
                request("empty.txt", &["   "]),
                request("q2.pdf", &["Second quarter results."]),
            ],
        );

        assert_eq!(reports.len(), 3);
        assert!(reports[0].success);
        assert!(reports[2].success);
        assert!(!reports[1].success);
        assert_eq!(reports[1].document_name, "empty.txt");
        assert!(reports[1].error.as_deref().unwrap().contains("no text content"));
        assert!(reports.iter().all(|r| r.tenant_id == "tenant-123"));
        assert_eq!(ingestor.index.document_count(), 2);
    }

    #[test]
    fn test_chunk_metadata_enrichment() {
        let index = Arc::new(InMemoryIndex::new(Arc::new(HashingEmbedder::new(64))));
        let ingestor = Ingestor::new(index, 1000, 50).with_metadata_enrichment(true);
        let doc = ingestor
            .build_document(
                "t",
                request(
                    "report.pdf",
                    &["Retail revenue grew this year. Retail margins and revenue both improved."],
                ),
            )
            .unwrap();

        let metadata = &doc.chunks[0].metadata;
        assert_eq!(metadata["document_id"], json!(doc.document_id));
        assert_eq!(metadata["summary"], "Retail revenue grew this year. Retail margins and revenue both improved.");
        let keywords: Vec<&str> = metadata["keywords"]
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k.as_str().unwrap())
            .collect();
        assert_eq!(&keywords[..2], &["retail", "revenue"]);
        assert!(keywords.len() <= MAX_KEYWORDS);
    }

    #[test]
    fn test_metadata_enrichment_disabled_by_default() {
        let doc = ingestor()
            .build_document("t", request("report.pdf", &["Retail revenue grew."]))
            .unwrap();
        assert!(doc.chunks[0].metadata.get("summary").is_none());
        assert!(doc.chunks[0].metadata.get("keywords").is_none());
    }

    #[test]
    fn test_keywords_skip_stopwords_and_short_tokens() {
        let keywords = top_keywords("The cat and the dog. The dog ran to 2024 goals.", 3);
        assert_eq!(keywords, vec!["dog", "cat", "ran"]);
    }
}
