use crate::error::Result;
use crate::index::service::DEFAULT_CONTENT_K;
use crate::index::{DocumentIndexService, DocumentScope, Metadata};
use crate::tools::envelope::{parse_args, to_payload};
use crate::tools::{Tool, ToolContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ContentSearchArgs {
    query: String,
    #[serde(default)]
    k: Option<i64>,
    #[serde(default)]
    document_ids: Option<Vec<String>>,
    #[serde(default)]
    document_names: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct RankedChunk {
    rank: usize,
    content: String,
    metadata: Metadata,
    score: f32,
}

#[derive(Debug, Serialize)]
struct ContentSearchResponse {
    success: bool,
    query: String,
    count: usize,
    results: Vec<RankedChunk>,
}

/// Finds chunks matching the query, optionally limited to some documents.
pub struct SearchDocumentContentTool {
    service: Arc<DocumentIndexService>,
}

impl SearchDocumentContentTool {
    pub fn new(service: Arc<DocumentIndexService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for SearchDocumentContentTool {
    fn name(&self) -> &str {
        "search_document_content"
    }

    fn description(&self) -> &str {
        "Search the text of documents and return the best matching passages with their \
         similarity score and metadata. Optionally restrict the search to documents by id \
         or by file name; a document matching either list is searched."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to search for"
                },
                "k": {
                    "type": "integer",
                    "description": "Maximum number of passages to return",
                    "default": DEFAULT_CONTENT_K
                },
                "document_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Only search documents with these ids"
                },
                "document_names": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Only search documents with these file names"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let args: ContentSearchArgs = parse_args(args)?;
        let k = args.k.unwrap_or(DEFAULT_CONTENT_K);
        let scope = DocumentScope::new(
            args.document_ids.unwrap_or_default(),
            args.document_names.unwrap_or_default(),
        );

        let hits = self
            .service
            .search_content(&ctx.tenant_id, &args.query, k, scope)
            .await?;

        let results: Vec<RankedChunk> = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| RankedChunk {
                rank: i + 1,
                content: hit.chunk.content,
                metadata: hit.chunk.metadata,
                score: hit.score,
            })
            .collect();

        to_payload(&ContentSearchResponse {
            success: true,
            query: args.query,
            count: results.len(),
            results,
        })
    }
}
