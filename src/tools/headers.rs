use crate::error::Result;
use crate::index::service::DEFAULT_HEADER_K;
use crate::index::{DocumentHeader, DocumentIndexService};
use crate::tools::envelope::{parse_args, to_payload};
use crate::tools::{Tool, ToolContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct HeaderSearchArgs {
    query: String,
    #[serde(default)]
    k: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RankedDocument {
    rank: usize,
    document: DocumentHeader,
    score: f32,
}

#[derive(Debug, Serialize)]
struct HeaderSearchResponse {
    success: bool,
    query: String,
    document_count: usize,
    results: Vec<RankedDocument>,
}

/// Finds documents whose summary matches the query.
pub struct SearchDocumentHeadersTool {
    service: Arc<DocumentIndexService>,
}

impl SearchDocumentHeadersTool {
    pub fn new(service: Arc<DocumentIndexService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for SearchDocumentHeadersTool {
    fn name(&self) -> &str {
        "search_document_headers"
    }

    fn description(&self) -> &str {
        "Search document summaries to discover which documents are relevant to a question. \
         Returns document ids, titles and summaries, never document content. Use the ids \
         with search_document_content or get_document_segment."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What the documents should be about"
                },
                "k": {
                    "type": "integer",
                    "description": "Maximum number of documents to return",
                    "default": DEFAULT_HEADER_K
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let args: HeaderSearchArgs = parse_args(args)?;
        let k = args.k.unwrap_or(DEFAULT_HEADER_K);

        let hits = self
            .service
            .search_headers(&ctx.tenant_id, &args.query, k)
            .await?;

        let results: Vec<RankedDocument> = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| RankedDocument {
                rank: i + 1,
                document: hit.header,
                score: hit.score,
            })
            .collect();

        to_payload(&HeaderSearchResponse {
            success: true,
            query: args.query,
            document_count: results.len(),
            results,
        })
    }
}
