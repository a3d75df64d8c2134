use crate::error::Result;
use crate::index::{DocumentIndexService, Locator, Metadata};
use crate::tools::envelope::{parse_args, to_payload};
use crate::tools::{Tool, ToolContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct SegmentArgs {
    document_id: String,
    #[serde(default)]
    chunk_index: Option<i64>,
    #[serde(default)]
    page_number: Option<i64>,
}

#[derive(Debug, Serialize)]
struct Segment {
    index: u32,
    content: String,
    metadata: Metadata,
}

#[derive(Debug, Serialize)]
struct SegmentResponse {
    success: bool,
    document_id: String,
    chunk_index: Option<u32>,
    page_number: Option<u32>,
    segment_count: usize,
    segments: Vec<Segment>,
}

/// Reads one chunk, or every chunk of one page, of a known document.
pub struct GetDocumentSegmentTool {
    service: Arc<DocumentIndexService>,
}

impl GetDocumentSegmentTool {
    pub fn new(service: Arc<DocumentIndexService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetDocumentSegmentTool {
    fn name(&self) -> &str {
        "get_document_segment"
    }

    fn description(&self) -> &str {
        "Read part of a document by id. Give exactly one of chunk_index (zero-based) to \
         read a single chunk, or page_number (one-based) to read every chunk on that page."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "document_id": {
                    "type": "string",
                    "description": "Id returned by a search tool"
                },
                "chunk_index": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Zero-based chunk index"
                },
                "page_number": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "One-based page number"
                }
            },
            "required": ["document_id"]
        })
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let args: SegmentArgs = parse_args(args)?;
        let locator = Locator::from_parts(args.chunk_index, args.page_number)?;

        let chunks = self
            .service
            .get_segment(&ctx.tenant_id, &args.document_id, locator)
            .await?;

        let segments: Vec<Segment> = chunks
            .into_iter()
            .map(|chunk| Segment {
                index: chunk.chunk_index,
                content: chunk.content,
                metadata: chunk.metadata,
            })
            .collect();

        to_payload(&SegmentResponse {
            success: true,
            document_id: args.document_id,
            chunk_index: locator.chunk_index(),
            page_number: locator.page_number(),
            segment_count: segments.len(),
            segments,
        })
    }
}
