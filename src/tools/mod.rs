//! Tool adapter layer.
//!
//! Exposes the document index as callable tools with a declared input schema.
//! Each call is independent: tools hold only a handle to the service and keep
//! no state between invocations.

pub mod content;
pub mod envelope;
pub mod headers;
pub mod segment;

pub use content::SearchDocumentContentTool;
pub use envelope::{parse_args, ToolEnvelope};
pub use headers::SearchDocumentHeadersTool;
pub use segment::GetDocumentSegmentTool;

use crate::error::{AppError, Result};
use crate::index::DocumentIndexService;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-call context supplied by the caller.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub tenant_id: String,
}

impl ToolContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn input_schema(&self) -> Value;

    /// Run the tool. Errors become failure envelopes in [`ToolRegistry::invoke`].
    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value>;
}

/// MCP-style tool listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three document tools bound to `service`.
    pub fn with_document_tools(service: Arc<DocumentIndexService>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SearchDocumentHeadersTool::new(Arc::clone(&service))));
        registry.register(Arc::new(SearchDocumentContentTool::new(Arc::clone(&service))));
        registry.register(Arc::new(GetDocumentSegmentTool::new(service)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Call a tool by name. Never fails: every error, including an unknown
    /// tool name, comes back as a failure envelope.
    pub async fn invoke(&self, name: &str, ctx: &ToolContext, args: Value) -> ToolEnvelope {
        let Some(tool) = self.get(name) else {
            return ToolEnvelope::failure(&AppError::ValidationError(format!(
                "Unknown tool: {}",
                name
            )));
        };

        let start = std::time::Instant::now();
        let result = tool.call(ctx, args).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) if e.is_validation() => "validation_error",
            Err(_) => "backend_error",
        };
        match &result {
            Ok(_) => tracing::info!(
                tool = name,
                tenant_id = %ctx.tenant_id,
                elapsed_ms,
                "Tool call completed"
            ),
            Err(e) if e.is_validation() => tracing::warn!(
                tool = name,
                tenant_id = %ctx.tenant_id,
                error = %e,
                "Tool call rejected"
            ),
            Err(e) => tracing::error!(
                tool = name,
                tenant_id = %ctx.tenant_id,
                error = %e,
                "Tool call failed"
            ),
        }

        metrics::counter!("tool_calls_total", "tool" => name.to_string(), "outcome" => outcome)
            .increment(1);
        metrics::histogram!("tool_call_latency_ms", "tool" => name.to_string())
            .record(elapsed_ms as f64);

        ToolEnvelope::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::index::{
        Chunk, ChunkHit, Document, DocumentBackend, DocumentScope, HeaderHit, InMemoryIndex,
        Locator, Metadata,
    };
    use crate::ingestion::{IngestRequest, Ingestor};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        index: Arc<InMemoryIndex>,
        ingestor: Ingestor,
        registry: ToolRegistry,
    }

    fn fixture() -> Fixture {
        let index = Arc::new(InMemoryIndex::new(Arc::new(HashingEmbedder::new(512))));
        let service = Arc::new(DocumentIndexService::new(index.clone()));
        Fixture {
            ingestor: Ingestor::new(Arc::clone(&index), 1000, 50),
            registry: ToolRegistry::with_document_tools(service),
            index,
        }
    }

    fn ingest(f: &Fixture, id: &str, name: &str, summary: &str, pages: &[&str]) {
        f.ingestor
            .ingest(
                "t",
                IngestRequest {
                    name: name.to_string(),
                    document_id: Some(id.to_string()),
                    summary: Some(summary.to_string()),
                    pages: pages.iter().map(|p| p.to_string()).collect(),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    fn ctx() -> ToolContext {
        ToolContext::new("t")
    }

    /// Backend that counts calls and always fails.
    #[derive(Default)]
    struct FailingBackend {
        calls: AtomicUsize,
    }

    impl FailingBackend {
        fn fail<T>(&self) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::BackendError("index unavailable".to_string()))
        }
    }

    impl DocumentBackend for FailingBackend {
        fn search_headers(&self, _: &str, _: &str, _: usize) -> Result<Vec<HeaderHit>> {
            self.fail()
        }

        fn search_chunks(
            &self,
            _: &str,
            _: &str,
            _: usize,
            _: &DocumentScope,
        ) -> Result<Vec<ChunkHit>> {
            self.fail()
        }

        fn fetch_segment(&self, _: &str, _: &str, _: Locator) -> Result<Vec<Chunk>> {
            self.fail()
        }
    }

    fn failing_registry() -> (Arc<FailingBackend>, ToolRegistry) {
        let backend = Arc::new(FailingBackend::default());
        let service = Arc::new(DocumentIndexService::new(backend.clone()));
        (backend, ToolRegistry::with_document_tools(service))
    }

    #[test]
    fn test_definitions_list_all_tools() {
        let f = fixture();
        let defs = f.registry.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "get_document_segment",
                "search_document_content",
                "search_document_headers"
            ]
        );

        let listed = serde_json::to_value(&defs[0]).unwrap();
        assert_eq!(listed["inputSchema"]["required"], json!(["document_id"]));
    }

    #[tokio::test]
    async fn test_header_search_ranks_relevant_document_first() {
        let f = fixture();
        ingest(&f, "policy", "policy.pdf", "Bank expense policy for travel and meals", &["Expenses above 50 EUR need a receipt."]);
        ingest(&f, "revenue", "revenue.pdf", "Quarterly revenue report of the retail segment", &["Revenue grew by four percent."]);
        ingest(&f, "onboarding", "onboarding.md", "Engineering onboarding guide and laptop setup", &["Install the toolchain first."]);

        let env = f
            .registry
            .invoke("search_document_headers", &ctx(), json!({"query": "bank expense policy", "k": 2}))
            .await
            .into_value();

        assert_eq!(env["success"], true);
        let results = env["results"].as_array().unwrap();
        assert!(results.len() <= 2);
        assert_eq!(env["document_count"], results.len());
        assert_eq!(results[0]["rank"], 1);
        assert_eq!(results[0]["document"]["document_id"], "policy");
        assert!(results[0]["document"].get("content").is_none());
    }

    #[tokio::test]
    async fn test_content_scope_is_union_of_ids_and_names() {
        let f = fixture();
        ingest(&f, "A", "a.pdf", "Contract A", &["The termination clause of contract A requires notice."]);
        ingest(&f, "B", "B.docx", "Contract B", &["Contract B has a termination clause with penalties."]);
        ingest(&f, "C", "c.txt", "Contract C", &["Contract C also has a termination clause."]);

        let env = f
            .registry
            .invoke(
                "search_document_content",
                &ctx(),
                json!({
                    "query": "termination clause",
                    "k": 10,
                    "document_ids": ["A"],
                    "document_names": ["B.docx"]
                }),
            )
            .await
            .into_value();

        assert_eq!(env["success"], true);
        let owners: Vec<&str> = env["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["metadata"]["document_id"].as_str().unwrap())
            .collect();
        assert!(owners.contains(&"A"));
        assert!(owners.contains(&"B"));
        assert!(!owners.contains(&"C"));
        assert_eq!(env["count"], owners.len());
    }

    #[tokio::test]
    async fn test_content_results_carry_rank_and_score() {
        let f = fixture();
        ingest(&f, "A", "a.pdf", "Contract A", &["The termination clause of contract A requires notice."]);

        let env = f
            .registry
            .invoke("search_document_content", &ctx(), json!({"query": "termination notice"}))
            .await
            .into_value();

        let first = &env["results"][0];
        assert_eq!(first["rank"], 1);
        assert!(first["score"].as_f64().unwrap() > 0.0);
        assert_eq!(first["metadata"]["document_name"], "a.pdf");
        assert!(first["metadata"].get("score").is_some());
    }

    #[tokio::test]
    async fn test_scope_matching_nothing_is_empty_success() {
        let f = fixture();
        ingest(&f, "A", "a.pdf", "Contract A", &["termination clause"]);

        let env = f
            .registry
            .invoke(
                "search_document_content",
                &ctx(),
                json!({"query": "termination", "document_ids": ["missing"]}),
            )
            .await
            .into_value();

        assert_eq!(env["success"], true);
        assert_eq!(env["count"], 0);
        assert_eq!(env["results"], json!([]));
    }

    #[tokio::test]
    async fn test_non_positive_k_returns_empty_without_backend_call() {
        let (backend, registry) = failing_registry();

        for k in [0, -1] {
            let env = registry
                .invoke("search_document_headers", &ctx(), json!({"query": "policy", "k": k}))
                .await
                .into_value();
            assert_eq!(env["success"], true);
            assert_eq!(env["results"], json!([]));

            let env = registry
                .invoke("search_document_content", &ctx(), json!({"query": "policy", "k": k}))
                .await
                .into_value();
            assert_eq!(env["success"], true);
            assert_eq!(env["count"], 0);
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_failure_envelope() {
        let (backend, registry) = failing_registry();

        let env = registry
            .invoke("search_document_headers", &ctx(), json!({"query": "policy"}))
            .await;
        assert!(env.is_error());
        assert_eq!(
            env.into_value(),
            json!({"success": false, "error": "index unavailable", "isError": true})
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_segment_locator_validation_precedes_backend() {
        let (backend, registry) = failing_registry();

        for args in [
            json!({"document_id": "X"}),
            json!({"document_id": "X", "chunk_index": 0, "page_number": 1}),
            json!({"document_id": "X", "chunk_index": -1}),
            json!({"document_id": "X", "page_number": 0}),
        ] {
            let env = registry
                .invoke("get_document_segment", &ctx(), args)
                .await
                .into_value();
            assert_eq!(env["success"], false);
            assert_eq!(env["isError"], true);
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_segment_of_empty_document_is_empty_success() {
        let f = fixture();
        let empty = Document {
            document_id: "X".to_string(),
            tenant_id: "t".to_string(),
            title: "Empty".to_string(),
            name: "empty.txt".to_string(),
            summary: String::new(),
            document_type: "text_document".to_string(),
            metadata: Metadata::new(),
            chunks: Vec::new(),
        };
        f.index.insert(f.index.embed_document(empty).unwrap()).unwrap();

        let env = f
            .registry
            .invoke("get_document_segment", &ctx(), json!({"document_id": "X", "chunk_index": 0}))
            .await
            .into_value();
        assert_eq!(env["success"], true);
        assert_eq!(env["segment_count"], 0);
        assert_eq!(env["segments"], json!([]));

        let env = f
            .registry
            .invoke("get_document_segment", &ctx(), json!({"document_id": "nope", "page_number": 1}))
            .await
            .into_value();
        assert_eq!(env["success"], true);
        assert_eq!(env["segment_count"], 0);
    }

    #[tokio::test]
    async fn test_segment_by_page_and_by_chunk() {
        let f = fixture();
        ingest(&f, "D", "d.pdf", "Two pages", &["First page text.", "Second page text."]);

        let env = f
            .registry
            .invoke("get_document_segment", &ctx(), json!({"document_id": "D", "page_number": 2, "chunk_index": null}))
            .await
            .into_value();
        assert_eq!(env["success"], true);
        assert_eq!(env["page_number"], 2);
        assert_eq!(env["chunk_index"], Value::Null);
        assert_eq!(env["segment_count"], 1);
        assert_eq!(env["segments"][0]["index"], 1);
        assert_eq!(env["segments"][0]["content"], "Second page text.");

        let env = f
            .registry
            .invoke("get_document_segment", &ctx(), json!({"document_id": "D", "chunk_index": 0}))
            .await
            .into_value();
        assert_eq!(env["segments"][0]["metadata"]["page_number"], 1);
    }

    #[tokio::test]
    async fn test_repeated_search_is_identical() {
        let f = fixture();
        ingest(&f, "A", "a.pdf", "Contract A", &["termination clause one", "termination clause two"]);
        ingest(&f, "B", "b.pdf", "Contract B", &["termination clause three"]);

        let args = json!({"query": "termination clause", "k": 3});
        let first = f.registry.invoke("search_document_content", &ctx(), args.clone()).await;
        let second = f.registry.invoke("search_document_content", &ctx(), args).await;
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_other_tenant_sees_nothing() {
        let f = fixture();
        ingest(&f, "A", "a.pdf", "Bank expense policy", &["expense rules"]);

        let env = f
            .registry
            .invoke(
                "search_document_headers",
                &ToolContext::new("other"),
                json!({"query": "bank expense policy"}),
            )
            .await
            .into_value();
        assert_eq!(env["success"], true);
        assert_eq!(env["document_count"], 0);
    }

    #[tokio::test]
    async fn test_malformed_arguments_and_unknown_tool() {
        let f = fixture();

        let env = f
            .registry
            .invoke("search_document_headers", &ctx(), json!({"k": 3}))
            .await
            .into_value();
        assert_eq!(env["success"], false);
        assert!(env["error"].as_str().unwrap().contains("query"));

        let env = f
            .registry
            .invoke("search_document_content", &ctx(), json!("termination"))
            .await;
        assert!(env.is_error());

        let env = f.registry.invoke("delete_everything", &ctx(), json!({})).await;
        assert_eq!(
            env.into_value(),
            json!({"success": false, "error": "Unknown tool: delete_everything", "isError": true})
        );
    }
}
