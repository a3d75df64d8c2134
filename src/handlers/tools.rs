//! Tool listing and invocation over HTTP.
//!
//! Tool failures are part of the tool contract, so they come back as a
//! `200` with `isError: true` in the envelope. Only an unknown tool name
//! is an HTTP-level error.

use crate::error::{AppError, Result};
use crate::handlers::tenant_id;
use crate::state::AppState;
use crate::tools::{ToolContext, ToolDefinition, ToolEnvelope};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDefinition>,
}

/// GET /tools - MCP-style tool definitions
pub async fn list_tools_handler(State(state): State<Arc<AppState>>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.definitions(),
    })
}

/// POST /tools/:name - Invoke a tool with a JSON arguments object.
///
/// An empty body is read as no arguments.
pub async fn call_tool_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ToolEnvelope>> {
    if state.tools.get(&name).is_none() {
        return Err(AppError::NotFound(format!("Unknown tool: {}", name)));
    }

    let ctx = ToolContext::new(tenant_id(&headers, &state.config.default_tenant)?);

    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(args) => args,
            Err(e) => {
                let err = AppError::ValidationError(format!("Arguments are not valid JSON: {}", e));
                return Ok(Json(ToolEnvelope::failure(&err)));
            }
        }
    };

    Ok(Json(state.tools.invoke(&name, &ctx, args).await))
}

