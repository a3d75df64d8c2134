//! Success/failure envelope returned by every tool call.

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ToolEnvelope {
    /// Tool-specific payload; always carries `"success": true`.
    Success(Value),
    /// Human-readable error. Serialized as `{success:false, error, isError:true}`.
    Failure(String),
}

impl ToolEnvelope {
    pub fn from_result(result: crate::error::Result<Value>) -> Self {
        match result {
            Ok(value) => ToolEnvelope::Success(value),
            Err(e) => ToolEnvelope::failure(&e),
        }
    }

    pub fn failure(err: &AppError) -> Self {
        ToolEnvelope::Failure(err.message().to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolEnvelope::Failure(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            ToolEnvelope::Success(value) => value,
            ToolEnvelope::Failure(error) => json!({
                "success": false,
                "error": error,
                "isError": true,
            }),
        }
    }
}

impl Serialize for ToolEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clone().into_value().serialize(serializer)
    }
}

/// Deserialize tool arguments, reporting any mismatch as a validation error.
///
/// `null` arguments are read as an empty object.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> crate::error::Result<T> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => args,
        other => {
            return Err(AppError::ValidationError(format!(
                "Tool arguments must be a JSON object, got {}",
                type_name(&other)
            )))
        }
    };
    serde_json::from_value(args)
        .map_err(|e| AppError::ValidationError(format!("Invalid arguments: {}", e)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Serialize a success payload.
pub fn to_payload<T: Serialize>(payload: &T) -> crate::error::Result<Value> {
    serde_json::to_value(payload)
        .map_err(|e| AppError::BackendError(format!("Failed to serialize result: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Args {
        query: String,
        #[serde(default)]
        k: Option<i64>,
    }

    #[test]
    fn test_failure_shape() {
        let env = ToolEnvelope::failure(&AppError::BackendError("index unavailable".into()));
        assert!(env.is_error());
        assert_eq!(
            env.into_value(),
            json!({"success": false, "error": "index unavailable", "isError": true})
        );
    }

    #[test]
    fn test_success_passes_payload_through() {
        let env = ToolEnvelope::from_result(Ok(json!({"success": true, "count": 0})));
        assert!(!env.is_error());
        assert_eq!(serde_json::to_value(&env).unwrap()["count"], 0);
    }

    #[test]
    fn test_parse_args_rejects_non_objects() {
        let err = parse_args::<Args>(json!(["query"])).unwrap_err();
        assert!(err.is_validation());
        assert!(err.message().contains("array"));
    }

    #[test]
    fn test_parse_args_reports_missing_fields() {
        let err = parse_args::<Args>(Value::Null).unwrap_err();
        assert!(err.is_validation());
        assert!(err.message().contains("query"));
    }

    #[test]
    fn test_parse_args_wrong_type() {
        let err = parse_args::<Args>(json!({"query": "x", "k": "five"})).unwrap_err();
        assert!(err.is_validation());
        let ok = parse_args::<Args>(json!({"query": "x", "k": null})).unwrap();
        assert_eq!(ok.k, None);
    }
}
