use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Index backend failed: {0}")]
    BackendError(String),

    #[error("Embedding model failed: {0}")]
    ModelError(String),

    #[error("Tokenization failed: {0}")]
    TokenizationError(String),

    #[error("Service temporarily unavailable: {0}")]
    ResourceError(String),

    #[error("Snapshot failed: {0}")]
    PersistenceError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Message without the category prefix, as shown in tool envelopes.
    pub fn message(&self) -> &str {
        match self {
            AppError::ValidationError(msg)
            | AppError::BackendError(msg)
            | AppError::ModelError(msg)
            | AppError::TokenizationError(msg)
            | AppError::ResourceError(msg)
            | AppError::PersistenceError(msg)
            | AppError::NotFound(msg) => msg,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::ValidationError(_))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::ValidationError(msg) => {
                tracing::warn!(error = %msg, "Validation error");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::NotFound(msg) => {
                tracing::debug!(error = %msg, "Not found");
                (StatusCode::NOT_FOUND, msg.clone())
            }
            AppError::ResourceError(msg) => {
                tracing::warn!(error = %msg, "Resource error");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::BackendError(e) | AppError::PersistenceError(e) => {
                tracing::error!(error = %e, "Index error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::ModelError(e) | AppError::TokenizationError(e) => {
                tracing::error!(error = %e, "Embedding error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::ModelError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
