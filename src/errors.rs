use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid resource type: expected {expected}, got {actual}")]
    InvalidResourceType { expected: String, actual: String },

    #[error("Unknown permission bit {0:#x}")]
    UnknownPermission(u64),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Discord API returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid_resource_type(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        AppError::InvalidResourceType {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidResourceType { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::UnknownPermission(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Unsupported(msg) => (StatusCode::NOT_IMPLEMENTED, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Upstream { status, message } => {
                tracing::error!("Discord API error {}: {}", status, message);
                (StatusCode::BAD_GATEWAY, format!("Discord API returned {status}"))
            }
            AppError::Http(e) => {
                tracing::error!("HTTP error: {:?}", e);
                (StatusCode::BAD_GATEWAY, "Upstream request failed".into())
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {:?}", e);
                (StatusCode::BAD_GATEWAY, "Malformed upstream response".into())
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
