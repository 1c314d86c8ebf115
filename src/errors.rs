use axum::http::StatusCode;
use thiserror::Error;

use crate::feed::SourceId;

/// Validation failures raised before any upstream fetch is attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid range: {reason}")]
    InvalidRange { reason: String },
    #[error("unknown granularity '{0}', expected one of d, w, m, y")]
    UnknownGranularity(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("taxonomy configuration error: {0}")]
    Taxonomy(String),
}

impl EngineError {
    pub fn invalid_range(reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            reason: reason.into(),
        }
    }
}

/// Failures of the fetch collaborator. The engine degrades on these instead of
/// propagating them.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("source '{source_id}' is unavailable: {reason}")]
    Unavailable { source_id: SourceId, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to parse feed payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Error surfaced by the HTTP handlers as a status code and plain-text body.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Taxonomy(_) => Self::internal(err),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            tracing::error!("request failed: {}", self.message);
        }
        (self.status, self.message).into_response()
    }
}
