//! HTTP error taxonomy and response envelope.
//!
//! Every handler error is converted exactly once, here, into the
//! `{"success": false, "error": {"code", "message"}}` envelope. Messages
//! are sanitized so upstream errors cannot inject control characters into
//! responses or logs.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::scoring::{ManualScoreError, PipelineError};
use crate::util::sanitize_message;

/// Success envelope for API payloads.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true` for success responses.
    pub success: bool,
    /// The payload.
    pub data: T,
}

/// Wrap a payload in the success envelope with HTTP 200.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

/// Wrap a payload in the success envelope with HTTP 201.
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            data,
        }),
    )
}

/// Boundary error taxonomy. Codes are stable, user-visible strings.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    LlmService(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and stable error code for this kind.
    #[must_use]
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict_error"),
            Self::RateLimit(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error"),
            Self::LlmService(_) => (StatusCode::SERVICE_UNAVAILABLE, "llm_service_error"),
            Self::Database(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Internal failures get a generic message; details stay in the log.
        let message = match &self {
            Self::Database(err) => {
                tracing::error!(error = %err, "Database error");
                "Internal server error".to_string()
            }
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                "Internal server error".to_string()
            }
            other => sanitize_message(&other.to_string()),
        };

        let body = serde_json::json!({
            "success": false,
            "error": { "code": code, "message": message }
        });
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<ManualScoreError> for AppError {
    fn from(err: ManualScoreError) -> Self {
        match err {
            ManualScoreError::OutOfRange => Self::Validation(err.to_string()),
            ManualScoreError::ArticleNotFound => Self::NotFound(err.to_string()),
            ManualScoreError::Database(db) => Self::Database(db),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::RateLimited => Self::RateLimit(err.to_string()),
            PipelineError::ArticleNotFound(_) => Self::NotFound(err.to_string()),
            PipelineError::Database(db) => Self::Database(db),
            other => Self::LlmService(other.to_string()),
        }
    }
}

/// Parse a path ID, rejecting non-numeric values and anything below 1.
pub fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id >= 1)
        .ok_or_else(|| AppError::Validation(format!("invalid ID: {raw}")))
}
