//! Rate limiting error types for HTTP responses.

use axum::http::header::HeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::ratelimit::RateLimitResult;

/// Errors that can occur during rate limit checks.
#[derive(Debug)]
pub enum RateLimitError {
    /// Request exceeded the rate limit.
    LimitExceeded(RateLimitResult),
}

/// Attach `X-RateLimit-*` headers from a check result to a response.
pub fn apply_rate_limit_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&result.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.reset_at_ms.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        match self {
            Self::LimitExceeded(result) => {
                let body = serde_json::json!({
                    "success": false,
                    "error": {
                        "code": "rate_limit_error",
                        "message": format!("Too many requests. Wait {} seconds.", result.retry_after),
                    }
                });
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                apply_rate_limit_headers(&mut response, &result);
                if let Ok(v) = HeaderValue::from_str(&result.retry_after.to_string()) {
                    response.headers_mut().insert("Retry-After", v);
                }
                response
            }
        }
    }
}
