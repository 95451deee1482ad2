//! Axum middleware for rate limiting.
//!
//! Enforces the sliding-window limit per client and stamps
//! `X-RateLimit-{Limit,Remaining,Reset}` on every response that passes
//! through it, allowed or not.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::debug;

use crate::api::AppState;
use crate::ratelimit::{apply_rate_limit_headers, client_key, ClientKey, RateLimitError};

/// Middleware to rate limit requests by client identity.
///
/// The identity is the `X-API-Key` header when present, otherwise the
/// normalized remote IP (honoring proxy headers only when `trust_proxy`
/// is configured).
///
/// # Behavior
///
/// - If the rate limiter is not configured (`state.rate_limiter` is `None`),
///   requests pass through untouched.
/// - If the limit is exceeded, returns `429 Too Many Requests` with retry
///   information; the limit headers are attached by the error response.
/// - Stores [`ClientKey`] in request extensions for downstream handlers.
pub async fn rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    // Skip rate limiting if not configured
    let Some(ref rate_limiter) = state.rate_limiter else {
        return Ok(next.run(request).await);
    };

    let trust_proxy = rate_limiter.config().trust_proxy;
    let key = client_key(request.headers(), connect_info.as_ref(), trust_proxy);

    debug!(client = %key, "Checking rate limit");

    request.extensions_mut().insert(ClientKey(key.clone()));

    let result = rate_limiter.check(&key);
    if !result.allowed {
        return Err(RateLimitError::LimitExceeded(result));
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(&mut response, &result);
    Ok(response)
}
