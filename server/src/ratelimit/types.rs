//! Rate limiting types.

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Milliseconds since epoch when the window resets
    pub reset_at_ms: u64,
    /// Seconds to wait before retrying (0 if allowed)
    pub retry_after: u64,
}

impl RateLimitResult {
    /// A pass-through result used when rate limiting is disabled.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            allowed: true,
            limit: 0,
            remaining: 0,
            reset_at_ms: 0,
            retry_after: 0,
        }
    }
}

/// Client identity used for rate limiting, stored in request extensions.
///
/// Either an `X-API-Key` value (prefixed `key:`) or a normalized IP.
#[derive(Debug, Clone)]
pub struct ClientKey(pub String);
