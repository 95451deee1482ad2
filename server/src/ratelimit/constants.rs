//! Rate limiting constants.

/// IPv6 prefix segments for rate limiting (uses /64)
pub const IPV6_PREFIX_SEGMENTS: usize = 4;

/// Header carrying the client's API key, preferred over the remote IP
/// as the rate-limit identity.
pub const API_KEY_HEADER: &str = "X-API-Key";
