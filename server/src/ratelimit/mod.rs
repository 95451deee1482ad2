//! Rate limiting module for protecting against abuse.
//!
//! Provides an in-memory sliding-window rate limiter keyed by client
//! identity (`X-API-Key` header when present, normalized remote IP
//! otherwise). Every response carries `X-RateLimit-*` headers; exceeding
//! the limit yields HTTP 429.

pub mod config;
pub mod constants;
pub mod error;
pub mod ip;
pub mod limiter;
pub mod middleware;
pub mod types;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use ip::*;
pub use limiter::*;
pub use middleware::rate_limit;
pub use types::*;
