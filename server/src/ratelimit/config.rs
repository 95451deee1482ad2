//! Rate limiting configuration.

use std::time::Duration;

/// Configuration for the rate limiting system.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Maximum requests allowed per client per window
    pub requests: u32,
    /// Window duration in seconds
    pub window_secs: u64,
    /// Whether to trust X-Forwarded-For headers
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Derive the limiter configuration from the server configuration.
    #[must_use]
    pub const fn from_server_config(config: &crate::config::Config) -> Self {
        Self {
            enabled: config.rate_limit_enabled,
            requests: config.rate_limit_rps,
            window_secs: config.rate_limit_window_secs,
            trust_proxy: config.trust_proxy,
        }
    }

    /// Window duration.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 100,
            window_secs: 60,
            trust_proxy: false,
        }
    }
}
