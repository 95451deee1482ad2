//! Core in-memory sliding-window rate limiter.

use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tracing::debug;

use crate::ratelimit::{RateLimitConfig, RateLimitResult};

/// Per-client sliding window of request timestamps.
#[derive(Default)]
struct Window {
    hits: VecDeque<Instant>,
}

/// In-memory sliding-window rate limiter.
///
/// Each client key maps to a window of request timestamps; a request is
/// allowed while fewer than `requests` timestamps fall inside the last
/// `window_secs`. State is process-local and lost on restart.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Creates a new rate limiter instance.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Checks and records a request for the given client key.
    ///
    /// Returns `allowed: true` with updated remaining/reset information,
    /// or `allowed: false` with retry information when the limit is hit.
    pub fn check(&self, key: &str) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::unlimited();
        }

        let now = Instant::now();
        let window = self.config.window();
        let limit = self.config.requests;

        let mut entry = self.windows.entry(key.to_string()).or_default();
        while let Some(&oldest) = entry.hits.front() {
            if now.duration_since(oldest) >= window {
                entry.hits.pop_front();
            } else {
                break;
            }
        }

        if entry.hits.len() as u32 >= limit {
            let oldest = entry.hits.front().copied().unwrap_or(now);
            let until_reset = (oldest + window).saturating_duration_since(now);
            debug!(key = %key, retry_after = until_reset.as_secs(), "Rate limit exceeded");
            return RateLimitResult {
                allowed: false,
                limit,
                remaining: 0,
                reset_at_ms: epoch_ms_after(until_reset),
                retry_after: until_reset.as_secs().max(1),
            };
        }

        entry.hits.push_back(now);
        let oldest = entry.hits.front().copied().unwrap_or(now);
        let until_reset = (oldest + window).saturating_duration_since(now);

        RateLimitResult {
            allowed: true,
            limit,
            remaining: limit - entry.hits.len() as u32,
            reset_at_ms: epoch_ms_after(until_reset),
            retry_after: 0,
        }
    }

    /// Drop client windows with no hits inside the current window.
    ///
    /// Run periodically so one-off clients do not accumulate forever.
    pub fn sweep(&self) {
        let now = Instant::now();
        let window = self.config.window();
        self.windows.retain(|_, w| {
            w.hits
                .back()
                .is_some_and(|&last| now.duration_since(last) < window)
        });
    }

    /// Returns the configuration for this rate limiter.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of tracked client windows.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Milliseconds since the Unix epoch, `delay` from now.
fn epoch_ms_after(delay: Duration) -> u64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    now_ms + delay.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            requests,
            window_secs,
            trust_proxy: false,
        })
    }

    #[test]
    fn test_under_limit_allows_requests() {
        let limiter = limiter(3, 60);

        let result = limiter.check("10.0.0.1");
        assert!(result.allowed);
        assert_eq!(result.limit, 3);
        assert_eq!(result.remaining, 2);
        assert_eq!(result.retry_after, 0);

        let result = limiter.check("10.0.0.1");
        assert!(result.allowed);
        assert_eq!(result.remaining, 1);
    }

    #[test]
    fn test_exceeding_limit_denies() {
        let limiter = limiter(2, 60);
        assert!(limiter.check("c").allowed);
        assert!(limiter.check("c").allowed);

        let result = limiter.check("c");
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        assert!(result.retry_after >= 1);
        assert!(result.reset_at_ms > 0);
    }

    #[test]
    fn test_keys_are_isolated() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("b").allowed);
        assert!(!limiter.check("a").allowed);
    }

    #[test]
    fn test_disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            requests: 1,
            window_secs: 60,
            trust_proxy: false,
        });
        for _ in 0..10 {
            assert!(limiter.check("c").allowed);
        }
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: true,
            requests: 1,
            window_secs: 0,
            trust_proxy: false,
        });
        // Zero-length window: every prior hit has already expired.
        assert!(limiter.check("c").allowed);
        assert!(limiter.check("c").allowed);
    }

    #[test]
    fn test_sweep_drops_idle_windows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: true,
            requests: 5,
            window_secs: 0,
            trust_proxy: false,
        });
        limiter.check("idle");
        assert_eq!(limiter.tracked_clients(), 1);
        limiter.sweep();
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
