//! Response Cache
//!
//! Process-wide key/value cache with per-entry TTL for expensive GETs
//! (article lookup, source list, feed health), backed by `DashMap` for
//! lock-free concurrent access. Writers invalidate the keys they affect;
//! the cache is a latency optimization only and correctness never depends
//! on it.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

/// Cache key for one article payload.
pub fn article_key(article_id: i64) -> String {
    format!("article:{article_id}")
}

/// Key prefix shared by all article-list pages.
pub const ARTICLE_LIST_PREFIX: &str = "articles:list";

/// Cache key for the source list.
pub const SOURCES_KEY: &str = "sources:list";

/// Cache key for the per-feed health map.
pub const FEED_HEALTH_KEY: &str = "feed-health";

struct CachedEntry {
    value: Value,
    expires_at: Instant,
}

/// Thread-safe TTL cache of serialized response payloads.
pub struct ResponseCache {
    entries: DashMap<String, CachedEntry>,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Create a cache whose entries expire after `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    /// Get a non-expired value. Expired entries are removed on access.
    pub fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Store a value under the default TTL.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value with an explicit TTL.
    pub fn insert_with_ttl(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CachedEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop one key.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every key starting with `prefix` (list pages under all filters).
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Invalidation hook for article writes: the article payload and every
    /// cached list page that may contain it.
    pub fn invalidate_article(&self, article_id: i64) {
        self.invalidate(&article_key(article_id));
        self.invalidate_prefix(ARTICLE_LIST_PREFIX);
    }

    /// Number of live entries (expired-but-unswept entries included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> ResponseCache {
        ResponseCache::new(Duration::from_secs(30))
    }

    #[test]
    fn test_get_returns_inserted_value() {
        let cache = cache();
        cache.insert("article:1", json!({"id": 1}));
        assert_eq!(cache.get("article:1"), Some(json!({"id": 1})));
    }

    #[test]
    fn test_get_misses_unknown_key() {
        assert_eq!(cache().get("article:404"), None);
    }

    #[test]
    fn test_expired_entry_is_removed_on_access() {
        let cache = cache();
        cache.insert_with_ttl("feed-health", json!({"cnn": true}), Duration::ZERO);
        assert_eq!(cache.get("feed-health"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_prefix_spares_other_keys() {
        let cache = cache();
        cache.insert("articles:list:cnn::20:0", json!([1]));
        cache.insert("articles:list::left:20:0", json!([2]));
        cache.insert("article:7", json!({"id": 7}));

        cache.invalidate_prefix(ARTICLE_LIST_PREFIX);

        assert_eq!(cache.get("articles:list:cnn::20:0"), None);
        assert_eq!(cache.get("articles:list::left:20:0"), None);
        assert_eq!(cache.get("article:7"), Some(json!({"id": 7})));
    }

    #[test]
    fn test_invalidate_article_clears_payload_and_lists() {
        let cache = cache();
        cache.insert(article_key(42), json!({"id": 42}));
        cache.insert("articles:list:::20:0", json!([42]));
        cache.insert(SOURCES_KEY, json!([]));

        cache.invalidate_article(42);

        assert_eq!(cache.get("article:42"), None);
        assert_eq!(cache.get("articles:list:::20:0"), None);
        assert_eq!(cache.get(SOURCES_KEY), Some(json!([])));
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = cache();
        cache.insert("article:1", json!({"v": 1}));
        cache.insert("article:1", json!({"v": 2}));
        assert_eq!(cache.get("article:1"), Some(json!({"v": 2})));
    }
}
