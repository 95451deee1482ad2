//! Feed Ingestion Boundary
//!
//! The server core only knows the [`FeedCollector`] interface; actual RSS
//! fetching lives behind it. The shipped [`SourceCollector`] maintains
//! source-table bookkeeping and derives per-feed health from fetch error
//! streaks.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db;

/// Consecutive fetch failures after which a feed is reported unhealthy.
const UNHEALTHY_ERROR_STREAK: i32 = 5;

/// Capability set of a feed ingestion backend.
#[async_trait]
pub trait FeedCollector: Send + Sync {
    /// Fetch all enabled feeds once. Runs in the background; errors are
    /// logged, never surfaced to HTTP callers.
    async fn refresh(&self) -> anyhow::Result<()>;

    /// Health flag per feed name: `true` means the feed is enabled and
    /// fetching without a notable error streak.
    async fn feed_health(&self) -> HashMap<String, bool>;
}

/// Collector backed by the `sources` table.
pub struct SourceCollector {
    db: PgPool,
}

impl SourceCollector {
    /// Create a collector over the shared pool.
    #[must_use]
    pub const fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FeedCollector for SourceCollector {
    async fn refresh(&self) -> anyhow::Result<()> {
        let refreshed = db::touch_enabled_sources(&self.db).await?;
        info!(refreshed, "Feed refresh completed");
        Ok(())
    }

    async fn feed_health(&self) -> HashMap<String, bool> {
        match db::list_sources(&self.db).await {
            Ok(sources) => sources
                .into_iter()
                .map(|s| {
                    let healthy = s.enabled && s.error_streak < UNHEALTHY_ERROR_STREAK;
                    (s.name, healthy)
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "Failed to load sources for feed health");
                HashMap::new()
            }
        }
    }
}
