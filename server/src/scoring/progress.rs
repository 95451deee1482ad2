//! Progress Tracker
//!
//! In-memory map from article ID to the latest state of its scoring run,
//! backed by `DashMap` for concurrent reads from SSE subscribers while the
//! pipeline writes. Terminal records are evicted on a TTL sweep; state does
//! not survive restarts, which is safe because pipeline runs are idempotent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Status of one scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub enum ProgressStatus {
    /// Accepted, waiting for the background task to pick it up.
    Queued,
    /// The pipeline is working.
    InProgress,
    /// Terminal: a composite score was persisted.
    Success,
    /// Terminal: the run failed.
    Error,
}

impl ProgressStatus {
    /// Terminal states never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Latest-known state of one scoring run.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressRecord {
    /// Article this run belongs to.
    pub article_id: i64,
    /// Current pipeline step label.
    pub step: String,
    /// Human-readable progress message.
    pub message: String,
    /// Completion percentage, non-decreasing within one run.
    pub percent: u8,
    /// Run status.
    pub status: ProgressStatus,
    /// Terminal error description, when `status` is `Error`.
    pub error_message: Option<String>,
    /// Composite score, when `status` is `Success`.
    pub final_score: Option<f64>,
    /// Wall-clock time of the last update (also the run discriminator
    /// observed by subscribers).
    pub last_updated: DateTime<Utc>,
    /// Monotonic timestamp used for TTL eviction.
    #[serde(skip)]
    touched: Instant,
}

impl ProgressRecord {
    fn base(article_id: i64, status: ProgressStatus, step: &str, message: &str) -> Self {
        Self {
            article_id,
            step: step.to_string(),
            message: message.to_string(),
            percent: 0,
            status,
            error_message: None,
            final_score: None,
            last_updated: Utc::now(),
            touched: Instant::now(),
        }
    }

    /// Record for a freshly accepted run.
    #[must_use]
    pub fn queued(article_id: i64) -> Self {
        Self::base(article_id, ProgressStatus::Queued, "Queued", "Scoring job queued")
    }

    /// In-progress record for one pipeline step.
    #[must_use]
    pub fn step(article_id: i64, step: &str, message: &str, percent: u8) -> Self {
        let mut record = Self::base(article_id, ProgressStatus::InProgress, step, message);
        record.percent = percent;
        record
    }

    /// Terminal success record.
    #[must_use]
    pub fn success(article_id: i64, final_score: f64) -> Self {
        let mut record = Self::base(
            article_id,
            ProgressStatus::Success,
            "Complete",
            "Scoring complete",
        );
        record.percent = 100;
        record.final_score = Some(final_score);
        record
    }

    /// Terminal error record. `percent` carries the last progress reached
    /// so subscribers never observe it going backwards.
    #[must_use]
    pub fn error(article_id: i64, error_message: &str, percent: u8) -> Self {
        let mut record = Self::base(article_id, ProgressStatus::Error, "Failed", error_message);
        record.percent = percent;
        record.error_message = Some(error_message.to_string());
        record
    }

    /// Whether this record represents a different state than `previous`.
    ///
    /// Used by SSE samplers for change detection; the eviction timestamp is
    /// deliberately excluded.
    #[must_use]
    pub fn changed_since(&self, previous: &Self) -> bool {
        self.status != previous.status
            || self.percent != previous.percent
            || self.step != previous.step
            || self.message != previous.message
            || self.last_updated != previous.last_updated
    }
}

/// Thread-safe tracker of in-flight scoring runs.
pub struct ProgressTracker {
    records: DashMap<i64, ProgressRecord>,
    ttl: Duration,
}

impl ProgressTracker {
    /// Create a tracker whose terminal records live for `ttl` after their
    /// last update.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
        }
    }

    /// Overwrite the record for an article, stamping the update time.
    pub fn set(&self, mut record: ProgressRecord) {
        record.last_updated = Utc::now();
        record.touched = Instant::now();
        self.records.insert(record.article_id, record);
    }

    /// Snapshot of the current record, if any. Never a live reference.
    #[must_use]
    pub fn get(&self, article_id: i64) -> Option<ProgressRecord> {
        self.records.get(&article_id).map(|r| r.clone())
    }

    /// Evict terminal records whose TTL has elapsed.
    pub fn sweep(&self) {
        let ttl = self.ttl;
        self.records
            .retain(|_, record| !(record.status.is_terminal() && record.touched.elapsed() >= ttl));
    }

    /// Number of tracked runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Run `sweep` on a fixed cadence until the process exits.
    pub fn spawn_sweeper(self: &Arc<Self>, cadence: Duration) {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tracker.sweep();
            }
        });
    }
}
