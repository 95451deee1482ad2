//! Database Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Article lifecycle status values stored in `articles.status`.
pub mod article_status {
    /// Ingested, not yet scored.
    pub const PENDING: &str = "pending";
    /// A composite score has been persisted.
    pub const ANALYZED: &str = "analyzed";
    /// The last scoring attempt failed terminally.
    pub const ERROR: &str = "error";
}

/// Origin of a persisted composite score (`articles.score_source`).
pub mod score_source {
    /// Written by the scoring pipeline.
    pub const LLM: &str = "llm";
    /// Written by the manual-score override.
    pub const MANUAL: &str = "manual";
}

/// Model name under which article summaries are stored in `llm_scores`.
///
/// Never part of the configured scoring model set, so summaries are
/// invisible to the aggregator.
pub const SUMMARIZER_MODEL: &str = "summarizer";

/// News article.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Article {
    /// Unique article ID.
    pub id: i64,
    /// Source name (e.g., publisher or feed name).
    pub source: String,
    /// Publication timestamp.
    pub pub_date: DateTime<Utc>,
    /// Canonical article URL (unique).
    pub url: String,
    /// Article title.
    pub title: String,
    /// Article body text.
    pub content: String,
    /// Aggregated bias score in [-1, 1]; negative leans left.
    pub composite_score: Option<f64>,
    /// Weighted fraction of configured models that contributed, in [0, 1].
    pub confidence: Option<f64>,
    /// Origin of the composite score ("llm", "manual", ...).
    pub score_source: Option<String>,
    /// Lifecycle status ("pending", "analyzed", "error").
    pub status: String,
    /// When the article row was created.
    pub created_at: DateTime<Utc>,
}

/// One model's bias score for one article.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ModelScore {
    /// Unique score ID.
    pub id: i64,
    /// Article this score belongs to.
    pub article_id: i64,
    /// Model identifier as configured.
    pub model: String,
    /// Bias score in [-1, 1].
    pub score: f64,
    /// Opaque JSON blob owned by the provider (raw response, explanation).
    pub metadata: String,
    /// When the score row was created.
    pub created_at: DateTime<Utc>,
}

/// User feedback on an article's score. Append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Feedback {
    /// Unique feedback ID.
    pub id: i64,
    /// Article the feedback refers to.
    pub article_id: i64,
    /// Optional submitter identifier.
    pub user_id: Option<String>,
    /// Free-form feedback text.
    pub feedback_text: String,
    /// One of "agree", "disagree", "unclear", "other".
    pub category: String,
    /// Submission channel (e.g., "web").
    pub source: String,
    /// When the feedback was created.
    pub created_at: DateTime<Utc>,
}

/// Configured ingestion source (RSS feed or similar channel).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Source {
    /// Unique source ID.
    pub id: i64,
    /// Unique human-readable name.
    pub name: String,
    /// Ingestion channel kind (e.g., "rss").
    pub channel_type: String,
    /// Feed URL polled by the collector.
    pub feed_url: String,
    /// Editorial category (e.g., "general", "politics").
    pub category: String,
    /// Whether the collector polls this source.
    pub enabled: bool,
    /// Default weight applied to articles from this source.
    pub default_weight: f64,
    /// Consecutive fetch failures; reset on success.
    pub error_streak: i32,
    /// Last successful fetch, if any.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Collector-owned metadata.
    pub metadata: Option<serde_json::Value>,
    /// When the source row was created.
    pub created_at: DateTime<Utc>,
    /// When the source row was last updated.
    pub updated_at: DateTime<Utc>,
}
