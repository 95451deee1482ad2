//! Provider capability set shared by all LLM scoring backends.

use std::time::Duration;

use async_trait::async_trait;

use crate::db::Article;

/// One model's verdict on one article.
#[derive(Debug, Clone)]
pub struct ModelResult {
    /// Bias score in [-1, 1].
    pub score: f64,
    /// Opaque JSON blob persisted alongside the score (raw model output).
    pub metadata: String,
}

/// Errors surfaced by scoring providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("provider timed out after {0} ms")]
    Timeout(u64),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Capability set of an LLM scoring backend.
///
/// The timeout is an immutable per-call parameter rather than mutable
/// client state, so a short pre-flight probe on one pipeline can never
/// shorten the timeout of a concurrent one.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Cheap credentials probe against the provider.
    async fn validate_api_key(&self) -> Result<(), ProviderError>;

    /// Ask one model to score one article, bounded by `timeout`.
    async fn score_with_model(
        &self,
        article: &Article,
        model: &str,
        timeout: Duration,
    ) -> Result<ModelResult, ProviderError>;

    /// The timeout regular scoring calls should use.
    fn default_timeout(&self) -> Duration;
}
