//! Scripted scoring provider for tests and offline development.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::db::Article;
use crate::llm::provider::{ModelResult, ProviderError, ScoreProvider};

/// Scripted outcome for one model.
#[derive(Debug, Clone, Copy)]
pub enum MockOutcome {
    /// Succeed with this score.
    Score(f64),
    /// Fail with `ProviderError::RateLimited`.
    RateLimited,
    /// Fail with `ProviderError::Unavailable`.
    Unavailable,
    /// Fail with `ProviderError::Timeout`.
    Timeout,
}

/// Provider whose per-model outcomes are fixed up front.
///
/// Models without a scripted outcome fall back to `fallback`, which
/// defaults to `Unavailable`.
pub struct MockProvider {
    outcomes: HashMap<String, MockOutcome>,
    fallback: MockOutcome,
    key_valid: bool,
}

impl MockProvider {
    /// Provider that succeeds with the given score for every model.
    #[must_use]
    pub fn with_uniform_score(score: f64) -> Self {
        Self {
            outcomes: HashMap::new(),
            fallback: MockOutcome::Score(score),
            key_valid: true,
        }
    }

    /// Provider with explicit per-model scores.
    #[must_use]
    pub fn with_scores<I, S>(scores: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            outcomes: scores
                .into_iter()
                .map(|(model, score)| (model.into(), MockOutcome::Score(score)))
                .collect(),
            fallback: MockOutcome::Unavailable,
            key_valid: true,
        }
    }

    /// Provider that answers `RateLimited` for every model.
    #[must_use]
    pub fn rate_limited() -> Self {
        Self {
            outcomes: HashMap::new(),
            fallback: MockOutcome::RateLimited,
            key_valid: true,
        }
    }

    /// Provider that answers `Unavailable` for every model.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            outcomes: HashMap::new(),
            fallback: MockOutcome::Unavailable,
            key_valid: false,
        }
    }

    /// Override the outcome for one model.
    #[must_use]
    pub fn with_outcome(mut self, model: impl Into<String>, outcome: MockOutcome) -> Self {
        self.outcomes.insert(model.into(), outcome);
        self
    }

    fn outcome_for(&self, model: &str) -> MockOutcome {
        self.outcomes.get(model).copied().unwrap_or(self.fallback)
    }
}

#[async_trait]
impl ScoreProvider for MockProvider {
    async fn validate_api_key(&self) -> Result<(), ProviderError> {
        if self.key_valid {
            Ok(())
        } else {
            Err(ProviderError::Auth("mock key rejected".to_string()))
        }
    }

    async fn score_with_model(
        &self,
        _article: &Article,
        model: &str,
        _timeout: Duration,
    ) -> Result<ModelResult, ProviderError> {
        match self.outcome_for(model) {
            MockOutcome::Score(score) => Ok(ModelResult {
                score,
                metadata: format!(r#"{{"score": {score}, "explanation": "mock"}}"#),
            }),
            MockOutcome::RateLimited => Err(ProviderError::RateLimited),
            MockOutcome::Unavailable => {
                Err(ProviderError::Unavailable("mock unavailable".to_string()))
            }
            MockOutcome::Timeout => Err(ProviderError::Timeout(0)),
        }
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}
