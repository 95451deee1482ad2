//! Scoring Pipeline
//!
//! Drives one article through config load, pre-flight provider probe,
//! score deletion, multi-model scoring, aggregation and persistence,
//! emitting progress records along the way. Runs in a supervised
//! background task with its own deadline; the HTTP request that triggered
//! it has already returned.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::cache::ResponseCache;
use crate::db::{self, article_status, score_source, Article};
use crate::llm::{ProviderError, ScoreProvider};
use crate::scoring::aggregator::{
    weighted_composite, CompositeScoreConfig, ScoreConfigError,
};
use crate::scoring::progress::{ProgressRecord, ProgressTracker};
use crate::util::sanitize_message;

/// Timeout for the pre-flight provider probe.
pub const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(2);

/// Failure modes of one pipeline run. Terminal by definition; the message
/// surfaces on the progress stream, never to the HTTP caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("LLM provider configuration unavailable")]
    ConfigUnavailable(#[source] ScoreConfigError),

    #[error("article {0} not found")]
    ArticleNotFound(i64),

    #[error("rate limited by LLM provider")]
    RateLimited,

    #[error("LLM service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("All LLM models failed")]
    AllModelsFailed,

    #[error("aggregation failed: {0}")]
    Aggregation(#[from] crate::scoring::aggregator::AggregateError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors from the manual-score override.
#[derive(Debug, thiserror::Error)]
pub enum ManualScoreError {
    #[error("score must be between -1.0 and 1.0")]
    OutOfRange,

    #[error("article not found")]
    ArticleNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Orchestrates scoring runs and the manual-score override.
///
/// Holds the tracker and cache explicitly; nothing here is process-global.
#[derive(Clone)]
pub struct ScoringService {
    db: PgPool,
    provider: Arc<dyn ScoreProvider>,
    tracker: Arc<ProgressTracker>,
    cache: Arc<ResponseCache>,
    score_config_path: Option<String>,
    deadline: Duration,
}

impl ScoringService {
    /// Wire a scoring service from its collaborators.
    pub fn new(
        db: PgPool,
        provider: Arc<dyn ScoreProvider>,
        tracker: Arc<ProgressTracker>,
        cache: Arc<ResponseCache>,
        score_config_path: Option<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            db,
            provider,
            tracker,
            cache,
            score_config_path,
            deadline,
        }
    }

    /// The progress tracker this service reports to.
    #[must_use]
    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    /// Load the aggregation configuration for one run.
    ///
    /// Re-read from disk on every run so config edits apply without a
    /// restart; the compiled-in default is used when no path is set.
    pub fn load_score_config(&self) -> Result<CompositeScoreConfig, PipelineError> {
        match &self.score_config_path {
            Some(path) => CompositeScoreConfig::load(path).map_err(PipelineError::ConfigUnavailable),
            None => Ok(CompositeScoreConfig::default()),
        }
    }

    /// Start a supervised background run for one article.
    ///
    /// The supervisor owns the deadline and converts worker panics into a
    /// terminal `Error` progress record. Overlapping runs for the same
    /// article are not prevented; delete-then-rewrite means the later
    /// finisher wins.
    pub fn spawn_analysis(&self, article_id: i64) {
        let service = self.clone();
        tokio::spawn(async move {
            let mut worker = tokio::spawn({
                let service = service.clone();
                async move { service.run_pipeline(article_id).await }
            });

            match tokio::time::timeout(service.deadline, &mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    let message = format!("scoring task panicked: {}", panic_message(join_err));
                    warn!(article_id, "{message}");
                    service.record_failure(article_id, &message);
                }
                Err(_) => {
                    worker.abort();
                    warn!(article_id, "scoring task exceeded its deadline");
                    service.record_failure(article_id, "scoring deadline exceeded");
                }
            }
        });
    }

    /// Execute one run and record its terminal state.
    pub async fn run_pipeline(&self, article_id: i64) {
        match self.execute(article_id).await {
            Ok(final_score) => {
                info!(article_id, final_score, "Scoring pipeline completed");
                self.tracker
                    .set(ProgressRecord::success(article_id, final_score));
                self.cache.invalidate_article(article_id);
            }
            Err(err) => {
                warn!(article_id, error = %err, "Scoring pipeline failed");
                self.record_failure(article_id, &err.to_string());
            }
        }
    }

    /// Write a terminal error record unless the run already ended.
    fn record_failure(&self, article_id: i64, message: &str) {
        if self
            .tracker
            .get(article_id)
            .is_some_and(|r| r.status.is_terminal())
        {
            return;
        }
        let percent = self.tracker.get(article_id).map_or(0, |r| r.percent);
        self.tracker.set(ProgressRecord::error(
            article_id,
            &sanitize_message(message),
            percent,
        ));
    }

    /// Steps 1-8. Returns the composite score on success. All database
    /// writes happen inside one transaction, so any failure after the
    /// score deletion leaves prior state untouched.
    async fn execute(&self, article_id: i64) -> Result<f64, PipelineError> {
        // Step 1: configuration
        let config = self.load_score_config()?;

        // Step 2: article
        let article = db::find_article_by_id(&self.db, article_id)
            .await?
            .ok_or(PipelineError::ArticleNotFound(article_id))?;

        // Step 3: pre-flight probe with a short, call-scoped timeout
        let first_model = &config
            .models
            .first()
            .ok_or_else(|| PipelineError::ServiceUnavailable("no models configured".to_string()))?
            .model_name;
        if let Err(err) = self
            .provider
            .score_with_model(&article, first_model, PREFLIGHT_TIMEOUT)
            .await
        {
            return Err(match err {
                ProviderError::RateLimited => PipelineError::RateLimited,
                other => PipelineError::ServiceUnavailable(sanitize_message(&other.to_string())),
            });
        }

        // Step 4: queued marker
        self.tracker.set(ProgressRecord::step(
            article_id,
            "Queued",
            "Scoring job queued",
            0,
        ));

        // Steps 5-8 share one transaction
        let mut tx = self.db.begin().await?;

        db::delete_article_scores(&mut *tx, article_id).await?;

        let total_models = config.models.len();
        let mut any_success = false;

        for (index, model) in config.models.iter().enumerate() {
            self.tracker.set(ProgressRecord::step(
                article_id,
                &format!("Scoring with {}", model.model_name),
                &format!("Scoring with {}", model.model_name),
                model_step_percent(index, total_models),
            ));

            match self
                .provider
                .score_with_model(&article, &model.model_name, self.provider.default_timeout())
                .await
            {
                Ok(result) => {
                    db::insert_model_score(
                        &mut *tx,
                        article_id,
                        &model.model_name,
                        result.score,
                        &result.metadata,
                    )
                    .await?;
                    any_success = true;
                }
                Err(err) => {
                    warn!(
                        article_id,
                        model = %model.model_name,
                        error = %err,
                        "Model scoring failed, continuing"
                    );
                }
            }
        }

        if !any_success {
            // Dropping the transaction rolls the score deletion back.
            return Err(PipelineError::AllModelsFailed);
        }

        self.tracker.set(ProgressRecord::step(
            article_id,
            "Aggregating",
            "Calculating composite score",
            90,
        ));

        let scores = db::list_model_scores(&mut *tx, article_id).await?;
        let aggregate = weighted_composite(&scores, &config)?;

        db::update_article_score(
            &mut *tx,
            article_id,
            aggregate.composite,
            aggregate.confidence,
            score_source::LLM,
            article_status::ANALYZED,
        )
        .await?;

        tx.commit().await?;

        Ok(aggregate.composite)
    }

    /// Manual-score override: bypasses the pipeline entirely.
    ///
    /// Sets `confidence = 1.0` and `score_source = "manual"`, then
    /// invalidates the cached article.
    pub async fn apply_manual_score(
        &self,
        article_id: i64,
        score: f64,
    ) -> Result<Article, ManualScoreError> {
        if !score.is_finite() || !(-1.0..=1.0).contains(&score) {
            return Err(ManualScoreError::OutOfRange);
        }

        let updated = db::update_article_score(
            &self.db,
            article_id,
            score,
            1.0,
            score_source::MANUAL,
            article_status::ANALYZED,
        )
        .await?;
        if updated == 0 {
            return Err(ManualScoreError::ArticleNotFound);
        }

        self.cache.invalidate_article(article_id);

        db::find_article_by_id(&self.db, article_id)
            .await?
            .ok_or(ManualScoreError::ArticleNotFound)
    }
}

/// Percent reported when the `index`-th of `total` model steps begins.
/// Model steps progress linearly from 5% to 85%.
fn model_step_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 5;
    }
    (5 + (index * 80) / total) as u8
}

/// Best-effort panic payload extraction.
fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            }
        }
        Err(_) => "task cancelled".to_string(),
    }
}
