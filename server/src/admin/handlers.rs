//! Admin API handlers for maintenance operations.
//!
//! Every operation carries its own deadline (30-120 s); the long-running
//! reanalyze-recent work continues in a background task with a 30-minute
//! budget after the response is sent.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::error::{ok, ApiResponse, AppError};
use crate::api::AppState;
use crate::cache;
use crate::db;
use crate::scoring::ProgressRecord;

/// Deadline for `VACUUM ANALYZE`.
const VACUUM_DEADLINE: Duration = Duration::from_secs(120);

/// Deadline for the transactional cleanup.
const CLEANUP_DEADLINE: Duration = Duration::from_secs(60);

/// Deadline for the metrics aggregation.
const METRICS_DEADLINE: Duration = Duration::from_secs(30);

/// Deadline for selecting reanalysis candidates.
const REANALYZE_QUERY_DEADLINE: Duration = Duration::from_secs(30);

/// Budget for the serial background reanalysis of recent articles.
const REANALYZE_RECENT_BUDGET: Duration = Duration::from_secs(30 * 60);

/// Articles older than this are removed by cleanup.
const CLEANUP_AGE_DAYS: i64 = 30;

/// How far back reanalyze-recent looks.
const REANALYZE_WINDOW_DAYS: i64 = 7;

/// Upper bound of articles per reanalyze-recent invocation.
const REANALYZE_LIMIT: i64 = 50;

/// Run `VACUUM ANALYZE` on the store.
///
/// POST /api/admin/vacuum
#[utoipa::path(
    post,
    path = "/api/admin/vacuum",
    tag = "admin",
    responses(
        (status = 200, description = "Vacuum completed"),
    ),
)]
pub async fn vacuum(State(state): State<AppState>) -> Result<Json<ApiResponse<Value>>, AppError> {
    let run = sqlx::query("VACUUM ANALYZE").execute(&state.db);
    tokio::time::timeout(VACUUM_DEADLINE, run)
        .await
        .map_err(|_| AppError::Internal("vacuum exceeded its deadline".to_string()))??;

    info!("Database vacuum completed");
    Ok(ok(json!({ "status": "vacuum complete" })))
}

/// Delete old articles and their scores transactionally.
///
/// POST /api/admin/cleanup
///
/// Dependent model scores go first, then the articles, then commit;
/// any failure rolls the whole batch back.
#[utoipa::path(
    post,
    path = "/api/admin/cleanup",
    tag = "admin",
    responses(
        (status = 200, description = "Cleanup completed with deletion counts"),
    ),
)]
pub async fn cleanup(State(state): State<AppState>) -> Result<Json<ApiResponse<Value>>, AppError> {
    let cutoff = Utc::now() - ChronoDuration::days(CLEANUP_AGE_DAYS);

    let work = async {
        let mut tx = state.db.begin().await?;
        let scores_deleted = db::delete_scores_older_than(&mut *tx, cutoff).await?;
        let articles_deleted = db::delete_articles_older_than(&mut *tx, cutoff).await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>((scores_deleted, articles_deleted))
    };

    let (scores_deleted, articles_deleted) = tokio::time::timeout(CLEANUP_DEADLINE, work)
        .await
        .map_err(|_| AppError::Internal("cleanup exceeded its deadline".to_string()))??;

    state.cache.invalidate_prefix(cache::ARTICLE_LIST_PREFIX);

    info!(articles_deleted, scores_deleted, "Cleanup completed");
    Ok(ok(json!({
        "status": "cleanup complete",
        "articles_deleted": articles_deleted,
        "scores_deleted": scores_deleted,
    })))
}

/// Queue scoring runs for recent articles.
///
/// POST /api/admin/reanalyze-recent
///
/// Selects up to 50 articles from the last 7 days and reanalyzes them
/// serially in the background within a 30-minute budget.
#[utoipa::path(
    post,
    path = "/api/admin/reanalyze-recent",
    tag = "admin",
    responses(
        (status = 200, description = "Reanalysis queued with article count"),
    ),
)]
pub async fn reanalyze_recent(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let cutoff = Utc::now() - ChronoDuration::days(REANALYZE_WINDOW_DAYS);
    let query = db::recent_article_ids(&state.db, cutoff, REANALYZE_LIMIT);
    let article_ids = tokio::time::timeout(REANALYZE_QUERY_DEADLINE, query)
        .await
        .map_err(|_| AppError::Internal("candidate query exceeded its deadline".to_string()))??;

    let count = article_ids.len();
    for &article_id in &article_ids {
        state.tracker.set(ProgressRecord::queued(article_id));
    }

    let scoring = state.scoring.clone();
    tokio::spawn(async move {
        let work = async {
            for article_id in article_ids {
                scoring.run_pipeline(article_id).await;
            }
        };
        if tokio::time::timeout(REANALYZE_RECENT_BUDGET, work).await.is_err() {
            warn!("Reanalyze-recent stopped at its 30-minute budget");
        }
    });

    Ok(ok(json!({
        "status": "reanalysis queued",
        "count": count,
    })))
}

/// Aggregate article, feedback and source counts.
///
/// GET /api/admin/metrics
#[utoipa::path(
    get,
    path = "/api/admin/metrics",
    tag = "admin",
    responses(
        (status = 200, description = "Store metrics with leaning buckets"),
    ),
)]
pub async fn metrics(State(state): State<AppState>) -> Result<Json<ApiResponse<Value>>, AppError> {
    let work = async {
        let by_status = db::count_articles_by_status(&state.db).await?;
        let (left, center, right) = db::leaning_buckets(&state.db).await?;
        let feedback_count = db::count_feedback(&state.db).await?;
        let source_count = db::count_sources(&state.db).await?;
        Ok::<_, sqlx::Error>((by_status, left, center, right, feedback_count, source_count))
    };

    let (by_status, left, center, right, feedback_count, source_count) =
        tokio::time::timeout(METRICS_DEADLINE, work)
            .await
            .map_err(|_| AppError::Internal("metrics exceeded their deadline".to_string()))??;

    let total: i64 = by_status.iter().map(|(_, count)| count).sum();
    let status_map: HashMap<String, i64> = by_status.into_iter().collect();

    Ok(ok(json!({
        "total_articles": total,
        "by_status": status_map,
        "leanings": { "left": left, "center": center, "right": right },
        "feedback_count": feedback_count,
        "source_count": source_count,
    })))
}
