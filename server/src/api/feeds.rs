//! Feed HTTP Handlers
//!
//! Refresh triggering and per-feed health.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::api::error::{ok, ApiResponse, AppError};
use crate::api::AppState;
use crate::cache;

/// TTL for the cached feed-health map.
const FEED_HEALTH_TTL: Duration = Duration::from_secs(30);

/// Trigger background feed ingestion.
///
/// POST /api/refresh
///
/// List and feed-health cache keys are invalidated before the refresh is
/// enqueued, so stale reads cannot repopulate them mid-refresh.
#[utoipa::path(
    post,
    path = "/api/refresh",
    tag = "feeds",
    responses(
        (status = 200, description = "Refresh queued"),
    ),
)]
pub async fn refresh(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    state.cache.invalidate_prefix(cache::ARTICLE_LIST_PREFIX);
    state.cache.invalidate(cache::FEED_HEALTH_KEY);

    let collector = state.collector.clone();
    tokio::spawn(async move {
        if let Err(err) = collector.refresh().await {
            warn!(error = %err, "Feed refresh failed");
        }
    });

    ok(json!({ "status": "refresh queued" }))
}

/// Per-feed health map.
///
/// GET /api/feeds/healthz
#[utoipa::path(
    get,
    path = "/api/feeds/healthz",
    tag = "feeds",
    responses(
        (status = 200, description = "Map of feed name to health flag"),
    ),
)]
pub async fn feed_health(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if let Some(cached) = state.cache.get(cache::FEED_HEALTH_KEY) {
        return Ok(ok(cached));
    }

    let health = state.collector.feed_health().await;
    let payload =
        serde_json::to_value(&health).map_err(|e| AppError::Internal(e.to_string()))?;
    state
        .cache
        .insert_with_ttl(cache::FEED_HEALTH_KEY, payload.clone(), FEED_HEALTH_TTL);

    Ok(ok(payload))
}
