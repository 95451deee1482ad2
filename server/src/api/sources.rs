//! Source HTTP Handlers

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::api::error::{ok, ApiResponse, AppError};
use crate::api::AppState;
use crate::cache;
use crate::db;

/// List configured ingestion sources.
///
/// GET /api/sources
#[utoipa::path(
    get,
    path = "/api/sources",
    tag = "sources",
    responses(
        (status = 200, description = "Configured sources"),
    ),
)]
pub async fn list_sources(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if let Some(cached) = state.cache.get(cache::SOURCES_KEY) {
        return Ok(ok(cached));
    }

    let sources = db::list_sources(&state.db).await?;
    let payload =
        serde_json::to_value(&sources).map_err(|e| AppError::Internal(e.to_string()))?;
    state.cache.insert(cache::SOURCES_KEY, payload.clone());

    Ok(ok(payload))
}
