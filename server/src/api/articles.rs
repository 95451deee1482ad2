//! Article HTTP Handlers
//!
//! CRUD, per-model bias views, reanalysis triggering and the manual-score
//! override.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::api::error::{created, ok, parse_id, ApiResponse, AppError};
use crate::api::AppState;
use crate::cache;
use crate::db::{self, Article, ModelScore};
use crate::scoring::ProgressRecord;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

// ============================================================================
// Request / response types
// ============================================================================

/// Create-article payload. Unknown fields are rejected.
#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateArticleRequest {
    /// Source name (e.g., "CNN").
    #[validate(custom(function = "validate_not_blank"))]
    pub source: String,
    /// Publication time, RFC 3339.
    #[validate(custom(function = "validate_rfc3339"))]
    pub pub_date: String,
    /// Canonical URL, http(s) only.
    #[validate(custom(function = "validate_http_url"))]
    pub url: String,
    /// Article title.
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    /// Article body text.
    #[validate(custom(function = "validate_not_blank"))]
    pub content: String,
}

/// Manual-score payload. Unknown fields are rejected.
#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ManualScoreRequest {
    /// Composite score to persist, in [-1, 1].
    #[validate(range(min = -1.0, max = 1.0, message = "score must be between -1.0 and 1.0"))]
    pub score: f64,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank"))
    } else {
        Ok(())
    }
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::new("must_start_with_http_or_https"))
    }
}

fn validate_rfc3339(date: &str) -> Result<(), ValidationError> {
    if DateTime::parse_from_rfc3339(date).is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("not_rfc3339"))
    }
}

/// List query parameters, parsed strictly.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListArticlesParams {
    pub source: Option<String>,
    pub leaning: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Bias query parameters, parsed strictly.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BiasParams {
    pub min_score: Option<String>,
    pub max_score: Option<String>,
    pub sort: Option<String>,
}

/// Article plus its per-model scores.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ArticleWithScores {
    #[serde(flatten)]
    pub article: Article,
    pub model_scores: Vec<ModelScore>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List articles with optional source/leaning filters.
///
/// GET /api/articles
#[utoipa::path(
    get,
    path = "/api/articles",
    tag = "articles",
    params(
        ("source" = Option<String>, Query, description = "Filter by source name"),
        ("leaning" = Option<String>, Query, description = "left, center or right"),
        ("limit" = Option<i64>, Query, description = "Page size, 1-100"),
        ("offset" = Option<i64>, Query, description = "Rows to skip"),
    ),
    responses(
        (status = 200, description = "Articles matching the filters"),
        (status = 400, description = "Invalid filter value"),
    ),
)]
pub async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ListArticlesParams>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let filter = parse_list_filter(&params)?;

    let cache_key = format!(
        "{}:{}:{}:{}:{}",
        cache::ARTICLE_LIST_PREFIX,
        filter.source.as_deref().unwrap_or(""),
        params.leaning.as_deref().unwrap_or(""),
        filter.limit,
        filter.offset,
    );
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(ok(cached));
    }

    let articles = db::list_articles(&state.db, &filter).await?;
    let payload = serde_json::to_value(&articles)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    state.cache.insert(cache_key, payload.clone());

    Ok(ok(payload))
}

/// Create an article.
///
/// POST /api/articles
#[utoipa::path(
    post,
    path = "/api/articles",
    tag = "articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Article created"),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "URL already exists"),
    ),
)]
pub async fn create_article(
    State(state): State<AppState>,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Article>>), AppError> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let article = to_new_article(&request)?;

    let inserted = db::insert_article(&state.db, &article)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(format!("article with URL {} already exists", article.url))
        })?;

    state.cache.invalidate_prefix(cache::ARTICLE_LIST_PREFIX);

    Ok(created(inserted))
}

/// One article with its model scores.
///
/// GET /api/articles/{id}
#[utoipa::path(
    get,
    path = "/api/articles/{id}",
    tag = "articles",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article with model scores"),
        (status = 400, description = "Invalid ID"),
        (status = 404, description = "Article not found"),
    ),
)]
pub async fn get_article(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let article_id = parse_id(&raw_id)?;

    let cache_key = cache::article_key(article_id);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(ok(cached));
    }

    let article = db::find_article_by_id(&state.db, article_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article {article_id} not found")))?;
    let model_scores = db::list_model_scores(&state.db, article_id).await?;

    let payload = serde_json::to_value(ArticleWithScores {
        article,
        model_scores,
    })
    .map_err(|e| AppError::Internal(e.to_string()))?;
    state.cache.insert(cache_key, payload.clone());

    Ok(ok(payload))
}

/// Composite score plus filtered, sorted per-model scores.
///
/// GET /api/articles/{id}/bias
#[utoipa::path(
    get,
    path = "/api/articles/{id}/bias",
    tag = "articles",
    params(
        ("id" = i64, Path, description = "Article ID"),
        ("min_score" = Option<f64>, Query, description = "Drop scores below this"),
        ("max_score" = Option<f64>, Query, description = "Drop scores above this"),
        ("sort" = Option<String>, Query, description = "asc or desc"),
    ),
    responses(
        (status = 200, description = "Composite and per-model scores"),
        (status = 400, description = "Invalid ID or filter"),
    ),
)]
pub async fn get_bias(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(params): Query<BiasParams>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let article_id = parse_id(&raw_id)?;
    let (min_score, max_score, ascending) = parse_bias_params(&params)?;

    let article = db::find_article_by_id(&state.db, article_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article {article_id} not found")))?;

    let mut scores = db::list_model_scores(&state.db, article_id).await?;
    scores.retain(|s| {
        min_score.is_none_or(|min| s.score >= min) && max_score.is_none_or(|max| s.score <= max)
    });
    if let Some(ascending) = ascending {
        scores.sort_by(|a, b| {
            let ordering = a.score.total_cmp(&b.score);
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }

    Ok(ok(json!({
        "article_id": article_id,
        "composite_score": article.composite_score,
        "confidence": article.confidence,
        "score_source": article.score_source,
        "status": article.status,
        "scores": scores,
    })))
}

/// Raw ensemble record: sub-results plus aggregation metadata.
///
/// GET /api/articles/{id}/ensemble
#[utoipa::path(
    get,
    path = "/api/articles/{id}/ensemble",
    tag = "articles",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Ensemble record"),
        (status = 404, description = "Article not found"),
    ),
)]
pub async fn get_ensemble(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let article_id = parse_id(&raw_id)?;

    let article = db::find_article_by_id(&state.db, article_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article {article_id} not found")))?;
    let scores = db::list_model_scores(&state.db, article_id).await?;
    let config = state.scoring.load_score_config()?;

    let weights: Value = config
        .models
        .iter()
        .map(|m| (m.model_name.clone(), json!(m.weight)))
        .collect::<serde_json::Map<_, _>>()
        .into();

    Ok(ok(json!({
        "article_id": article_id,
        "sub_results": scores,
        "aggregation": {
            "method": "weighted_mean",
            "composite_score": article.composite_score,
            "confidence": article.confidence,
            "min_score": config.min_score,
            "max_score": config.max_score,
            "model_weights": weights,
        },
    })))
}

/// Stored article summary.
///
/// GET /api/articles/{id}/summary
#[utoipa::path(
    get,
    path = "/api/articles/{id}/summary",
    tag = "articles",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Stored summary"),
        (status = 404, description = "No summary stored"),
    ),
)]
pub async fn get_summary(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let article_id = parse_id(&raw_id)?;

    let row = db::latest_summary(&state.db, article_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no summary for article {article_id}")))?;

    Ok(ok(json!({
        "article_id": article_id,
        "summary": summary_text(&row.metadata),
        "created_at": row.created_at,
    })))
}

/// Enqueue a scoring pipeline run.
///
/// POST /api/llm/reanalyze/{id}
///
/// The body must be empty or a JSON object without a `score` field; direct
/// score writes go through the manual-score endpoint instead.
#[utoipa::path(
    post,
    path = "/api/llm/reanalyze/{id}",
    tag = "llm",
    params(("id" = i64, Path, description = "Article ID")),
    request_body = Vec<u8>,
    responses(
        (status = 200, description = "Pipeline run queued"),
        (status = 400, description = "Invalid ID or body contains a score field"),
        (status = 503, description = "LLM configuration unavailable"),
    ),
)]
pub async fn reanalyze(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let article_id = parse_id(&raw_id)?;
    reject_score_field(&body)?;

    db::find_article_by_id(&state.db, article_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article {article_id} not found")))?;

    // Fail fast with 503 when the scoring stack cannot even be configured.
    state.scoring.load_score_config()?;

    state.tracker.set(ProgressRecord::queued(article_id));
    state.scoring.spawn_analysis(article_id);

    Ok(ok(json!({
        "status": "reanalyze queued",
        "article_id": article_id,
    })))
}

/// Directly set an article's composite score.
///
/// POST /api/manual-score/{id}
#[utoipa::path(
    post,
    path = "/api/manual-score/{id}",
    tag = "llm",
    params(("id" = i64, Path, description = "Article ID")),
    request_body = ManualScoreRequest,
    responses(
        (status = 200, description = "Score updated"),
        (status = 400, description = "Invalid ID or score"),
        (status = 404, description = "Article not found"),
    ),
)]
pub async fn manual_score(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<ManualScoreRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Article>>, AppError> {
    let article_id = parse_id(&raw_id)?;
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let article = state
        .scoring
        .apply_manual_score(article_id, request.score)
        .await?;

    Ok(ok(article))
}

// ============================================================================
// Validation helpers
// ============================================================================

fn parse_list_filter(params: &ListArticlesParams) -> Result<db::ArticleFilter, AppError> {
    let limit = match &params.limit {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|l| (1..=MAX_LIST_LIMIT).contains(l))
            .ok_or_else(|| {
                AppError::Validation(format!("limit must be between 1 and {MAX_LIST_LIMIT}"))
            })?,
        None => DEFAULT_LIST_LIMIT,
    };

    let offset = match &params.offset {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|o| *o >= 0)
            .ok_or_else(|| AppError::Validation("offset must be non-negative".to_string()))?,
        None => 0,
    };

    let leaning = match &params.leaning {
        Some(raw) => Some(db::Leaning::parse(raw).ok_or_else(|| {
            AppError::Validation("leaning must be one of left, center, right".to_string())
        })?),
        None => None,
    };

    Ok(db::ArticleFilter {
        source: params.source.clone().filter(|s| !s.is_empty()),
        leaning,
        limit,
        offset,
    })
}

/// Convert a validated request into the insert payload.
fn to_new_article(request: &CreateArticleRequest) -> Result<db::NewArticle, AppError> {
    let pub_date = DateTime::parse_from_rfc3339(&request.pub_date)
        .map_err(|_| AppError::Validation("pub_date must be RFC 3339".to_string()))?
        .to_utc();

    Ok(db::NewArticle {
        source: request.source.trim().to_string(),
        pub_date,
        url: request.url.clone(),
        title: request.title.trim().to_string(),
        content: request.content.clone(),
    })
}

fn parse_bias_params(params: &BiasParams) -> Result<(Option<f64>, Option<f64>, Option<bool>), AppError> {
    let min_score = parse_score_bound(params.min_score.as_deref(), "min_score")?;
    let max_score = parse_score_bound(params.max_score.as_deref(), "max_score")?;
    if let (Some(min), Some(max)) = (min_score, max_score) {
        if min > max {
            return Err(AppError::Validation(
                "min_score must not exceed max_score".to_string(),
            ));
        }
    }

    let ascending = match params.sort.as_deref() {
        None => None,
        Some("asc") => Some(true),
        Some("desc") => Some(false),
        Some(_) => {
            return Err(AppError::Validation(
                "sort must be asc or desc".to_string(),
            ))
        }
    };

    Ok((min_score, max_score, ascending))
}

fn parse_score_bound(raw: Option<&str>, name: &str) -> Result<Option<f64>, AppError> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("{name} must be a number"))),
    }
}

/// Reject reanalyze bodies that smuggle a direct score update.
///
/// Empty bodies are fine; JSON objects must not contain a `score` field.
fn reject_score_field(body: &[u8]) -> Result<(), AppError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| AppError::Validation("request body must be UTF-8".to_string()))?;
    if text.trim().is_empty() {
        return Ok(());
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|_| AppError::Validation("request body must be empty or valid JSON".to_string()))?;

    if value.get("score").is_some() {
        return Err(AppError::Validation(
            "reanalyze does not accept a score field; use POST /api/manual-score/{id}".to_string(),
        ));
    }

    Ok(())
}

/// Extract summary text from an opaque summarizer metadata blob.
fn summary_text(metadata: &str) -> String {
    serde_json::from_str::<Value>(metadata)
        .ok()
        .and_then(|v| v.get("summary").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| metadata.to_string())
}
