//! API Router and Application State
//!
//! Central routing configuration, shared state and the middleware chain:
//! request-id, CORS, structured request logging, panic recovery and rate
//! limiting, outermost first.

pub mod articles;
pub mod error;
pub mod feedback;
pub mod feeds;
pub mod progress;
pub mod sources;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, Request, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::FutureExt;
use serde::Serialize;
use sqlx::PgPool;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any as CorsAny, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use utoipa::OpenApi;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::ingest::FeedCollector;
use crate::internal::InternalApi;
use crate::llm::ScoreProvider;
use crate::ratelimit::{rate_limit, RateLimiter};
use crate::scoring::{ProgressTracker, ScoringService};
use crate::util::{mask_token, sanitize_message};
use crate::{admin, pages};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Server configuration
    pub config: Arc<Config>,
    /// Response cache for expensive GETs
    pub cache: Arc<ResponseCache>,
    /// Progress tracker for in-flight scoring runs
    pub tracker: Arc<ProgressTracker>,
    /// Scoring pipeline orchestrator
    pub scoring: ScoringService,
    /// Rate limiter (optional; disabled via configuration)
    pub rate_limiter: Option<Arc<RateLimiter>>,
    /// Feed ingestion backend
    pub collector: Arc<dyn FeedCollector>,
    /// In-process read façade for page rendering
    pub internal: InternalApi,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

/// Configuration for creating a new [`AppState`].
pub struct AppStateConfig {
    pub db: PgPool,
    pub config: Config,
    pub provider: Arc<dyn ScoreProvider>,
    pub rate_limiter: Option<RateLimiter>,
    pub collector: Arc<dyn FeedCollector>,
}

impl AppState {
    /// Create new application state, wiring the tracker and cache into
    /// every component that needs them.
    #[must_use]
    pub fn new(cfg: AppStateConfig) -> Self {
        let config = Arc::new(cfg.config);
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(
            config.cache_ttl_secs,
        )));
        let tracker = Arc::new(ProgressTracker::new(Duration::from_secs(
            config.progress_ttl_secs,
        )));

        let scoring = ScoringService::new(
            cfg.db.clone(),
            cfg.provider,
            Arc::clone(&tracker),
            Arc::clone(&cache),
            config.score_config_path.clone(),
            config.pipeline_deadline(),
        );

        let internal = InternalApi::new(cfg.db.clone(), Arc::clone(&cache));

        Self {
            db: cfg.db,
            config,
            cache,
            tracker,
            scoring,
            rate_limiter: cfg.rate_limiter.map(Arc::new),
            collector: cfg.collector,
            internal,
        }
    }

    /// Check if rate limiting is active.
    #[must_use]
    pub const fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    // Configure CORS based on allowed origins
    // In production, set CORS_ALLOWED_ORIGINS to specific origins
    let cors = if state.config.cors_allowed_origins.iter().any(|o| o == "*") {
        // Development mode: allow any origin
        CorsLayer::new()
            .allow_origin(CorsAny)
            .allow_methods(CorsAny)
            .allow_headers(CorsAny)
    } else {
        use axum::http::{header, HeaderName, Method};
        let origins: Vec<_> = state
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| {
                if let Ok(origin) = o.parse() {
                    Some(origin)
                } else {
                    tracing::warn!(origin = %o, "Invalid CORS origin in configuration, skipping");
                    None
                }
            })
            .collect();

        if origins.is_empty() {
            tracing::error!(
                "No valid CORS origins configured! All cross-origin requests will fail."
            );
        }

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                HeaderName::from_static("x-api-key"),
                HeaderName::from_static("x-request-id"),
            ])
    };

    let api_routes = Router::new()
        .route(
            "/api/articles",
            get(articles::list_articles).post(articles::create_article),
        )
        .route("/api/articles/{id}", get(articles::get_article))
        .route("/api/articles/{id}/bias", get(articles::get_bias))
        .route("/api/articles/{id}/ensemble", get(articles::get_ensemble))
        .route("/api/articles/{id}/summary", get(articles::get_summary))
        .route("/api/llm/reanalyze/{id}", post(articles::reanalyze))
        .route("/api/manual-score/{id}", post(articles::manual_score))
        .route(
            "/api/llm/score-progress/{id}",
            get(progress::score_progress),
        )
        .route("/api/refresh", post(feeds::refresh))
        .route("/api/feeds/healthz", get(feeds::feed_health))
        .route("/api/feedback", post(feedback::create_feedback))
        .route("/api/sources", get(sources::list_sources))
        .nest("/api/admin", admin::router());

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .merge(api_routes)
        // Server-rendered pages
        .merge(pages::router())
        // API documentation
        .merge(api_docs(state.config.enable_api_docs))
        // Middleware (the last layer runs outermost): request-id → CORS →
        // logging → panic recovery → rate limiter → handler
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn(recover_panics))
        .layer(from_fn(log_requests))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        // State
        .with_state(state)
}

/// Structured request log with API-key masking.
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let api_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(mask_token);

    let start = std::time::Instant::now();
    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        api_key = api_key.as_deref().unwrap_or("-"),
        "request completed"
    );
    response
}

/// Convert handler panics into a generic 500 envelope.
///
/// Reads the request id before handing the request on, so the one log
/// line carrying the panic detail is correlated like every other request
/// log. The client only sees a generic message.
async fn recover_panics(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => handle_panic(&request_id, panic),
    }
}

/// The panic payload is logged once here, with the request id.
fn handle_panic(request_id: &str, err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(
        request_id = %request_id,
        panic = %sanitize_message(&detail),
        "Request handler panicked"
    );

    let body = serde_json::json!({
        "success": false,
        "error": { "code": "internal_error", "message": "Internal server error" }
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Health check response.
#[derive(Serialize, utoipa::ToSchema)]
pub(crate) struct HealthResponse {
    /// Overall service status ("ok" or "degraded")
    status: &'static str,
    /// Database connectivity status
    database: bool,
    /// Whether rate limiting is enabled
    rate_limiting: bool,
}

/// Health check endpoint.
///
/// Verifies database connectivity; returns "degraded" when the store is
/// unreachable.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse),
    ),
)]
pub(crate) async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        database: db_ok,
        rate_limiting: state.has_rate_limiter(),
    })
}

/// API documentation routes.
///
/// Serves the OpenAPI document at `/api/docs/openapi.json` when enabled
/// via the `ENABLE_API_DOCS` env var. Defaults to enabled in debug builds,
/// disabled in release builds.
fn api_docs(enable: bool) -> Router<AppState> {
    if !enable {
        return Router::new();
    }
    Router::new().route(
        "/api/docs/openapi.json",
        get(|| async { Json(crate::openapi::ApiDoc::openapi()) }),
    )
}
