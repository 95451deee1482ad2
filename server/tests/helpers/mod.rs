//! Reusable test helpers for HTTP integration tests.
//!
//! Builds application state either over a lazy pool (no infrastructure
//! needed; validation, rate limiting and SSE tests) or over the live test
//! database (`#[ignore]`d tests).

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use parallax_server::api::{create_router, AppState, AppStateConfig};
use parallax_server::config::Config;
use parallax_server::ingest::SourceCollector;
use parallax_server::llm::ScoreProvider;
use parallax_server::ratelimit::{RateLimitConfig, RateLimiter};

/// Build application state without touching the database.
///
/// The pool is lazy, so tests exercising validation, rate limiting and the
/// progress stream run without any infrastructure.
pub fn lazy_state(provider: Arc<dyn ScoreProvider>, rate_limit_rps: u32) -> AppState {
    let mut config = Config::default_for_test();
    config.rate_limit_rps = rate_limit_rps;

    let db = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");

    state_with(db, config, provider)
}

/// Build application state over a live database connection.
///
/// Requires the Docker test container documented on
/// `Config::default_for_test`; used by `#[ignore]`d tests only.
pub async fn db_state(provider: Arc<dyn ScoreProvider>) -> AppState {
    let config = Config::default_for_test();
    let db = PgPool::connect(&config.database_url)
        .await
        .expect("test database unavailable");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("migrations failed");

    state_with(db, config, provider)
}

fn state_with(db: PgPool, config: Config, provider: Arc<dyn ScoreProvider>) -> AppState {
    let rate_limiter = RateLimiter::new(RateLimitConfig {
        enabled: config.rate_limit_enabled,
        requests: config.rate_limit_rps,
        window_secs: config.rate_limit_window_secs,
        trust_proxy: false,
    });
    let collector = Arc::new(SourceCollector::new(db.clone()));

    AppState::new(AppStateConfig {
        db,
        config,
        provider,
        rate_limiter: Some(rate_limiter),
        collector,
    })
}

/// Router over the given state.
pub fn app(state: AppState) -> axum::Router {
    create_router(state)
}

/// Unique article URL so reruns against a dirty database cannot collide.
pub fn unique_url(prefix: &str) -> String {
    format!("https://example.com/{prefix}-{}", uuid::Uuid::new_v4())
}

/// Remove all rows between tests that share the database.
pub async fn reset_db(db: &PgPool) {
    sqlx::query("TRUNCATE feedback, llm_scores, articles, sources RESTART IDENTITY CASCADE")
        .execute(db)
        .await
        .expect("truncate failed");
}

/// Collect a response body into a string.
pub async fn body_string(response: axum::response::Response) -> String {
    use http_body_util::BodyExt;
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body read failed")
        .to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

/// Parse a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let text = body_string(response).await;
    serde_json::from_str(&text).unwrap_or_else(|_| panic!("invalid JSON body: {text}"))
}
