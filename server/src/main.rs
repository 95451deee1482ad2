//! Parallax Server - Main Entry Point
//!
//! News bias scoring backend.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use parallax_server::api::{self, AppStateConfig};
use parallax_server::config::Config;
use parallax_server::db;
use parallax_server::ingest::SourceCollector;
use parallax_server::llm::{HttpScoreClient, MockProvider, ScoreProvider};
use parallax_server::ratelimit::{RateLimitConfig, RateLimiter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parallax_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Parallax Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    // LLM provider: live client when configured, otherwise a stub that
    // fails pipelines fast with a clear error
    let provider: Arc<dyn ScoreProvider> = match (&config.llm_api_base_url, &config.llm_api_key) {
        (Some(base_url), Some(api_key)) => {
            let client = HttpScoreClient::new(base_url, api_key, config.llm_timeout());
            match client.validate_api_key().await {
                Ok(()) => info!(base_url = %base_url, "LLM provider connected"),
                Err(e) => warn!("LLM API key validation failed: {}. Scoring may fail.", e),
            }
            Arc::new(client)
        }
        _ => {
            warn!("LLM_API_BASE_URL / LLM_API_KEY not set. Scoring disabled.");
            Arc::new(MockProvider::unavailable())
        }
    };

    // Rate limiter
    let rate_limiter = if config.rate_limit_enabled {
        Some(RateLimiter::new(RateLimitConfig::from_server_config(
            &config,
        )))
    } else {
        None
    };

    // Feed collector
    let collector = Arc::new(SourceCollector::new(db_pool.clone()));

    let progress_sweep = Duration::from_secs(config.progress_sweep_secs);
    let rate_limit_window = Duration::from_secs(config.rate_limit_window_secs);

    // Build application state
    let state = api::AppState::new(AppStateConfig {
        db: db_pool,
        config,
        provider,
        rate_limiter,
        collector,
    });

    // Background sweepers: progress TTL eviction and rate-limit window cleanup
    state.tracker.spawn_sweeper(progress_sweep);
    if let Some(limiter) = state.rate_limiter.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(rate_limit_window);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                limiter.sweep();
            }
        });
    }

    // Build router
    let app = api::create_router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&state.config.bind_address).await?;
    info!(address = %state.config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("Server shutdown complete");

    Ok(())
}
