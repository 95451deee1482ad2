//! Admin Operations Module
//!
//! One-shot maintenance actions, each bounded by its own deadline.

pub mod export;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::api::AppState;

/// Create the admin router, mounted under `/api/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vacuum", post(handlers::vacuum))
        .route("/cleanup", post(handlers::cleanup))
        .route("/reanalyze-recent", post(handlers::reanalyze_recent))
        .route("/metrics", get(handlers::metrics))
        .route("/export", get(export::export_csv))
}
