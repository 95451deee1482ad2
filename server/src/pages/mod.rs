//! Server-rendered pages module.
//!
//! Minimal HTML views over the article store, rendered through the
//! internal API adapter so they share the pool and cache with the HTTP
//! handlers.

pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::api::AppState;

/// Create the pages router, mounted at the root.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/articles", get(handlers::articles_page))
        .route("/articles/{id}", get(handlers::article_detail_page))
}
