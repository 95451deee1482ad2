//! Internal API Adapter
//!
//! In-process façade over the same read operations the HTTP handlers use,
//! consumed by server-rendered pages. Shares the pool and cache with the
//! HTTP layer; never re-opens connections or re-issues HTTP.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::ResponseCache;
use crate::db::{self, Article, ArticleFilter, ModelScore};

/// Read-side façade for in-process callers.
#[derive(Clone)]
pub struct InternalApi {
    db: PgPool,
    cache: Arc<ResponseCache>,
}

impl InternalApi {
    /// Wire the adapter over the shared store and cache.
    #[must_use]
    pub const fn new(db: PgPool, cache: Arc<ResponseCache>) -> Self {
        Self { db, cache }
    }

    /// List articles with the same filter semantics as `GET /api/articles`.
    pub async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>, sqlx::Error> {
        db::list_articles(&self.db, filter).await
    }

    /// One article with its model scores, or `None`.
    pub async fn article_with_scores(
        &self,
        article_id: i64,
    ) -> Result<Option<(Article, Vec<ModelScore>)>, sqlx::Error> {
        let Some(article) = db::find_article_by_id(&self.db, article_id).await? else {
            return Ok(None);
        };
        let scores = db::list_model_scores(&self.db, article_id).await?;
        Ok(Some((article, scores)))
    }

    /// The shared response cache (pages reuse cached feed health).
    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }
}
