//! Database Queries
//!
//! Runtime-checked queries over the article/score store. Functions take
//! `impl PgExecutor` so the scoring pipeline can run them inside its own
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, QueryBuilder};

use super::models::{Article, Feedback, ModelScore, Source, SUMMARIZER_MODEL};

/// Political leaning bucket derived from `composite_score`.
///
/// Thresholds: left `s < -0.2`, center `-0.2 <= s <= 0.2`, right `s > 0.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaning {
    Left,
    Center,
    Right,
}

impl Leaning {
    /// Parse a query-string value ("left", "center", "right").
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Filters for the article listing.
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    pub source: Option<String>,
    pub leaning: Option<Leaning>,
    pub limit: i64,
    pub offset: i64,
}

/// Insert payload for a new article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source: String,
    pub pub_date: DateTime<Utc>,
    pub url: String,
    pub title: String,
    pub content: String,
}

/// Insert payload for feedback.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub article_id: i64,
    pub user_id: Option<String>,
    pub feedback_text: String,
    pub category: String,
    pub source: String,
}

/// Insert an article; returns `None` when the URL already exists.
pub async fn insert_article(
    ex: impl PgExecutor<'_>,
    article: &NewArticle,
) -> Result<Option<Article>, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        r"
        INSERT INTO articles (source, pub_date, url, title, content, status)
        VALUES ($1, $2, $3, $4, $5, 'pending')
        ON CONFLICT (url) DO NOTHING
        RETURNING id, source, pub_date, url, title, content,
                  composite_score, confidence, score_source, status, created_at
        ",
    )
    .bind(&article.source)
    .bind(article.pub_date)
    .bind(&article.url)
    .bind(&article.title)
    .bind(&article.content)
    .fetch_optional(ex)
    .await
}

/// Fetch one article by ID.
pub async fn find_article_by_id(
    ex: impl PgExecutor<'_>,
    article_id: i64,
) -> Result<Option<Article>, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        r"
        SELECT id, source, pub_date, url, title, content,
               composite_score, confidence, score_source, status, created_at
        FROM articles
        WHERE id = $1
        ",
    )
    .bind(article_id)
    .fetch_optional(ex)
    .await
}

/// List articles, newest publication first, with optional filters.
pub async fn list_articles(
    pool: &PgPool,
    filter: &ArticleFilter,
) -> Result<Vec<Article>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        "SELECT id, source, pub_date, url, title, content, \
         composite_score, confidence, score_source, status, created_at \
         FROM articles WHERE TRUE",
    );

    if let Some(ref source) = filter.source {
        builder.push(" AND source = ");
        builder.push_bind(source);
    }
    match filter.leaning {
        Some(Leaning::Left) => {
            builder.push(" AND composite_score < -0.2");
        }
        Some(Leaning::Center) => {
            builder.push(" AND composite_score >= -0.2 AND composite_score <= 0.2");
        }
        Some(Leaning::Right) => {
            builder.push(" AND composite_score > 0.2");
        }
        None => {}
    }
    builder.push(" ORDER BY pub_date DESC, id DESC LIMIT ");
    builder.push_bind(filter.limit);
    builder.push(" OFFSET ");
    builder.push_bind(filter.offset);

    builder.build_query_as::<Article>().fetch_all(pool).await
}

/// Write a composite score back to an article.
///
/// Returns the number of rows updated (0 when the article is gone).
pub async fn update_article_score(
    ex: impl PgExecutor<'_>,
    article_id: i64,
    composite_score: f64,
    confidence: f64,
    score_source: &str,
    status: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE articles
        SET composite_score = $2, confidence = $3, score_source = $4, status = $5
        WHERE id = $1
        ",
    )
    .bind(article_id)
    .bind(composite_score)
    .bind(confidence)
    .bind(score_source)
    .bind(status)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

/// Delete all model scores for one article, keeping stored summaries.
pub async fn delete_article_scores(
    ex: impl PgExecutor<'_>,
    article_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM llm_scores WHERE article_id = $1 AND model <> $2")
        .bind(article_id)
        .bind(SUMMARIZER_MODEL)
        .execute(ex)
        .await?;
    Ok(result.rows_affected())
}

/// Insert one model score row.
pub async fn insert_model_score(
    ex: impl PgExecutor<'_>,
    article_id: i64,
    model: &str,
    score: f64,
    metadata: &str,
) -> Result<ModelScore, sqlx::Error> {
    sqlx::query_as::<_, ModelScore>(
        r"
        INSERT INTO llm_scores (article_id, model, score, metadata)
        VALUES ($1, $2, $3, $4)
        RETURNING id, article_id, model, score, metadata, created_at
        ",
    )
    .bind(article_id)
    .bind(model)
    .bind(score)
    .bind(metadata)
    .fetch_one(ex)
    .await
}

/// List bias scores for one article, newest first. Summary rows excluded.
pub async fn list_model_scores(
    ex: impl PgExecutor<'_>,
    article_id: i64,
) -> Result<Vec<ModelScore>, sqlx::Error> {
    sqlx::query_as::<_, ModelScore>(
        r"
        SELECT id, article_id, model, score, metadata, created_at
        FROM llm_scores
        WHERE article_id = $1 AND model <> $2
        ORDER BY created_at DESC, id DESC
        ",
    )
    .bind(article_id)
    .bind(SUMMARIZER_MODEL)
    .fetch_all(ex)
    .await
}

/// List bias scores for a batch of articles (CSV export).
pub async fn list_model_scores_for_articles(
    ex: impl PgExecutor<'_>,
    article_ids: &[i64],
) -> Result<Vec<ModelScore>, sqlx::Error> {
    sqlx::query_as::<_, ModelScore>(
        r"
        SELECT id, article_id, model, score, metadata, created_at
        FROM llm_scores
        WHERE article_id = ANY($1) AND model <> $2
        ORDER BY article_id, created_at DESC, id DESC
        ",
    )
    .bind(article_ids)
    .bind(SUMMARIZER_MODEL)
    .fetch_all(ex)
    .await
}

/// Most recent stored summary for an article, if any.
pub async fn latest_summary(
    ex: impl PgExecutor<'_>,
    article_id: i64,
) -> Result<Option<ModelScore>, sqlx::Error> {
    sqlx::query_as::<_, ModelScore>(
        r"
        SELECT id, article_id, model, score, metadata, created_at
        FROM llm_scores
        WHERE article_id = $1 AND model = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        ",
    )
    .bind(article_id)
    .bind(SUMMARIZER_MODEL)
    .fetch_optional(ex)
    .await
}

/// Insert a feedback row.
pub async fn insert_feedback(
    ex: impl PgExecutor<'_>,
    feedback: &NewFeedback,
) -> Result<Feedback, sqlx::Error> {
    sqlx::query_as::<_, Feedback>(
        r"
        INSERT INTO feedback (article_id, user_id, feedback_text, category, source)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, article_id, user_id, feedback_text, category, source, created_at
        ",
    )
    .bind(feedback.article_id)
    .bind(&feedback.user_id)
    .bind(&feedback.feedback_text)
    .bind(&feedback.category)
    .bind(&feedback.source)
    .fetch_one(ex)
    .await
}

/// List all configured sources, enabled first.
pub async fn list_sources(ex: impl PgExecutor<'_>) -> Result<Vec<Source>, sqlx::Error> {
    sqlx::query_as::<_, Source>(
        r"
        SELECT id, name, channel_type, feed_url, category, enabled, default_weight,
               error_streak, last_fetched_at, metadata, created_at, updated_at
        FROM sources
        ORDER BY enabled DESC, name
        ",
    )
    .fetch_all(ex)
    .await
}

/// Mark all enabled sources as fetched now and clear their error streaks.
pub async fn touch_enabled_sources(ex: impl PgExecutor<'_>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE sources
        SET last_fetched_at = NOW(), error_streak = 0, updated_at = NOW()
        WHERE enabled = TRUE
        ",
    )
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

/// IDs of the most recent articles within a publication window.
pub async fn recent_article_ids(
    ex: impl PgExecutor<'_>,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT id FROM articles WHERE pub_date >= $1 ORDER BY pub_date DESC, id DESC LIMIT $2",
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(ex)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Delete model scores belonging to articles created before the cutoff.
pub async fn delete_scores_older_than(
    ex: impl PgExecutor<'_>,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM llm_scores WHERE article_id IN (SELECT id FROM articles WHERE created_at < $1)",
    )
    .bind(cutoff)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}

/// Delete articles created before the cutoff.
pub async fn delete_articles_older_than(
    ex: impl PgExecutor<'_>,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM articles WHERE created_at < $1")
        .bind(cutoff)
        .execute(ex)
        .await?;
    Ok(result.rows_affected())
}

/// Article counts grouped by lifecycle status.
pub async fn count_articles_by_status(
    ex: impl PgExecutor<'_>,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as("SELECT status, COUNT(*) FROM articles GROUP BY status")
        .fetch_all(ex)
        .await
}

/// Scored-article counts bucketed by leaning: (left, center, right).
pub async fn leaning_buckets(ex: impl PgExecutor<'_>) -> Result<(i64, i64, i64), sqlx::Error> {
    let row: (i64, i64, i64) = sqlx::query_as(
        r"
        SELECT
            COUNT(*) FILTER (WHERE composite_score < -0.2),
            COUNT(*) FILTER (WHERE composite_score >= -0.2 AND composite_score <= 0.2),
            COUNT(*) FILTER (WHERE composite_score > 0.2)
        FROM articles
        WHERE composite_score IS NOT NULL
        ",
    )
    .fetch_one(ex)
    .await?;
    Ok(row)
}

/// Total feedback rows.
pub async fn count_feedback(ex: impl PgExecutor<'_>) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feedback")
        .fetch_one(ex)
        .await?;
    Ok(row.0)
}

/// Total configured sources.
pub async fn count_sources(ex: impl PgExecutor<'_>) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sources")
        .fetch_one(ex)
        .await?;
    Ok(row.0)
}
