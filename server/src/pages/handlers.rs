//! Handlers for server-rendered article pages.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use tracing::error;

use crate::api::AppState;
use crate::db::{Article, ArticleFilter, ModelScore};
use crate::util::html_escape;

/// Error response type for page handlers.
type PageResult<T> = Result<T, (StatusCode, String)>;

const PAGE_LIST_LIMIT: i64 = 50;

/// Render the article list.
///
/// GET /articles
pub async fn articles_page(State(state): State<AppState>) -> PageResult<Html<String>> {
    let filter = ArticleFilter {
        source: None,
        leaning: None,
        limit: PAGE_LIST_LIMIT,
        offset: 0,
    };

    let articles = state.internal.list_articles(&filter).await.map_err(|e| {
        error!("Failed to list articles for page: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    })?;

    let mut rows = String::new();
    for article in &articles {
        rows.push_str(&format!(
            "<tr><td><a href=\"/articles/{id}\">{title}</a></td>\
             <td>{source}</td><td>{score}</td><td>{status}</td></tr>\n",
            id = article.id,
            title = html_escape(&article.title),
            source = html_escape(&article.source),
            score = render_score(article.composite_score),
            status = html_escape(&article.status),
        ));
    }

    Ok(Html(page(
        "Articles",
        &format!(
            "<table>\
             <tr><th>Title</th><th>Source</th><th>Bias</th><th>Status</th></tr>\n{rows}</table>"
        ),
    )))
}

/// Render one article with its model scores.
///
/// GET /articles/{id}
pub async fn article_detail_page(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
) -> PageResult<Html<String>> {
    let Some((article, scores)) =
        state
            .internal
            .article_with_scores(article_id)
            .await
            .map_err(|e| {
                error!("Failed to load article {} for page: {}", article_id, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            })?
    else {
        return Err((StatusCode::NOT_FOUND, "Article not found".to_string()));
    };

    Ok(Html(page(&article.title, &render_article(&article, &scores))))
}

fn render_article(article: &Article, scores: &[ModelScore]) -> String {
    let mut score_rows = String::new();
    for score in scores {
        score_rows.push_str(&format!(
            "<tr><td>{model}</td><td>{score:.3}</td></tr>\n",
            model = html_escape(&score.model),
            score = score.score,
        ));
    }

    format!(
        "<h2>{title}</h2>\
         <p class=\"meta\">{source} — {date}</p>\
         <p>Composite bias: {composite} (confidence {confidence})</p>\
         <table><tr><th>Model</th><th>Score</th></tr>\n{score_rows}</table>\
         <article>{content}</article>\
         <p><a href=\"/articles\">Back to list</a></p>",
        title = html_escape(&article.title),
        source = html_escape(&article.source),
        date = article.pub_date.format("%Y-%m-%d %H:%M UTC"),
        composite = render_score(article.composite_score),
        confidence = render_score(article.confidence),
        content = html_escape(&article.content),
    )
}

fn render_score(score: Option<f64>) -> String {
    score.map_or_else(|| "—".to_string(), |s| format!("{s:.3}"))
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <title>{title} — Parallax</title>\
         <style>body{{font-family:sans-serif;max-width:60rem;margin:2rem auto}}\
         table{{border-collapse:collapse}}td,th{{border:1px solid #ccc;padding:0.3rem 0.6rem}}\
         .meta{{color:#666}}</style>\
         </head><body><h1>Parallax</h1>{body}</body></html>",
        title = html_escape(title),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_score_handles_null() {
        assert_eq!(render_score(None), "—");
        assert_eq!(render_score(Some(0.5)), "0.500");
    }

    #[test]
    fn test_page_escapes_title() {
        let html = page("<script>", "body");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
