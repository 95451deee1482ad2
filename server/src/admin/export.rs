//! CSV Export
//!
//! Streams the article table as a CSV attachment with per-model scores
//! folded into one column.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::api::error::AppError;
use crate::api::AppState;
use crate::db::{self, Article, ModelScore};

/// Deadline for the export queries and formatting.
const EXPORT_DEADLINE: Duration = Duration::from_secs(120);

/// Upper bound of exported rows.
const EXPORT_LIMIT: i64 = 10_000;

/// Export articles as CSV.
///
/// GET /api/admin/export
#[utoipa::path(
    get,
    path = "/api/admin/export",
    tag = "admin",
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
    ),
)]
pub async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let work = async {
        let articles = db::list_articles(
            &state.db,
            &db::ArticleFilter {
                source: None,
                leaning: None,
                limit: EXPORT_LIMIT,
                offset: 0,
            },
        )
        .await?;

        let ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
        let scores = db::list_model_scores_for_articles(&state.db, &ids).await?;
        Ok::<_, sqlx::Error>((articles, scores))
    };

    let (articles, scores) = tokio::time::timeout(EXPORT_DEADLINE, work)
        .await
        .map_err(|_| AppError::Internal("export exceeded its deadline".to_string()))??;

    let csv = build_csv(&articles, &scores);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"articles_export.csv\"",
            ),
        ],
        csv,
    ))
}

/// Render articles and their scores as CSV.
///
/// Columns: `ID, Title, Source, URL, PubDate, BiasScore, Confidence,
/// Status, LLMScores`. Numeric fields use three decimals and are empty
/// when null; `LLMScores` is `model:score` pairs joined by `,`.
pub fn build_csv(articles: &[Article], scores: &[ModelScore]) -> String {
    let mut by_article: HashMap<i64, Vec<&ModelScore>> = HashMap::new();
    for score in scores {
        by_article.entry(score.article_id).or_default().push(score);
    }

    let mut out = String::new();
    out.push_str("ID,Title,Source,URL,PubDate,BiasScore,Confidence,Status,LLMScores\n");

    for article in articles {
        let llm_scores = by_article
            .get(&article.id)
            .map(|scores| {
                scores
                    .iter()
                    .map(|s| format!("{}:{}", s.model, format_score(Some(s.score))))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();

        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            article.id,
            csv_field(&article.title),
            csv_field(&article.source),
            csv_field(&article.url),
            article.pub_date.to_rfc3339(),
            format_score(article.composite_score),
            format_score(article.confidence),
            csv_field(&article.status),
            csv_field(&llm_scores),
        ));
    }

    out
}

/// Three-decimal rendering; empty for null.
fn format_score(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| format!("{v:.3}"))
}

/// Quote a CSV field when it contains separators, quotes or newlines.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(id: i64, score: Option<f64>) -> Article {
        Article {
            id,
            source: "CNN".to_string(),
            pub_date: Utc.with_ymd_and_hms(2025, 4, 30, 12, 0, 0).unwrap(),
            url: format!("https://example.com/{id}"),
            title: format!("Article {id}"),
            content: "body".to_string(),
            composite_score: score,
            confidence: score.map(|_| 0.75),
            score_source: score.map(|_| "llm".to_string()),
            status: "analyzed".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 4, 30, 12, 0, 0).unwrap(),
        }
    }

    fn model_score(article_id: i64, model: &str, value: f64) -> ModelScore {
        ModelScore {
            id: 1,
            article_id,
            model: model.to_string(),
            score: value,
            metadata: "{}".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 4, 30, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_header_row() {
        let csv = build_csv(&[], &[]);
        assert_eq!(
            csv.trim_end(),
            "ID,Title,Source,URL,PubDate,BiasScore,Confidence,Status,LLMScores"
        );
    }

    #[test]
    fn test_scores_use_three_decimals() {
        let csv = build_csv(&[article(1, Some(0.5))], &[]);
        assert!(csv.contains(",0.500,0.750,"), "csv was: {csv}");
    }

    #[test]
    fn test_null_scores_render_empty() {
        let csv = build_csv(&[article(1, None)], &[]);
        assert!(csv.contains(",,,analyzed,"), "csv was: {csv}");
    }

    #[test]
    fn test_llm_scores_are_joined_pairs() {
        let scores = vec![
            model_score(1, "model-a", -0.25),
            model_score(1, "model-b", 0.5),
        ];
        let csv = build_csv(&[article(1, Some(0.1))], &scores);
        assert!(
            csv.contains("\"model-a:-0.250,model-b:0.500\""),
            "csv was: {csv}"
        );
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let mut a = article(1, None);
        a.title = "Hello, world".to_string();
        let csv = build_csv(&[a], &[]);
        assert!(csv.contains("\"Hello, world\""));
    }

    #[test]
    fn test_quotes_are_doubled() {
        let mut a = article(1, None);
        a.title = "He said \"hi\"".to_string();
        let csv = build_csv(&[a], &[]);
        assert!(csv.contains("\"He said \"\"hi\"\"\""));
    }
}
