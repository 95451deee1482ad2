//! Scoring pipeline integration tests against the live test database.
//!
//! Requires the `PostgreSQL` docker container from
//! `Config::default_for_test`. Run with:
//! `cargo test --test pipeline_test -- --ignored`

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serial_test::serial;
use tower::ServiceExt;

use parallax_server::db;
use parallax_server::llm::{MockOutcome, MockProvider};
use parallax_server::scoring::ProgressStatus;

use helpers::{app, body_json, db_state, reset_db, unique_url};

/// The three models of the compiled-in default score configuration.
const DEFAULT_MODELS: [&str; 3] = [
    "openai/gpt-4o-mini",
    "anthropic/claude-3-5-haiku",
    "google/gemini-2.0-flash",
];

async fn insert_article(state: &parallax_server::api::AppState, url: &str) -> i64 {
    let article = db::insert_article(
        &state.db,
        &db::NewArticle {
            source: "CNN".to_string(),
            pub_date: chrono::Utc::now(),
            url: url.to_string(),
            title: "T".to_string(),
            content: "C".to_string(),
        },
    )
    .await
    .unwrap()
    .expect("insert conflict");
    article.id
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn successful_run_persists_composite_and_scores() {
    let provider = MockProvider::with_scores([
        (DEFAULT_MODELS[0], -0.4),
        (DEFAULT_MODELS[1], 0.0),
        (DEFAULT_MODELS[2], 0.4),
    ]);
    let state = db_state(Arc::new(provider)).await;
    reset_db(&state.db).await;

    let article_id = insert_article(&state, &unique_url("run")).await;
    state.scoring.run_pipeline(article_id).await;

    let article = db::find_article_by_id(&state.db, article_id)
        .await
        .unwrap()
        .unwrap();
    let composite = article.composite_score.unwrap();
    assert!(composite.abs() < 1e-9, "mean of -0.4, 0.0, 0.4 is 0");
    assert_eq!(article.confidence, Some(1.0));
    assert_eq!(article.score_source.as_deref(), Some("llm"));
    assert_eq!(article.status, "analyzed");

    let scores = db::list_model_scores(&state.db, article_id).await.unwrap();
    assert_eq!(scores.len(), 3);

    let record = state.tracker.get(article_id).unwrap();
    assert_eq!(record.status, ProgressStatus::Success);
    assert_eq!(record.percent, 100);
    assert_eq!(record.final_score, Some(composite));
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn rerun_replaces_scores_instead_of_accumulating() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(0.2))).await;
    reset_db(&state.db).await;

    let article_id = insert_article(&state, &unique_url("idem")).await;
    state.scoring.run_pipeline(article_id).await;
    let first = db::list_model_scores(&state.db, article_id).await.unwrap();

    state.scoring.run_pipeline(article_id).await;
    let second = db::list_model_scores(&state.db, article_id).await.unwrap();

    assert_eq!(first.len(), second.len(), "reruns must not accumulate scores");
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn partial_model_failure_is_tolerated() {
    let provider = MockProvider::with_scores([
        (DEFAULT_MODELS[0], 0.6),
        (DEFAULT_MODELS[1], 0.6),
    ])
    .with_outcome(DEFAULT_MODELS[2], MockOutcome::Unavailable);
    let state = db_state(Arc::new(provider)).await;
    reset_db(&state.db).await;

    let article_id = insert_article(&state, &unique_url("partial")).await;
    state.scoring.run_pipeline(article_id).await;

    let article = db::find_article_by_id(&state.db, article_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(article.composite_score, Some(0.6));
    // Two of three equally weighted models contributed
    let confidence = article.confidence.unwrap();
    assert!((confidence - 2.0 / 3.0).abs() < 1e-9);

    let scores = db::list_model_scores(&state.db, article_id).await.unwrap();
    assert_eq!(scores.len(), 2);
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn all_model_failure_leaves_article_untouched() {
    let state = db_state(Arc::new(MockProvider::rate_limited())).await;
    reset_db(&state.db).await;

    let article_id = insert_article(&state, &unique_url("fail")).await;
    state.scoring.run_pipeline(article_id).await;

    let record = state.tracker.get(article_id).unwrap();
    assert_eq!(record.status, ProgressStatus::Error);
    let message = record.error_message.unwrap();
    assert!(
        message.contains("rate limited") || message.contains("All LLM models failed"),
        "unexpected error message: {message}"
    );

    let article = db::find_article_by_id(&state.db, article_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(article.composite_score, None);
    assert_eq!(article.status, "pending");
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn reanalyze_endpoint_queues_and_completes() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(-0.3))).await;
    reset_db(&state.db).await;
    let app = app(state.clone());

    let article_id = insert_article(&state, &unique_url("queue")).await;

    let response = app
        .oneshot(
            Request::post(format!("/api/llm/reanalyze/{article_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "reanalyze queued");
    assert_eq!(body["data"]["article_id"], article_id);

    // The run finishes in the background shortly after.
    let mut done = false;
    for _ in 0..50 {
        if state
            .tracker
            .get(article_id)
            .is_some_and(|r| r.status == ProgressStatus::Success)
        {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(done, "pipeline did not finish in time");

    let article = db::find_article_by_id(&state.db, article_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(article.composite_score, Some(-0.3));
    assert_eq!(article.score_source.as_deref(), Some("llm"));
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn cleanup_removes_old_articles_transactionally() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(0.0))).await;
    reset_db(&state.db).await;
    let app = app(state.clone());

    let old_id = insert_article(&state, &unique_url("old")).await;
    sqlx::query("UPDATE articles SET created_at = NOW() - INTERVAL '60 days' WHERE id = $1")
        .bind(old_id)
        .execute(&state.db)
        .await
        .unwrap();
    db::insert_model_score(&state.db, old_id, "openai/gpt-4o-mini", 0.1, "{}")
        .await
        .unwrap();

    let fresh_id = insert_article(&state, &unique_url("fresh")).await;

    let response = app
        .oneshot(
            Request::post("/api/admin/cleanup")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["articles_deleted"], 1);
    assert_eq!(body["data"]["scores_deleted"], 1);

    assert!(db::find_article_by_id(&state.db, old_id)
        .await
        .unwrap()
        .is_none());
    assert!(db::find_article_by_id(&state.db, fresh_id)
        .await
        .unwrap()
        .is_some());
}
