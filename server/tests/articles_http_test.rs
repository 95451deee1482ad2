//! Article CRUD integration tests against the live test database.
//!
//! Requires the `PostgreSQL` docker container from
//! `Config::default_for_test`. Run with:
//! `cargo test --test articles_http_test -- --ignored`

mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serial_test::serial;
use tower::ServiceExt;

use parallax_server::llm::MockProvider;

use helpers::{app, body_json, body_string, db_state, reset_db};

fn create_body(url: &str) -> Body {
    Body::from(format!(
        r#"{{"source":"CNN","pub_date":"2025-04-30T12:00:00Z","url":"{url}","title":"T","content":"C"}}"#
    ))
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn create_then_get_article() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(0.1))).await;
    reset_db(&state.db).await;
    let app = app(state);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/articles")
                .header("content-type", "application/json")
                .body(create_body("https://example.com/a"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let article_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["status"], "pending");

    let response = app
        .oneshot(
            Request::get(format!("/api/articles/{article_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["url"], "https://example.com/a");
    assert!(body["data"]["model_scores"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn duplicate_url_yields_conflict() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(0.1))).await;
    reset_db(&state.db).await;
    let app = app(state);

    let first = app
        .clone()
        .oneshot(
            Request::post("/api/articles")
                .header("content-type", "application/json")
                .body(create_body("https://example.com/dup"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(
            Request::post("/api/articles")
                .header("content-type", "application/json")
                .body(create_body("https://example.com/dup"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = body_json(second).await;
    assert_eq!(body["error"]["code"], "conflict_error");
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn create_rejects_invalid_payloads() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(0.1))).await;
    reset_db(&state.db).await;
    let app = app(state);

    let cases = [
        // bad URL scheme
        r#"{"source":"CNN","pub_date":"2025-04-30T12:00:00Z","url":"ftp://x/a","title":"T","content":"C"}"#,
        // bad date
        r#"{"source":"CNN","pub_date":"yesterday","url":"https://x/a","title":"T","content":"C"}"#,
        // unknown field
        r#"{"source":"CNN","pub_date":"2025-04-30T12:00:00Z","url":"https://x/a","title":"T","content":"C","extra":1}"#,
    ];

    for case in cases {
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/articles")
                    .header("content-type", "application/json")
                    .body(Body::from(case))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "case: {case}");
    }
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn manual_score_overrides_and_tags_the_source() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(0.1))).await;
    reset_db(&state.db).await;
    let app = app(state);

    let created = app
        .clone()
        .oneshot(
            Request::post("/api/articles")
                .header("content-type", "application/json")
                .body(create_body("https://example.com/manual"))
                .unwrap(),
        )
        .await
        .unwrap();
    let article_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/manual-score/{article_id}"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"score": 0.5}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(
        app.oneshot(
            Request::get(format!("/api/articles/{article_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap(),
    )
    .await;

    assert_eq!(body["data"]["composite_score"], 0.5);
    assert_eq!(body["data"]["confidence"], 1.0);
    assert_eq!(body["data"]["score_source"], "manual");
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn feedback_requires_an_existing_article() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(0.1))).await;
    reset_db(&state.db).await;
    let app = app(state);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/feedback")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"article_id": 999, "feedback_text": "wrong", "category": "disagree"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let created = app
        .clone()
        .oneshot(
            Request::post("/api/articles")
                .header("content-type", "application/json")
                .body(create_body("https://example.com/fb"))
                .unwrap(),
        )
        .await
        .unwrap();
    let article_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let response = app
        .oneshot(
            Request::post("/api/feedback")
                .header("content-type", "application/json")
                .body(Body::from(format!(
                    r#"{{"article_id": {article_id}, "feedback_text": "spot on", "category": "agree"}}"#
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["category"], "agree");
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn csv_export_has_expected_header_and_rows() {
    let state = db_state(Arc::new(MockProvider::with_uniform_score(0.1))).await;
    reset_db(&state.db).await;
    let app = app(state);

    let created = app
        .clone()
        .oneshot(
            Request::post("/api/articles")
                .header("content-type", "application/json")
                .body(create_body("https://example.com/csv"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::get("/api/admin/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/csv");
    let csv = body_string(response).await;
    assert!(csv.starts_with("ID,Title,Source,URL,PubDate,BiasScore,Confidence,Status,LLMScores"));
    assert!(csv.contains("https://example.com/csv"));
}
