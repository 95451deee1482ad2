//! Feedback HTTP Handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::api::error::{ok, ApiResponse, AppError};
use crate::api::AppState;
use crate::db::{self, Feedback};

/// Accepted feedback categories.
const CATEGORIES: &[&str] = &["agree", "disagree", "unclear", "other"];

/// Feedback payload. Unknown fields are rejected.
#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateFeedbackRequest {
    /// Article the feedback refers to.
    #[validate(range(min = 1, message = "article_id must be positive"))]
    pub article_id: i64,
    /// Optional submitter identifier.
    pub user_id: Option<String>,
    /// Free-form feedback text.
    #[validate(custom(function = "validate_not_blank"))]
    pub feedback_text: String,
    /// One of "agree", "disagree", "unclear", "other". Defaults to "other".
    #[validate(custom(function = "validate_category"))]
    pub category: Option<String>,
    /// Submission channel. Defaults to "web".
    pub source: Option<String>,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank"))
    } else {
        Ok(())
    }
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    if CATEGORIES.contains(&category) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_category"))
    }
}

/// Submit feedback on an article's score.
///
/// POST /api/feedback
#[utoipa::path(
    post,
    path = "/api/feedback",
    tag = "feedback",
    request_body = CreateFeedbackRequest,
    responses(
        (status = 200, description = "Feedback stored"),
        (status = 400, description = "Invalid payload or unknown article"),
    ),
)]
pub async fn create_feedback(
    State(state): State<AppState>,
    payload: Result<Json<CreateFeedbackRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Feedback>>, AppError> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = request.category.as_deref().unwrap_or("other");

    db::find_article_by_id(&state.db, request.article_id)
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!("article {} does not exist", request.article_id))
        })?;

    let feedback = db::insert_feedback(
        &state.db,
        &db::NewFeedback {
            article_id: request.article_id,
            user_id: request.user_id.clone(),
            feedback_text: request.feedback_text.trim().to_string(),
            category: category.to_string(),
            source: request.source.clone().unwrap_or_else(|| "web".to_string()),
        },
    )
    .await?;

    Ok(ok(feedback))
}
