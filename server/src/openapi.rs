//! OpenAPI document assembly.

use utoipa::OpenApi;

/// API documentation for the Parallax server.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parallax Server API",
        description = "News bias scoring backend: article CRUD, LLM reanalysis, \
                       score progress streaming, feedback and admin operations.",
    ),
    paths(
        crate::api::health_check,
        crate::api::articles::list_articles,
        crate::api::articles::create_article,
        crate::api::articles::get_article,
        crate::api::articles::get_bias,
        crate::api::articles::get_ensemble,
        crate::api::articles::get_summary,
        crate::api::articles::reanalyze,
        crate::api::articles::manual_score,
        crate::api::progress::score_progress,
        crate::api::feedback::create_feedback,
        crate::api::feeds::refresh,
        crate::api::feeds::feed_health,
        crate::api::sources::list_sources,
        crate::admin::handlers::vacuum,
        crate::admin::handlers::cleanup,
        crate::admin::handlers::reanalyze_recent,
        crate::admin::handlers::metrics,
        crate::admin::export::export_csv,
    ),
    components(schemas(
        crate::db::Article,
        crate::db::ModelScore,
        crate::db::Feedback,
        crate::db::Source,
        crate::api::articles::ArticleWithScores,
        crate::api::articles::CreateArticleRequest,
        crate::api::articles::ManualScoreRequest,
        crate::api::feedback::CreateFeedbackRequest,
        crate::api::progress::ProgressFrame,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "articles", description = "Article CRUD and bias views"),
        (name = "llm", description = "Scoring pipeline control and progress"),
        (name = "feedback", description = "User feedback"),
        (name = "feeds", description = "Ingestion triggering and health"),
        (name = "sources", description = "Configured sources"),
        (name = "admin", description = "Maintenance operations"),
    ),
)]
pub struct ApiDoc;
