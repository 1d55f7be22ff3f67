//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/...`
/// - Static SPA from `static_dir` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>, static_dir: &str) -> Router {
    let static_service = ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(format!("{static_dir}/index.html")));

    api_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

/// API routes only, with state applied. Used directly by the HTTP tests.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(http::http_health))
        // Learners
        .route("/api/users", post(http::http_create_user))
        .route("/api/user/:id", get(http::http_get_user))
        .route("/api/user/:id/update", post(http::http_update_user))
        .route("/api/user/:id/lesson-map", get(http::http_get_lesson_map))
        .route("/api/user/:id/purchase", post(http::http_purchase))
        .route("/api/user/:id/progress/:lesson_id", get(http::http_get_progress))
        .route("/api/user/:id/ai-lessons", get(http::http_get_ai_lessons))
        .route("/api/shop/items", get(http::http_shop_items))
        // Catalog
        .route("/api/lessons", get(http::http_get_lessons))
        .route("/api/lessons/:id", get(http::http_get_lesson))
        .route("/api/lessons/:id/exercises", get(http::http_get_lesson_exercises))
        // Progression
        .route("/api/exercises/:id/attempt", post(http::http_post_attempt))
        .route("/api/lesson/:id/complete", post(http::http_complete_lesson))
        .route("/api/progress", post(http::http_post_progress))
        // AI collaborator
        .route("/api/ai-lesson/generate", post(http::http_generate_ai_lesson))
        .route("/api/pronunciation/validate", post(http::http_validate_pronunciation))
        .route("/api/hint/generate", post(http::http_generate_hint))
        .with_state(state)
}
