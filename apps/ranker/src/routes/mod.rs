pub mod docs;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::ranking::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let batch_limit = state.config.limits.max_request_bytes();
    let single_limit = state.config.limits.max_single_upload_request_bytes();

    Router::new()
        .route("/", get(docs::index_handler))
        .route("/health", get(health::health_handler))
        .route("/openapi.json", get(docs::openapi_handler))
        // Ranking API
        .route(
            "/extract-criteria",
            post(handlers::handle_extract_criteria).layer(DefaultBodyLimit::max(single_limit)),
        )
        .route(
            "/score-resumes",
            post(handlers::handle_score_resumes).layer(DefaultBodyLimit::max(batch_limit)),
        )
        .with_state(state)
}
