//! HTTP server.
//!
//! - [`lollms_api`]: Native generation, status and stop endpoints
//! - [`openai_api`]: OpenAI-compatible request/response types and handlers
//! - [`streaming`]: Chunked text and SSE response bodies

pub mod lollms_api;
pub mod openai_api;
pub mod streaming;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/get_generation_status", get(lollms_api::generation_status))
        .route("/lollms_generate", post(lollms_api::lollms_generate))
        .route("/stop_gen", post(lollms_api::stop_gen))
        .route("/v1/chat/completions", post(openai_api::chat_completions))
        .route("/v1/completions", post(openai_api::completions))
        .route("/v1/models", get(openai_api::list_models))
        .route("/health", get(lollms_api::health))
        .route("/metrics", get(lollms_api::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
