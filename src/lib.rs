pub mod config;
pub mod credits;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod outline;
pub mod prompts;
pub mod provider;
pub mod rate_limit;
pub mod session;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

// Router with every route wired to the shared state
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/credits", get(handlers::credits_handler))
        .route(
            "/api/credits/transactions",
            get(handlers::transactions_handler),
        )
        .route("/api/generate-story", post(handlers::generate_story_handler))
        .route("/api/generate-outline", post(handlers::generate_outline_handler))
        .route("/api/generate-chapter", post(handlers::generate_chapter_handler))
        .route("/api/generate-title", post(handlers::generate_title_handler))
        .route(
            "/api/generate-suggestion",
            post(handlers::generate_suggestion_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
