use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Call control
        .route("/call/start", post(handlers::start_call))
        .route("/call/end", post(handlers::end_call))
        .route("/call/mute", post(handlers::toggle_mute))
        .route("/call/reset", post(handlers::reset))
        // Call queries
        .route("/call/status", get(handlers::get_status))
        .route("/call/transcript", get(handlers::get_transcript))
        .route("/call/stats", get(handlers::get_stats))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
