use super::handlers;
use super::state::AppState;
use crate::protocol::{VOICE_TEXT_PATH, VOICE_TURN_PATH};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default request body ceiling; base64 audio of a long utterance runs to megabytes
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    create_router_with_limit(state, DEFAULT_MAX_BODY_BYTES)
}

/// Create the HTTP router with a custom body size limit
pub fn create_router_with_limit(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Voice turns
        .route(VOICE_TURN_PATH, post(handlers::voice_turn))
        .route(VOICE_TEXT_PATH, post(handlers::voice_text))
        .layer(
            ServiceBuilder::new()
                // Request logging
                .layer(TraceLayer::new_for_http())
                // Mobile and web clients call from other origins
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}
