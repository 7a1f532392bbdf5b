//! HTTP API server for voice turns
//!
//! This module exposes the turn broker over REST:
//! - POST /api/live/voice-turn - Answer captured audio
//! - POST /api/live/voice-text - Answer a typed message
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::{create_router, create_router_with_limit, DEFAULT_MAX_BODY_BYTES};
pub use state::AppState;
