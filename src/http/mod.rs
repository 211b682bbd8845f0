//! HTTP API server for call control
//!
//! This module provides a REST API over the call engine:
//! - POST /call/start - Start a call
//! - POST /call/end - End the call in progress
//! - POST /call/mute - Toggle mute
//! - POST /call/reset - Return to idle
//! - GET /call/status - Call status snapshot
//! - GET /call/transcript - Finalized transcript
//! - GET /call/stats - Session statistics
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
