use super::state::AppState;
use crate::error::CallError;
use crate::session::{CallSnapshot, SessionStats, TranscriptMessage};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartCallRequest {
    /// Optional assistant (falls back to the configured one)
    pub assistant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub session_id: String,
    pub status: CallSnapshot,
}

#[derive(Debug, Serialize)]
pub struct EndCallResponse {
    pub status: CallSnapshot,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct MuteResponse {
    pub is_muted: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for CallError {
    fn into_response(self) -> Response {
        let status = match &self {
            CallError::NoActiveCall | CallError::CallInProgress => StatusCode::CONFLICT,
            CallError::MissingAssistant => StatusCode::BAD_REQUEST,
            CallError::UnsupportedTransport(_) | CallError::EngineClosed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CallError::Provider { .. } => StatusCode::BAD_GATEWAY,
        };

        error!("Call request failed: {}", self);

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /call/start
/// Start a new call
pub async fn start_call(
    State(state): State<AppState>,
    body: Option<Json<StartCallRequest>>,
) -> Result<Json<StartCallResponse>, CallError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let session_id = state.engine.start_call(req.assistant_id).await?;
    info!("Call requested: {}", session_id);

    Ok(Json(StartCallResponse {
        session_id,
        status: state.engine.snapshot().await?,
    }))
}

/// POST /call/end
/// End the call in progress (no-op when there is none)
pub async fn end_call(State(state): State<AppState>) -> Result<Json<EndCallResponse>, CallError> {
    state.engine.end_call().await?;

    Ok(Json(EndCallResponse {
        status: state.engine.snapshot().await?,
        stats: state.engine.stats().await?,
    }))
}

/// POST /call/mute
/// Toggle the microphone mute state
pub async fn toggle_mute(State(state): State<AppState>) -> Result<Json<MuteResponse>, CallError> {
    let is_muted = state.engine.toggle_mute().await?;
    Ok(Json(MuteResponse { is_muted }))
}

/// POST /call/reset
/// Drop the session and return to idle
pub async fn reset(State(state): State<AppState>) -> Result<Json<CallSnapshot>, CallError> {
    state.engine.reset().await?;
    Ok(Json(state.engine.snapshot().await?))
}

/// GET /call/status
pub async fn get_status(State(state): State<AppState>) -> Result<Json<CallSnapshot>, CallError> {
    Ok(Json(state.engine.snapshot().await?))
}

/// GET /call/transcript
/// Finalized transcript, oldest first
pub async fn get_transcript(
    State(state): State<AppState>,
) -> Result<Json<Vec<TranscriptMessage>>, CallError> {
    Ok(Json(state.engine.transcript().await?))
}

/// GET /call/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<SessionStats>, CallError> {
    Ok(Json(state.engine.stats().await?))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
