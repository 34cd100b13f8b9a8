//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::SessionId, protocol::http::CreateSessionResponse,
    protocol::websocket::RoomSnapshot, ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Create a fresh voting session and return its id to the caller.
pub async fn create_session(State(state): State<Arc<AppState>>) -> Json<CreateSessionResponse> {
    let id = state.registry.create_session().await;
    Json(CreateSessionResponse {
        uuid: id.to_string(),
    })
}

/// Existence check used by the SPA before opening the WebSocket.
pub async fn get_session_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> StatusCode {
    let Ok(id) = session_id.parse::<SessionId>() else {
        tracing::warn!("Unable to parse session id: '{}'", session_id);
        return StatusCode::BAD_REQUEST;
    };

    if state.registry.get_session(id).await.is_some() {
        tracing::debug!("Status check of session {}", id);
        StatusCode::OK
    } else {
        tracing::warn!("Status check of unknown session {}", id);
        StatusCode::NOT_FOUND
    }
}

/// Debug endpoint to get the current snapshot of a session (for testing purposes)
pub async fn debug_session_state(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<RoomSnapshot>, StatusCode> {
    let Ok(id) = session_id.parse::<SessionId>() else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let Some(session) = state.registry.get_session(id).await else {
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(session.snapshot().await))
}
