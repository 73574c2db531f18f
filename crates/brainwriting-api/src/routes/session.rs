//! Lobby routes: session creation and administration.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use brainwriting_core::ids::{ParticipantName, SessionCode};
use brainwriting_session::{LobbyView, SessionSummary};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating a session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// The facilitator's display name.
    pub host_name: String,
    /// The brainstorming topic.
    pub topic: String,
}

/// Response body for a created session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    /// The shareable session code.
    pub code: SessionCode,
}

/// Request body carrying a participant name.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameRequest {
    /// The caller's display name.
    pub name: String,
}

/// Acknowledgement body for operations with no other payload.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Machine-readable outcome.
    pub status: &'static str,
}

/// POST /api/v1/sessions
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let host = ParticipantName::new(request.host_name);
    let code = state.engine.create_session(&host, &request.topic).await?;
    Ok(Json(CreateSessionResponse { code }))
}

/// GET /api/v1/sessions/{code}
async fn get_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LobbyView>, ApiError> {
    let view = state.engine.lobby_view(&SessionCode::new(code)).await?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/{code}/join
async fn join_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<NameRequest>,
) -> Result<Json<LobbyView>, ApiError> {
    let view = state
        .engine
        .join_session(&SessionCode::new(code), &ParticipantName::new(request.name))
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/{code}/start
async fn start_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<NameRequest>,
) -> Result<Json<LobbyView>, ApiError> {
    let code = SessionCode::new(code);
    state
        .engine
        .start_session(&code, &ParticipantName::new(request.name))
        .await?;
    let view = state.engine.lobby_view(&code).await?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/{code}/close
async fn close_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<NameRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .engine
        .close_session(&SessionCode::new(code), &ParticipantName::new(request.name))
        .await?;
    Ok(Json(StatusResponse { status: "closed" }))
}

/// GET /api/v1/sessions/{code}/summary
async fn session_summary(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let summary = state.engine.session_summary(&SessionCode::new(code)).await?;
    Ok(Json(summary))
}

/// Returns the router for the lobby surface.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{code}", get(get_session))
        .route("/{code}/join", post(join_session))
        .route("/{code}/start", post(start_session))
        .route("/{code}/close", post(close_session))
        .route("/{code}/summary", get(session_summary))
}
