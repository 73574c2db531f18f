//! Round-play routes: chain views, idea edits, card flips, submission.

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use brainwriting_core::ids::{ParticipantName, SessionCode};
use brainwriting_session::{FinishOutcome, RevealOutcome, RoundView};

use crate::error::ApiError;
use crate::routes::session::StatusResponse;
use crate::state::AppState;

/// Request body for an idea edit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditIdeaRequest {
    /// The new idea text.
    pub text: String,
}

/// Response body for an explicit finish.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishResponse {
    /// Whether this call submitted the round or found it already submitted.
    pub outcome: FinishOutcome,
    /// The refreshed round view.
    pub view: RoundView,
}

/// GET /api/v1/sessions/{code}/participants/{name}/rounds/{round}
///
/// Loads the participant's view of the round on first call; later calls are
/// cheap polls that surface countdown progress, live chain refreshes, and
/// round advancement.
async fn get_round(
    State(state): State<AppState>,
    Path((code, name, round)): Path<(String, String, u32)>,
) -> Result<Json<RoundView>, ApiError> {
    let view = state
        .engine
        .load_round(&SessionCode::new(code), &ParticipantName::new(name), round)
        .await?;
    Ok(Json(view))
}

/// PUT /api/v1/sessions/{code}/participants/{name}/rounds/{round}/ideas/{slot}
async fn put_idea(
    State(state): State<AppState>,
    Path((code, name, round, slot)): Path<(String, String, u32, u8)>,
    Json(request): Json<EditIdeaRequest>,
) -> Result<Json<RoundView>, ApiError> {
    let code = SessionCode::new(code);
    let name = ParticipantName::new(name);
    state
        .engine
        .edit_idea(&code, &name, round, slot, request.text)
        .await?;
    let view = state.engine.load_round(&code, &name, round).await?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/{code}/participants/{name}/rounds/{round}/cards/{column}/{slot}/reveal
async fn reveal_card(
    State(state): State<AppState>,
    Path((code, name, round, column, slot)): Path<(String, String, u32, usize, u8)>,
) -> Result<Json<RevealOutcome>, ApiError> {
    let outcome = state.engine.toggle_reveal(
        &SessionCode::new(code),
        &ParticipantName::new(name),
        round,
        column,
        slot,
    )?;
    Ok(Json(outcome))
}

/// POST /api/v1/sessions/{code}/participants/{name}/rounds/{round}/finish
async fn finish_round(
    State(state): State<AppState>,
    Path((code, name, round)): Path<(String, String, u32)>,
) -> Result<Json<FinishResponse>, ApiError> {
    let code = SessionCode::new(code);
    let name = ParticipantName::new(name);
    let outcome = state.engine.finish_round(&code, &name, round).await?;
    let view = state.engine.load_round(&code, &name, round).await?;
    Ok(Json(FinishResponse { outcome, view }))
}

/// DELETE /api/v1/sessions/{code}/participants/{name}/rounds/{round}
async fn leave_round(
    State(state): State<AppState>,
    Path((code, name, round)): Path<(String, String, u32)>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .engine
        .leave_round(&SessionCode::new(code), &ParticipantName::new(name), round)?;
    Ok(Json(StatusResponse { status: "left" }))
}

/// Returns the router for round play. Nested under the same prefix as the
/// lobby routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{code}/participants/{name}/rounds/{round}",
            get(get_round).delete(leave_round),
        )
        .route(
            "/{code}/participants/{name}/rounds/{round}/ideas/{slot}",
            put(put_idea),
        )
        .route(
            "/{code}/participants/{name}/rounds/{round}/cards/{column}/{slot}/reveal",
            post(reveal_card),
        )
        .route(
            "/{code}/participants/{name}/rounds/{round}/finish",
            post(finish_round),
        )
}
