//! Liveness endpoint.

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Liveness report: the service is up and which build answered.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the handler is reachable.
    pub status: &'static str,
    /// Crate version baked in at compile time.
    pub version: &'static str,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Router for the liveness probe, mounted at the root rather than under
/// `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
