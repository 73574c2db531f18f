//! Shared application state.

use std::sync::Arc;

use brainwriting_session::SessionEngine;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The session engine serving every participant view in the process.
    pub engine: Arc<SessionEngine>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(engine: Arc<SessionEngine>) -> Self {
        Self { engine }
    }
}
