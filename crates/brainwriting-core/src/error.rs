//! Engine error types.

use thiserror::Error;

use crate::ids::{ParticipantName, SessionCode};

/// Top-level error type for the brainwriting engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested session document does not exist. An absent round
    /// document is never an error: chain construction degrades it to a blank
    /// entry.
    #[error("session not found: {0}")]
    SessionNotFound(SessionCode),

    /// The participant is not in the session's participant list. This is a
    /// data-consistency problem upstream and is terminal for the view; it is
    /// never papered over with a recomputed rotation.
    #[error("{participant} is not a participant of session {session}")]
    NotAParticipant {
        /// The session whose participant list was consulted.
        session: SessionCode,
        /// The name that was missing from the list.
        participant: ParticipantName,
    },

    /// A precondition on the operation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transient document-store failure; callers roll back local state so
    /// the operation can be retried.
    #[error("store error: {0}")]
    Store(String),

    /// Illustration generation failed. Contained at the cache boundary and
    /// converted to a "no image" marker; never propagates to a session view.
    #[error("illustration generation failed: {0}")]
    Generation(String),
}
