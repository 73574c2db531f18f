//! Brainwriting Session — the round-rotation and submission engine.
//!
//! Owns each participant's view of a running session: the ordered chain of
//! round contributions assembled through the rotation resolver, the shared
//! deadline countdown, submission and round advancement, and the lobby
//! operations that create and administer sessions. All cross-participant
//! coordination goes through the document store; every shared-field write is
//! value-idempotent under last-write-wins, so no central coordinator exists.

mod chain;
mod engine;
mod lobby;
mod watch;

pub use chain::{ChainEntry, build_chain};
pub use engine::{
    FinishOutcome, RevealOutcome, RoundPhase, RoundView, SessionEngine, remaining_secs,
};
pub use lobby::{LobbyView, SessionSummary, SummaryCard};
