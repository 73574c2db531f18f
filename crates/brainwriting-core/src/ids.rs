//! Identifier newtypes.
//!
//! Participants are identified by the display name they entered at the
//! session entry point (there is no authentication layer), and sessions by
//! the short shareable code the host hands out.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Short shareable session code (six uppercase base-36 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Wraps a raw session code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A participant's display name, unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantName(String);

impl ParticipantName {
    /// Wraps a raw participant name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed key addressing one idea card: the authoring participant, the round
/// the card belongs to, and the slot index (0..3) within that round.
///
/// Replaces the original string-concatenated `"{name}-{round}-{slot}"` keys
/// so that key collisions are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardKey {
    /// The participant who authored the card's round.
    pub participant: ParticipantName,
    /// The 1-based round number.
    pub round: u32,
    /// The slot index within the round (0-based).
    pub slot: u8,
}

impl CardKey {
    /// Builds a card key.
    #[must_use]
    pub fn new(participant: ParticipantName, round: u32, slot: u8) -> Self {
        Self {
            participant,
            round,
            slot,
        }
    }
}

impl fmt::Display for CardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/round {}/slot {}", self.participant, self.round, self.slot)
    }
}
