//! Brainwriting Docs — persisted document layouts.
//!
//! Wire-level definitions of the two document collections the engine reads
//! and writes, plus the shared constants every participant must agree on.
//! Field names and the round-document key format are load-bearing: exports
//! and live sessions written by other clients depend on them byte-for-byte.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use brainwriting_core::error::EngineError;
use brainwriting_core::ids::{ParticipantName, SessionCode};
use brainwriting_core::store::Document;

/// Collection of session documents, keyed by session code.
pub const SESSIONS_COLLECTION: &str = "brainwritingSessions";

/// Collection of per-round contribution documents.
pub const ROUNDS_COLLECTION: &str = "brainwritingRounds";

/// Number of idea slots per round.
pub const IDEA_SLOTS: usize = 3;

/// Placeholder persisted for a slot left blank at finalization.
pub const NO_IDEA_PLACEHOLDER: &str = "(No idea)";

/// Shared round duration. The deadline is derived from the round start
/// timestamp in the session document, so this constant must be identical
/// across all participants of a deployment.
pub const ROUND_DURATION_SECS: i64 = 100;

/// The fixed-size idea sequence of one round.
pub type Ideas = [String; IDEA_SLOTS];

/// Key of a round-contribution document.
#[must_use]
pub fn round_doc_id(session: &SessionCode, participant: &ParticipantName, round: u32) -> String {
    format!("{session}_{participant}_round_{round}")
}

/// True for slots that carry no usable idea text: blank, whitespace, or the
/// finalization placeholder.
#[must_use]
pub fn is_blank_idea(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed == NO_IDEA_PLACEHOLDER
}

/// Replaces blank slots with the placeholder literal, leaving non-blank
/// slots untouched.
#[must_use]
pub fn normalize_ideas(ideas: &Ideas) -> Ideas {
    ideas.clone().map(|idea| {
        if idea.trim().is_empty() {
            NO_IDEA_PLACEHOLDER.to_owned()
        } else {
            idea
        }
    })
}

fn default_active() -> bool {
    true
}

/// The session document.
///
/// `participants` is ordered and excludes the host; the rotation resolver
/// depends on that ordering. `started` and `active` each transition exactly
/// once; `currentRound` and `currentRoundStartTime` are always written
/// together and only move forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDoc {
    /// The host's name. Hosts never appear in `participants`.
    pub host: ParticipantName,
    /// Ordered non-host participants, grown via join.
    #[serde(default)]
    pub participants: Vec<ParticipantName>,
    /// The brainstorming topic.
    #[serde(default)]
    pub topic: String,
    /// Set once by the host to move everyone out of the lobby.
    #[serde(default)]
    pub started: bool,
    /// Cleared exactly once when the last round completes or the host
    /// closes the session; never returns to `true`.
    #[serde(default = "default_active")]
    pub active: bool,
    /// The round currently in progress, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_round: Option<u32>,
    /// Shared wall-clock start of the current round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_round_start_time: Option<DateTime<Utc>>,
    /// Session creation time.
    pub created_at: DateTime<Utc>,
    /// Session end time, set by the terminal round write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionDoc {
    /// Serializes into a store document.
    ///
    /// # Panics
    ///
    /// Never panics: a struct with named fields always serializes to a JSON
    /// object.
    #[must_use]
    pub fn to_document(&self) -> Document {
        match serde_json::to_value(self).expect("SessionDoc serialization is infallible") {
            Value::Object(map) => map,
            _ => unreachable!("SessionDoc serializes to a JSON object"),
        }
    }

    /// Deserializes from a store document.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` when the document does not match the
    /// session layout.
    pub fn from_document(doc: &Document) -> Result<Self, EngineError> {
        serde_json::from_value(Value::Object(doc.clone()))
            .map_err(|e| EngineError::Store(format!("malformed session document: {e}")))
    }
}

/// One participant's contribution for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDoc {
    /// The authoring participant. Only this participant ever writes the
    /// `ideas` field.
    pub participant: ParticipantName,
    /// The 1-based round number.
    pub round: u32,
    /// The three idea slots.
    pub ideas: Ideas,
    /// Slot index to image reference. Slots are optional; the cache manager
    /// attaches references here after finalization and never touches
    /// `ideas`. Integer keys serialize as the `"0"`/`"1"`/`"2"` strings the
    /// original layout uses.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub card_images: BTreeMap<u8, String>,
    /// Last write time.
    pub timestamp: DateTime<Utc>,
}

impl RoundDoc {
    /// A fresh, empty contribution for `participant` at `round`.
    #[must_use]
    pub fn blank(participant: ParticipantName, round: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            participant,
            round,
            ideas: Default::default(),
            card_images: BTreeMap::new(),
            timestamp,
        }
    }

    /// Serializes into a store document.
    ///
    /// # Panics
    ///
    /// Never panics: a struct with named fields always serializes to a JSON
    /// object.
    #[must_use]
    pub fn to_document(&self) -> Document {
        match serde_json::to_value(self).expect("RoundDoc serialization is infallible") {
            Value::Object(map) => map,
            _ => unreachable!("RoundDoc serializes to a JSON object"),
        }
    }

    /// Deserializes from a store document.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` when the document does not match the
    /// round layout.
    pub fn from_document(doc: &Document) -> Result<Self, EngineError> {
        serde_json::from_value(Value::Object(doc.clone()))
            .map_err(|e| EngineError::Store(format!("malformed round document: {e}")))
    }
}
