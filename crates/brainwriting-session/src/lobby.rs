//! Lobby operations: session creation, joining, starting, and closing.
//!
//! These run before (and after) any round view exists, so they work directly
//! against the session document. Joining is an idempotent read-modify-write;
//! starting claims round 1 so every participant adopts the same countdown.

use serde::Serialize;
use serde_json::json;

use brainwriting_core::clock::Clock;
use brainwriting_core::error::EngineError;
use brainwriting_core::ids::{ParticipantName, SessionCode};
use brainwriting_core::store::{Document, DocumentStore};
use brainwriting_docs::{
    IDEA_SLOTS, ROUNDS_COLLECTION, SESSIONS_COLLECTION, SessionDoc, is_blank_idea, round_doc_id,
};

use crate::engine::SessionEngine;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

fn generate_code() -> SessionCode {
    use rand::Rng;

    let mut rng = rand::rng();
    let code: String = (0..CODE_LEN)
        .map(|_| char::from(CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())]))
        .collect();
    SessionCode::new(code)
}

/// A waiting-room snapshot of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyView {
    /// The session code.
    pub session: SessionCode,
    /// The facilitator. Never appears in `participants`.
    pub host: ParticipantName,
    /// Joined participants, in join order.
    pub participants: Vec<ParticipantName>,
    /// The brainstorming topic.
    pub topic: String,
    /// True once the host has started the rounds.
    pub started: bool,
    /// False once the session has ended.
    pub active: bool,
}

impl LobbyView {
    fn from_doc(session: &SessionCode, doc: SessionDoc) -> Self {
        Self {
            session: session.clone(),
            host: doc.host,
            participants: doc.participants,
            topic: doc.topic,
            started: doc.started,
            active: doc.active,
        }
    }
}

/// One contributed idea in a session summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCard {
    /// The participant whose sheet this idea was written on.
    pub author: ParticipantName,
    /// The round it was written in.
    pub round: u32,
    /// The idea slot (0-based).
    pub slot: u8,
    /// The idea text.
    pub idea: String,
    /// The illustration reference, when one was generated.
    pub image: Option<String>,
}

/// Every non-placeholder idea contributed across the whole grid, for export
/// consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// The session code.
    pub session: SessionCode,
    /// The brainstorming topic.
    pub topic: String,
    /// Cards in participant order, then by round, then by slot.
    pub cards: Vec<SummaryCard>,
}

impl SessionEngine {
    /// Creates a new session hosted (but not participated in) by `host` and
    /// returns its shareable code.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank host name or topic, `Store` on write failure
    /// or when no unused code could be allocated.
    pub async fn create_session(
        &self,
        host: &ParticipantName,
        topic: &str,
    ) -> Result<SessionCode, EngineError> {
        if host.as_str().trim().is_empty() {
            return Err(EngineError::Validation("host name must not be blank".into()));
        }
        if topic.trim().is_empty() {
            return Err(EngineError::Validation("topic must not be blank".into()));
        }

        // Re-roll on collision rather than clobber an existing session; give
        // up after a few attempts instead of overwriting someone's lobby.
        let mut code = None;
        for _ in 0..5 {
            let candidate = generate_code();
            if self
                .store()
                .get(SESSIONS_COLLECTION, candidate.as_str())
                .await?
                .is_none()
            {
                code = Some(candidate);
                break;
            }
        }
        let Some(code) = code else {
            return Err(EngineError::Store(
                "could not allocate an unused session code".into(),
            ));
        };

        let doc = SessionDoc {
            host: host.clone(),
            participants: Vec::new(),
            topic: topic.trim().to_owned(),
            started: false,
            active: true,
            current_round: None,
            current_round_start_time: None,
            created_at: self.clock().now(),
            ended_at: None,
        };
        self.store()
            .set(SESSIONS_COLLECTION, code.as_str(), doc.to_document(), false)
            .await?;
        tracing::info!(session = %code, host = %host, "session created");
        Ok(code)
    }

    /// Adds `name` to the session's participant list. Joining twice, or the
    /// host joining their own session, is a no-op.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for an unknown code, `Validation` for a blank name
    /// or an ended session, `Store` on read/write failure.
    pub async fn join_session(
        &self,
        session: &SessionCode,
        name: &ParticipantName,
    ) -> Result<LobbyView, EngineError> {
        if name.as_str().trim().is_empty() {
            return Err(EngineError::Validation("name must not be blank".into()));
        }
        let mut doc = self.fetch_session(session).await?;
        if !doc.active {
            return Err(EngineError::Validation("session has ended".into()));
        }
        if doc.host == *name || doc.participants.contains(name) {
            return Ok(LobbyView::from_doc(session, doc));
        }

        doc.participants.push(name.clone());
        let mut fields = Document::new();
        fields.insert(
            "participants".to_owned(),
            serde_json::to_value(&doc.participants)
                .map_err(|e| EngineError::Store(format!("participants serialization: {e}")))?,
        );
        self.store()
            .set(SESSIONS_COLLECTION, session.as_str(), fields, true)
            .await?;
        tracing::info!(session = %session, participant = %name, "participant joined");
        Ok(LobbyView::from_doc(session, doc))
    }

    /// Starts the rounds: marks the session started and claims round 1 so
    /// every participant counts down from the same start time. Starting an
    /// already-started session is a no-op.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for an unknown code, `Validation` when the caller is
    /// not the host, the session has ended, or fewer than two participants
    /// have joined.
    pub async fn start_session(
        &self,
        session: &SessionCode,
        caller: &ParticipantName,
    ) -> Result<(), EngineError> {
        let doc = self.fetch_session(session).await?;
        if doc.host != *caller {
            return Err(EngineError::Validation(
                "only the host can start the session".into(),
            ));
        }
        if !doc.active {
            return Err(EngineError::Validation("session has ended".into()));
        }
        if doc.started {
            return Ok(());
        }
        if doc.participants.len() < 2 {
            return Err(EngineError::Validation(
                "at least 2 participants are required to start".into(),
            ));
        }

        let mut fields = Document::new();
        fields.insert("started".to_owned(), json!(true));
        fields.insert("currentRound".to_owned(), json!(1));
        fields.insert(
            "currentRoundStartTime".to_owned(),
            serde_json::to_value(self.clock().now())
                .map_err(|e| EngineError::Store(format!("timestamp serialization: {e}")))?,
        );
        self.store()
            .set(SESSIONS_COLLECTION, session.as_str(), fields, true)
            .await?;
        tracing::info!(
            session = %session,
            participants = doc.participants.len(),
            "session started"
        );
        Ok(())
    }

    /// Tears the session down: deletes every round document in the
    /// participants-by-rounds grid, then the session document itself, and
    /// drops any round views still held for it.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for an unknown code, `Validation` when the caller is
    /// not the host, `Store` on delete failure.
    pub async fn close_session(
        &self,
        session: &SessionCode,
        caller: &ParticipantName,
    ) -> Result<(), EngineError> {
        let doc = self.fetch_session(session).await?;
        if doc.host != *caller {
            return Err(EngineError::Validation(
                "only the host can close the session".into(),
            ));
        }

        let rounds = u32::try_from(doc.participants.len())
            .map_err(|_| EngineError::Validation("participant list too large".into()))?;
        for participant in &doc.participants {
            for round in 1..=rounds {
                self.store()
                    .delete(ROUNDS_COLLECTION, &round_doc_id(session, participant, round))
                    .await?;
            }
        }
        self.store()
            .delete(SESSIONS_COLLECTION, session.as_str())
            .await?;
        self.drop_session_views(session)?;
        tracing::info!(session = %session, "session closed");
        Ok(())
    }

    /// Returns the session's waiting-room state.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for an unknown code, `Store` on read failure.
    pub async fn lobby_view(&self, session: &SessionCode) -> Result<LobbyView, EngineError> {
        let doc = self.fetch_session(session).await?;
        Ok(LobbyView::from_doc(session, doc))
    }

    /// Collects every non-placeholder idea (and its illustration reference,
    /// if any) across the whole grid. Sheets never submitted are skipped.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for an unknown code, `Store` on read failure.
    pub async fn session_summary(
        &self,
        session: &SessionCode,
    ) -> Result<SessionSummary, EngineError> {
        let doc = self.fetch_session(session).await?;
        let rounds = u32::try_from(doc.participants.len())
            .map_err(|_| EngineError::Validation("participant list too large".into()))?;

        let mut cards = Vec::new();
        for participant in &doc.participants {
            for round in 1..=rounds {
                let id = round_doc_id(session, participant, round);
                let Some(raw) = self.store().get(ROUNDS_COLLECTION, &id).await? else {
                    continue;
                };
                let round_doc = brainwriting_docs::RoundDoc::from_document(&raw)?;
                for slot in 0..IDEA_SLOTS {
                    let idea = &round_doc.ideas[slot];
                    if is_blank_idea(idea) {
                        continue;
                    }
                    let slot = u8::try_from(slot).unwrap_or(u8::MAX);
                    cards.push(SummaryCard {
                        author: participant.clone(),
                        round,
                        slot,
                        idea: idea.clone(),
                        image: round_doc.card_images.get(&slot).cloned(),
                    });
                }
            }
        }
        Ok(SessionSummary {
            session: session.clone(),
            topic: doc.topic,
            cards,
        })
    }

    async fn fetch_session(&self, session: &SessionCode) -> Result<SessionDoc, EngineError> {
        let raw = self
            .store()
            .get(SESSIONS_COLLECTION, session.as_str())
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session.clone()))?;
        SessionDoc::from_document(&raw)
    }
}
