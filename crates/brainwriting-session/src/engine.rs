//! The per-participant session engine.
//!
//! One engine instance serves every participant view in the process. Each
//! view owns its ephemeral state (chain, flip states, phase, deadline task,
//! live subscriptions); everything shared between participants lives in the
//! document store, written only in value-idempotent, last-write-wins-safe
//! ways. Round advancement is driven by the shared deadline: submitting
//! early freezes the round, but every participant crosses to the next round
//! when the common countdown reaches zero.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use brainwriting_core::clock::Clock;
use brainwriting_core::error::EngineError;
use brainwriting_core::generator::IllustrationGenerator;
use brainwriting_core::ids::{CardKey, ParticipantName, SessionCode};
use brainwriting_core::store::{Document, DocumentStore};
use brainwriting_docs::{
    IDEA_SLOTS, ROUND_DURATION_SECS, ROUNDS_COLLECTION, RoundDoc, SESSIONS_COLLECTION, SessionDoc,
    is_blank_idea, normalize_ideas, round_doc_id,
};
use brainwriting_illustration::{IllustrationCache, IllustrationState};

use crate::chain::{ChainEntry, build_chain};
use crate::watch::ChainWatcher;

/// Seconds left in a round that started at `start`, clamped to
/// `0..=ROUND_DURATION_SECS`. All participants derive this from the same
/// persisted start timestamp, so the countdown is shared, not local.
#[must_use]
pub fn remaining_secs(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (ROUND_DURATION_SECS - (now - start).num_seconds()).clamp(0, ROUND_DURATION_SECS)
}

/// Lifecycle of one participant's round view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Editing; the deadline task is armed.
    Active,
    /// Finalized locally and persisted; waiting out the shared deadline.
    Submitted,
    /// The deadline passed and the participant should move on.
    Advanced {
        /// The round to load next.
        next_round: u32,
    },
    /// The deadline passed on the last round; the session is over.
    Ended,
}

/// Result of an explicit finish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishOutcome {
    /// The round was finalized and persisted.
    Submitted,
    /// The round had already been submitted; nothing changed.
    AlreadySubmitted,
}

/// Result of toggling a card face.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealOutcome {
    /// Whether the card now shows its illustration side.
    pub revealed: bool,
    /// The image reference, when one is already available.
    pub image: Option<String>,
    /// True when generation failed for this card; rendered as "no image",
    /// never retried automatically.
    pub image_unavailable: bool,
}

/// Snapshot of a participant's round view, as exposed to the presentation
/// layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    /// The session code.
    pub session: SessionCode,
    /// True when the viewer is the host; hosts get no chain and no timer.
    pub is_host: bool,
    /// Ordered non-host participants.
    pub participants: Vec<ParticipantName>,
    /// The session topic.
    pub topic: String,
    /// The viewed round.
    pub round: u32,
    /// The idea chain, last entry editable.
    pub chain: Vec<ChainEntry>,
    /// Seconds left on the shared countdown.
    pub time_left: i64,
    /// True once the round is finalized.
    pub finished: bool,
    /// True once a submission has been accepted.
    pub submitted: bool,
    /// Set when the deadline has passed and a next round awaits.
    pub next_round: Option<u32>,
    /// Set when the deadline passed on the final round.
    pub session_ended: bool,
}

type ViewKey = (SessionCode, ParticipantName, u32);

struct ViewState {
    participants: Vec<ParticipantName>,
    topic: String,
    start_time: DateTime<Utc>,
    chain: Arc<Mutex<Vec<ChainEntry>>>,
    flips: HashMap<CardKey, bool>,
    phase: RoundPhase,
    _watcher: ChainWatcher,
    deadline_task: JoinHandle<()>,
}

impl Drop for ViewState {
    fn drop(&mut self) {
        // A deadline task leaked past its view would auto-submit a round
        // the participant has navigated away from.
        self.deadline_task.abort();
    }
}

/// The session engine.
pub struct SessionEngine {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    cache: Arc<IllustrationCache>,
    views: Mutex<HashMap<ViewKey, ViewState>>,
}

impl SessionEngine {
    /// Creates an engine over the given store, clock, and generator.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn IllustrationGenerator>,
    ) -> Self {
        let cache = Arc::new(IllustrationCache::new(Arc::clone(&store), generator));
        Self {
            store,
            clock,
            cache,
            views: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn views(&self) -> Result<MutexGuard<'_, HashMap<ViewKey, ViewState>>, EngineError> {
        self.views
            .lock()
            .map_err(|_| EngineError::Store("view registry mutex poisoned".into()))
    }

    /// Loads (or refreshes) a participant's view of `round`.
    ///
    /// Hosts get a chainless, timerless view. For participants this performs
    /// the full load path: adopt or claim the shared round start time, build
    /// the chain, attach live subscriptions to every prior round, and arm
    /// the deadline task. Calling it again for an already-loaded round is a
    /// cheap snapshot of the live view.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` when the session does not exist, `NotAParticipant`
    /// when the viewer is in neither the participant list nor the host seat,
    /// `Validation` for inactive/unstarted sessions and out-of-range rounds,
    /// `Store` on read/claim failures.
    pub async fn load_round(
        self: &Arc<Self>,
        session: &SessionCode,
        me: &ParticipantName,
        round: u32,
    ) -> Result<RoundView, EngineError> {
        let raw = self
            .store
            .get(SESSIONS_COLLECTION, session.as_str())
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session.clone()))?;
        let doc = SessionDoc::from_document(&raw)?;

        if doc.host == *me {
            return Ok(RoundView {
                session: session.clone(),
                is_host: true,
                participants: doc.participants,
                topic: doc.topic,
                round,
                chain: Vec::new(),
                time_left: 0,
                finished: false,
                submitted: false,
                next_round: None,
                session_ended: !doc.active,
            });
        }
        let key: ViewKey = (session.clone(), me.clone(), round);
        {
            // A poll of an already-loaded round must keep working after the
            // session document moved on (next round claimed, session ended):
            // the view itself carries the participant's transition.
            let views = self.views()?;
            if let Some(view) = views.get(&key) {
                return Ok(self.snapshot(&key, view));
            }
        }

        if !doc.active {
            return Err(EngineError::Validation("session has ended".into()));
        }
        if !doc.started {
            return Err(EngineError::Validation("session has not started".into()));
        }
        let total = u32::try_from(doc.participants.len())
            .map_err(|_| EngineError::Validation("participant list too large".into()))?;
        if round == 0 || round > total {
            return Err(EngineError::Validation(format!(
                "round {round} is out of range for {total} participants"
            )));
        }

        // Membership must hold before the claim below touches shared state.
        if !doc.participants.contains(me) {
            return Err(EngineError::NotAParticipant {
                session: session.clone(),
                participant: me.clone(),
            });
        }

        let start = self.adopt_or_claim_start(session, &doc, round).await?;

        let chain = build_chain(self.store.as_ref(), session, &doc.participants, me, round).await?;
        let mut flips = HashMap::new();
        for entry in &chain {
            for slot in 0..IDEA_SLOTS {
                let slot = u8::try_from(slot).unwrap_or(u8::MAX);
                flips.insert(
                    CardKey::new(entry.participant.clone(), entry.round, slot),
                    entry.editable,
                );
            }
        }
        let chain = Arc::new(Mutex::new(chain));
        let watcher = ChainWatcher::start(&self.store, &self.cache, session, &chain).await;
        let deadline_task = self.spawn_deadline(key.clone(), start);

        let view = ViewState {
            participants: doc.participants,
            topic: doc.topic,
            start_time: start,
            chain,
            flips,
            phase: RoundPhase::Active,
            _watcher: watcher,
            deadline_task,
        };

        let mut views = self.views()?;
        // Navigating to this round supersedes any other round view the
        // participant still holds; dropping it cancels its subscriptions
        // and deadline task.
        views.retain(|(s, p, r), _| !(s == session && p == me && *r != round));
        let snapshot = self.snapshot(&key, &view);
        views.insert(key, view);
        Ok(snapshot)
    }

    /// Applies an edit to the viewer's editable entry and merge-writes it to
    /// the store.
    ///
    /// # Errors
    ///
    /// `Validation` when the round is not loaded, already submitted, or the
    /// slot is out of range; `Store` when the incremental write fails (the
    /// local edit is kept so the next write retries it).
    pub async fn edit_idea(
        &self,
        session: &SessionCode,
        me: &ParticipantName,
        round: u32,
        slot: u8,
        text: String,
    ) -> Result<(), EngineError> {
        if usize::from(slot) >= IDEA_SLOTS {
            return Err(EngineError::Validation(format!("no idea slot {slot}")));
        }
        let key: ViewKey = (session.clone(), me.clone(), round);
        let ideas = {
            let views = self.views()?;
            let view = views
                .get(&key)
                .ok_or_else(|| EngineError::Validation("round view not loaded".into()))?;
            if view.phase != RoundPhase::Active {
                return Err(EngineError::Validation("round already submitted".into()));
            }
            let mut chain = view
                .chain
                .lock()
                .map_err(|_| EngineError::Store("chain mutex poisoned".into()))?;
            let entry = chain
                .last_mut()
                .ok_or_else(|| EngineError::Validation("chain is empty".into()))?;
            entry.ideas[usize::from(slot)] = text;
            entry.ideas.clone()
        };

        let draft = RoundDoc {
            participant: me.clone(),
            round,
            ideas,
            card_images: std::collections::BTreeMap::new(),
            timestamp: self.clock.now(),
        };
        let mut fields = draft.to_document();
        // Incremental writes never carry image state.
        fields.remove("cardImages");
        self.store
            .set(
                ROUNDS_COLLECTION,
                &round_doc_id(session, me, round),
                fields,
                true,
            )
            .await
    }

    /// Toggles a card between its text and illustration faces. Revealing a
    /// card with a non-blank idea lazily triggers illustration generation;
    /// the result is picked up by a later poll or reveal.
    ///
    /// # Errors
    ///
    /// `Validation` when the round is not loaded or the column/slot does not
    /// exist.
    pub fn toggle_reveal(
        &self,
        session: &SessionCode,
        me: &ParticipantName,
        round: u32,
        column: usize,
        slot: u8,
    ) -> Result<RevealOutcome, EngineError> {
        if usize::from(slot) >= IDEA_SLOTS {
            return Err(EngineError::Validation(format!("no idea slot {slot}")));
        }
        let key: ViewKey = (session.clone(), me.clone(), round);
        let (card_key, idea, revealed) = {
            let mut views = self.views()?;
            let view = views
                .get_mut(&key)
                .ok_or_else(|| EngineError::Validation("round view not loaded".into()))?;
            let chain = view
                .chain
                .lock()
                .map_err(|_| EngineError::Store("chain mutex poisoned".into()))?;
            let entry = chain
                .get(column)
                .ok_or_else(|| EngineError::Validation(format!("no chain column {column}")))?;
            let card_key = CardKey::new(entry.participant.clone(), entry.round, slot);
            let idea = entry.ideas[usize::from(slot)].clone();
            drop(chain);
            let flip = view.flips.entry(card_key.clone()).or_insert(false);
            *flip = !*flip;
            (card_key, idea, *flip)
        };

        if revealed && !is_blank_idea(&idea) {
            let cache = Arc::clone(&self.cache);
            let session = session.clone();
            let spawn_key = card_key.clone();
            tokio::spawn(async move {
                cache.ensure_image(&session, spawn_key, &idea).await;
            });
        }

        let state = self.cache.state(&card_key);
        Ok(RevealOutcome {
            revealed,
            image: match &state {
                Some(IllustrationState::Ready(reference)) => Some(reference.clone()),
                _ => None,
            },
            image_unavailable: state == Some(IllustrationState::Unavailable),
        })
    }

    /// Finalizes the participant's current round ahead of the deadline.
    ///
    /// # Errors
    ///
    /// `Validation` when the round is not loaded; `Store` when the
    /// finalizing write fails — local submission state is rolled back so the
    /// participant can retry.
    pub async fn finish_round(
        &self,
        session: &SessionCode,
        me: &ParticipantName,
        round: u32,
    ) -> Result<FinishOutcome, EngineError> {
        let key: ViewKey = (session.clone(), me.clone(), round);
        if self.submit_round(&key).await? {
            Ok(FinishOutcome::Submitted)
        } else {
            Ok(FinishOutcome::AlreadySubmitted)
        }
    }

    /// Drops a participant's round view: unsubscribes its chain watcher and
    /// aborts its deadline task. Leaving an unloaded round is a no-op.
    ///
    /// # Errors
    ///
    /// `Store` only when the view registry is poisoned.
    pub fn leave_round(
        &self,
        session: &SessionCode,
        me: &ParticipantName,
        round: u32,
    ) -> Result<(), EngineError> {
        let key: ViewKey = (session.clone(), me.clone(), round);
        self.views()?.remove(&key);
        Ok(())
    }

    /// Drops every view belonging to `session` (host closed it).
    pub(crate) fn drop_session_views(&self, session: &SessionCode) -> Result<(), EngineError> {
        self.views()?.retain(|(s, _, _), _| s != session);
        Ok(())
    }

    /// Adopts the persisted round start when the session is already on this
    /// round, otherwise claims the round. The claim is best-effort and
    /// non-transactional: concurrent claimants each write their own
    /// timestamp and the last one wins; every participant still ends up
    /// counting down from a single shared value.
    async fn adopt_or_claim_start(
        &self,
        session: &SessionCode,
        doc: &SessionDoc,
        round: u32,
    ) -> Result<DateTime<Utc>, EngineError> {
        match (doc.current_round, doc.current_round_start_time) {
            (Some(current), Some(start)) if current == round => Ok(start),
            (Some(current), _) if current > round => Err(EngineError::Validation(format!(
                "round {round} is already over (session is on round {current})"
            ))),
            _ => {
                let now = self.clock.now();
                let mut fields = Document::new();
                fields.insert("currentRound".to_owned(), serde_json::json!(round));
                fields.insert(
                    "currentRoundStartTime".to_owned(),
                    serde_json::to_value(now)
                        .map_err(|e| EngineError::Store(format!("timestamp serialization: {e}")))?,
                );
                self.store
                    .set(SESSIONS_COLLECTION, session.as_str(), fields, true)
                    .await?;
                Ok(now)
            }
        }
    }

    fn snapshot(&self, key: &ViewKey, view: &ViewState) -> RoundView {
        let chain = view.chain.lock().map(|c| c.clone()).unwrap_or_default();
        let (finished, submitted, next_round, session_ended) = match view.phase {
            RoundPhase::Active => (false, false, None, false),
            RoundPhase::Submitted => (true, true, None, false),
            RoundPhase::Advanced { next_round } => (true, true, Some(next_round), false),
            RoundPhase::Ended => (true, true, None, true),
        };
        let time_left = match view.phase {
            RoundPhase::Active => remaining_secs(view.start_time, self.clock.now()),
            _ => 0,
        };
        RoundView {
            session: key.0.clone(),
            is_host: false,
            participants: view.participants.clone(),
            topic: view.topic.clone(),
            round: key.2,
            chain,
            time_left,
            finished,
            submitted,
            next_round,
            session_ended,
        }
    }

    /// Finalizes the round for `key`. Returns `Ok(false)` when the round
    /// was not in the `Active` phase (already submitted or advanced).
    async fn submit_round(&self, key: &ViewKey) -> Result<bool, EngineError> {
        let (session, me, round) = key;
        let ideas = {
            let mut views = self.views()?;
            let view = views
                .get_mut(key)
                .ok_or_else(|| EngineError::Validation("round view not loaded".into()))?;
            if view.phase != RoundPhase::Active {
                return Ok(false);
            }
            // Claim under the lock so a concurrent deadline/finish pair
            // produces exactly one write.
            view.phase = RoundPhase::Submitted;
            for flip in view.flips.values_mut() {
                *flip = false;
            }
            let chain = view
                .chain
                .lock()
                .map_err(|_| EngineError::Store("chain mutex poisoned".into()))?;
            chain
                .last()
                .map(|entry| entry.ideas.clone())
                .unwrap_or_default()
        };

        let normalized = normalize_ideas(&ideas);
        let final_doc = RoundDoc {
            participant: me.clone(),
            round: *round,
            ideas: normalized.clone(),
            // Full write with an empty image map: stale image state from a
            // previous visit of this round must not be shipped forward.
            card_images: std::collections::BTreeMap::new(),
            timestamp: self.clock.now(),
        };
        let write = self
            .store
            .set(
                ROUNDS_COLLECTION,
                &round_doc_id(session, me, *round),
                final_doc.to_document(),
                false,
            )
            .await;

        if let Err(err) = write {
            // Roll back so the participant can retry the submission.
            if let Ok(mut views) = self.views.lock()
                && let Some(view) = views.get_mut(key)
            {
                view.phase = RoundPhase::Active;
            }
            return Err(err);
        }

        if let Ok(views) = self.views.lock()
            && let Some(view) = views.get(key)
            && let Ok(mut chain) = view.chain.lock()
            && let Some(entry) = chain.last_mut()
        {
            entry.ideas = normalized.clone();
        }

        // Fire-and-forget illustration generation for every non-blank idea;
        // failures degrade to "no image" and never block the submission.
        for (slot, idea) in normalized.iter().enumerate() {
            if is_blank_idea(idea) {
                continue;
            }
            let Ok(slot) = u8::try_from(slot) else {
                continue;
            };
            let cache = Arc::clone(&self.cache);
            let card_key = CardKey::new(me.clone(), *round, slot);
            let session = session.clone();
            let idea = idea.clone();
            tokio::spawn(async move {
                cache.ensure_image(&session, card_key, &idea).await;
            });
        }

        tracing::info!(session = %session, participant = %me, round, "round submitted");
        Ok(true)
    }

    /// Arms the countdown for a freshly loaded round: a 1-second periodic
    /// wake-up that recomputes the remaining time from the shared start
    /// timestamp and drives the deadline transition at zero.
    fn spawn_deadline(self: &Arc<Self>, key: ViewKey, start: DateTime<Utc>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let Some(engine) = weak.upgrade() else {
                    return;
                };
                if remaining_secs(start, engine.clock.now()) == 0 {
                    engine.handle_deadline(&key).await;
                    return;
                }
                drop(engine);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
    }

    /// Deadline transition: auto-submit if the participant ran out of time,
    /// then advance — to the next round, or to the terminal session state
    /// when this was the last round.
    async fn handle_deadline(&self, key: &ViewKey) {
        match self.submit_round(key).await {
            Ok(_) => {}
            Err(err) => {
                // Advancing anyway mirrors the shared clock: the round is
                // over for everyone whether or not this save landed.
                tracing::warn!(session = %key.0, participant = %key.1, round = key.2, error = %err,
                    "auto-submit at deadline failed");
            }
        }

        let total = match self.views() {
            Ok(views) => match views.get(key) {
                Some(view) => u32::try_from(view.participants.len()).unwrap_or(u32::MAX),
                None => return, // view dropped between deadline and now
            },
            Err(_) => return,
        };

        if key.2 < total {
            if let Ok(mut views) = self.views.lock()
                && let Some(view) = views.get_mut(key)
            {
                view.phase = RoundPhase::Advanced {
                    next_round: key.2 + 1,
                };
            }
            return;
        }

        // Last round: mark the session over. Every finisher issues this
        // write; all of them carry the same values, so duplicates are safe
        // under last-write-wins.
        let now = self.clock.now();
        let mut fields = Document::new();
        fields.insert("started".to_owned(), serde_json::json!(false));
        fields.insert("active".to_owned(), serde_json::json!(false));
        match serde_json::to_value(now) {
            Ok(ended_at) => {
                fields.insert("endedAt".to_owned(), ended_at);
            }
            Err(err) => {
                tracing::warn!(error = %err, "endedAt serialization failed");
            }
        }
        if let Err(err) = self
            .store
            .set(SESSIONS_COLLECTION, key.0.as_str(), fields, true)
            .await
        {
            tracing::warn!(session = %key.0, error = %err, "terminal session write failed");
        }
        if let Ok(mut views) = self.views.lock()
            && let Some(view) = views.get_mut(key)
        {
            view.phase = RoundPhase::Ended;
        }
        tracing::info!(session = %key.0, "session ended");
    }
}
