//! Chain construction.
//!
//! A participant's chain at round `r` has one entry per round `1..=r`. The
//! author of each prior entry comes from the rotation resolver; the last
//! entry is the participant's own, editable contribution. Chains are derived
//! state: rebuilt from the store on load and refreshed entry-by-entry as the
//! underlying round documents change.

use std::collections::BTreeMap;

use serde::Serialize;

use brainwriting_core::error::EngineError;
use brainwriting_core::ids::{ParticipantName, SessionCode};
use brainwriting_core::store::DocumentStore;
use brainwriting_docs::{Ideas, ROUNDS_COLLECTION, RoundDoc, round_doc_id};

/// One column of a participant's chain view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntry {
    /// The 1-based round this entry belongs to.
    pub round: u32,
    /// The participant who authored (or is authoring) the entry.
    pub participant: ParticipantName,
    /// The three idea slots.
    pub ideas: Ideas,
    /// Slot index to image reference, as currently persisted.
    pub card_images: BTreeMap<u8, String>,
    /// True for exactly the last entry: the viewer's own current round.
    pub editable: bool,
}

/// Builds the chain for `me` at `round`.
///
/// Prior rounds' documents are fetched point-wise; an absent or unreadable
/// document degrades to blank ideas rather than failing the whole view (its
/// live subscription will fill it in when the author submits). The viewer's
/// own in-progress document, when present, is adopted so a refresh mid-round
/// does not lose typed ideas.
///
/// # Errors
///
/// Returns `EngineError::NotAParticipant` when `me` is not in
/// `participants`.
pub async fn build_chain(
    store: &dyn DocumentStore,
    session: &SessionCode,
    participants: &[ParticipantName],
    me: &ParticipantName,
    round: u32,
) -> Result<Vec<ChainEntry>, EngineError> {
    let authors = brainwriting_rotation::chain_authors(session, participants, me, round)?;

    let mut chain = Vec::with_capacity(authors.len());
    for (index, author) in authors.iter().enumerate() {
        let entry_round = index as u32 + 1;
        let editable = entry_round == round;
        let doc_id = round_doc_id(session, author, entry_round);
        let fetched = match store.get(ROUNDS_COLLECTION, &doc_id).await {
            Ok(raw) => raw.and_then(|raw| RoundDoc::from_document(&raw).ok()),
            Err(err) => {
                // A prior round that cannot be read right now renders blank;
                // its live subscription repairs the entry on the next write.
                tracing::warn!(doc = %doc_id, error = %err, "round document read failed");
                None
            }
        };

        let (ideas, card_images) = match fetched {
            Some(doc) => (doc.ideas, doc.card_images),
            None => (Ideas::default(), BTreeMap::new()),
        };

        chain.push(ChainEntry {
            round: entry_round,
            participant: (*author).clone(),
            ideas,
            card_images,
            editable,
        });
    }
    Ok(chain)
}

/// Applies a round-document snapshot to the chain entry at `index`.
///
/// Returns `true` when the entry actually changed. Stale or duplicate
/// snapshots (at-least-once delivery) are dropped by the equality check.
/// Only `ideas` and `cardImages` are taken from the snapshot; the entry's
/// identity fields never change.
pub(crate) fn apply_round_snapshot(
    chain: &mut [ChainEntry],
    index: usize,
    snapshot: &RoundDoc,
) -> bool {
    let Some(entry) = chain.get_mut(index) else {
        return false;
    };
    if entry.ideas == snapshot.ideas && entry.card_images == snapshot.card_images {
        return false;
    }
    entry.ideas = snapshot.ideas.clone();
    entry.card_images = snapshot.card_images.clone();
    true
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use brainwriting_store::MemoryDocumentStore;

    use super::*;

    fn names(names: &[&str]) -> Vec<ParticipantName> {
        names.iter().map(|n| ParticipantName::new(*n)).collect()
    }

    fn session() -> SessionCode {
        SessionCode::new("CHAIN1")
    }

    async fn seed(store: &MemoryDocumentStore, author: &str, round: u32, first_idea: &str) {
        let mut doc = RoundDoc::blank(
            ParticipantName::new(author),
            round,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        );
        doc.ideas[0] = first_idea.to_owned();
        let id = round_doc_id(&session(), &doc.participant, round);
        store
            .set(ROUNDS_COLLECTION, &id, doc.to_document(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_chain_for_round_three_walks_rotation_backward() {
        let store = MemoryDocumentStore::new();
        let group = names(&["A", "B", "C"]);
        seed(&store, "C", 1, "c1").await;
        seed(&store, "B", 2, "b2").await;

        let chain = build_chain(&store, &session(), &group, &group[0], 3)
            .await
            .unwrap();

        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].participant, ParticipantName::new("C"));
        assert_eq!(chain[0].ideas[0], "c1");
        assert!(!chain[0].editable);
        assert_eq!(chain[1].participant, ParticipantName::new("B"));
        assert_eq!(chain[1].ideas[0], "b2");
        assert_eq!(chain[2].participant, ParticipantName::new("A"));
        assert!(chain[2].editable);
    }

    #[tokio::test]
    async fn test_missing_prior_round_degrades_to_blank_entry() {
        let store = MemoryDocumentStore::new();
        let group = names(&["A", "B"]);

        let chain = build_chain(&store, &session(), &group, &group[0], 2)
            .await
            .unwrap();

        assert_eq!(chain[0].participant, ParticipantName::new("B"));
        assert_eq!(chain[0].ideas, Ideas::default());
        assert!(chain[1].editable);
    }

    #[tokio::test]
    async fn test_own_in_progress_document_is_adopted_on_rebuild() {
        let store = MemoryDocumentStore::new();
        let group = names(&["A", "B"]);
        seed(&store, "A", 1, "half-typed idea").await;

        let chain = build_chain(&store, &session(), &group, &group[0], 1)
            .await
            .unwrap();

        assert_eq!(chain[0].ideas[0], "half-typed idea");
        assert!(chain[0].editable);
    }

    #[tokio::test]
    async fn test_rebuild_with_unchanged_documents_is_structurally_equal() {
        let store = MemoryDocumentStore::new();
        let group = names(&["A", "B", "C"]);
        seed(&store, "B", 1, "b1").await;

        let first = build_chain(&store, &session(), &group, &group[0], 2)
            .await
            .unwrap();
        let second = build_chain(&store, &session(), &group, &group[0], 2)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_apply_round_snapshot_ignores_identical_content() {
        let store = MemoryDocumentStore::new();
        let group = names(&["A", "B"]);
        seed(&store, "B", 1, "b1").await;
        let mut chain = build_chain(&store, &session(), &group, &group[0], 2)
            .await
            .unwrap();

        let mut snapshot = RoundDoc::blank(
            ParticipantName::new("B"),
            1,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        );
        snapshot.ideas[0] = "b1".to_owned();
        assert!(!apply_round_snapshot(&mut chain, 0, &snapshot));

        snapshot.ideas[1] = "a new angle".to_owned();
        assert!(apply_round_snapshot(&mut chain, 0, &snapshot));
        assert_eq!(chain[0].ideas[1], "a new angle");
    }
}
