//! The illustration cache manager.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use brainwriting_core::error::EngineError;
use brainwriting_core::generator::IllustrationGenerator;
use brainwriting_core::ids::{CardKey, SessionCode};
use brainwriting_core::store::DocumentStore;
use brainwriting_docs::{ROUNDS_COLLECTION, RoundDoc, is_blank_idea, round_doc_id};

/// Deterministic prompt derived from a card's idea text. Re-deriving the
/// prompt for the same text always yields the same string, so concurrent
/// generators racing on one key produce semantically equivalent images.
#[must_use]
pub fn prompt_for(idea: &str) -> String {
    format!("Illustration representing \"{idea}\"")
}

/// State of one card's illustration as known locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IllustrationState {
    /// A generation attempt is in flight.
    Pending,
    /// An image reference is available.
    Ready(String),
    /// Generation failed or produced nothing; not retried automatically.
    Unavailable,
}

/// Per-process cache of card illustrations with lazy generation.
pub struct IllustrationCache {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn IllustrationGenerator>,
    entries: Mutex<HashMap<CardKey, IllustrationState>>,
    // Serializes write-backs per round document: finalizing a round fires
    // one generation per non-blank slot, and their read-modify-writes of the
    // shared cardImages map must not interleave.
    write_locks: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IllustrationCache {
    /// Creates a cache over the given store and generator.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, generator: Arc<dyn IllustrationGenerator>) -> Self {
        Self {
            store,
            generator,
            entries: Mutex::new(HashMap::new()),
            write_locks: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Returns the locally known state for a card, if any.
    pub fn state(&self, key: &CardKey) -> Option<IllustrationState> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Records a reference observed in a persisted round document (e.g. via
    /// a live subscription). Persisted references win over any local marker.
    pub fn adopt(&self, key: CardKey, reference: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, IllustrationState::Ready(reference));
        }
    }

    /// Ensures an illustration exists for the card, generating one if the
    /// owning round document does not already carry it.
    ///
    /// Blank ideas (and the finalization placeholder) are never illustrated.
    /// A key already known locally — ready, pending, or failed — is not
    /// triggered again; concurrent callers observe `Pending`. Failures cache
    /// an `Unavailable` marker and are not retried.
    pub async fn ensure_image(
        &self,
        session: &SessionCode,
        key: CardKey,
        idea: &str,
    ) -> IllustrationState {
        if is_blank_idea(idea) {
            return IllustrationState::Unavailable;
        }

        // Single check-and-insert under the lock: the first caller claims
        // the key, everyone racing it sees Pending.
        {
            let Ok(mut entries) = self.entries.lock() else {
                return IllustrationState::Unavailable;
            };
            if let Some(existing) = entries.get(&key) {
                return existing.clone();
            }
            entries.insert(key.clone(), IllustrationState::Pending);
        }

        let state = self.resolve(session, &key, idea).await;
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, state.clone());
        }
        state
    }

    /// Adopt-then-generate-then-write-back. Errors never escape: any failure
    /// becomes `Unavailable`.
    async fn resolve(&self, session: &SessionCode, key: &CardKey, idea: &str) -> IllustrationState {
        let doc_id = round_doc_id(session, &key.participant, key.round);

        // Reuse a reference some other viewer already persisted.
        let persisted = match self.store.get(ROUNDS_COLLECTION, &doc_id).await {
            Ok(Some(raw)) => RoundDoc::from_document(&raw).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(card = %key, error = %err, "round document read failed");
                None
            }
        };
        if let Some(reference) = persisted
            .as_ref()
            .and_then(|doc| doc.card_images.get(&key.slot))
        {
            return IllustrationState::Ready(reference.clone());
        }

        let reference = match self.generator.generate(&prompt_for(idea)).await {
            Ok(Some(reference)) => reference,
            Ok(None) => {
                tracing::info!(card = %key, "generator produced no image");
                return IllustrationState::Unavailable;
            }
            Err(err) => {
                tracing::warn!(card = %key, error = %err, "illustration generation failed");
                return IllustrationState::Unavailable;
            }
        };

        if let Err(err) = self.persist(&doc_id, key, &reference).await {
            // The reference is still usable locally; later viewers will
            // regenerate and overwrite with equivalent content.
            tracing::warn!(card = %key, error = %err, "illustration write-back failed");
        }
        IllustrationState::Ready(reference)
    }

    /// Merge-writes the slot reference into the round document. The merge is
    /// shallow, so the full updated `cardImages` map is written; the
    /// read-modify-write runs under a per-document lock and re-reads first,
    /// so a sibling slot's reference persisted in the meantime survives.
    async fn persist(
        &self,
        doc_id: &str,
        key: &CardKey,
        reference: &str,
    ) -> Result<(), EngineError> {
        let doc_lock = {
            let mut locks = self.write_locks.lock().await;
            Arc::clone(locks.entry(doc_id.to_owned()).or_default())
        };
        let _guard = doc_lock.lock().await;

        let mut card_images = match self.store.get(ROUNDS_COLLECTION, doc_id).await? {
            Some(raw) => RoundDoc::from_document(&raw)
                .map(|doc| doc.card_images)
                .unwrap_or_default(),
            None => std::collections::BTreeMap::new(),
        };
        card_images.insert(key.slot, reference.to_owned());

        let mut fields = brainwriting_core::store::Document::new();
        fields.insert(
            "cardImages".to_owned(),
            serde_json::to_value(&card_images)
                .map_err(|e| EngineError::Store(format!("cardImages serialization: {e}")))?,
        );
        self.store.set(ROUNDS_COLLECTION, doc_id, fields, true).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use brainwriting_core::ids::ParticipantName;
    use brainwriting_core::store::{Document, DocumentWatch};
    use brainwriting_docs::NO_IDEA_PLACEHOLDER;
    use brainwriting_store::MemoryDocumentStore;
    use brainwriting_test_support::{CountingGenerator, FailingGenerator, StubGenerator};

    use super::*;

    /// Delegating store that makes every read and write take a while, so
    /// overlapping read-modify-write windows actually overlap.
    struct SlowStore(Arc<MemoryDocumentStore>);

    #[async_trait]
    impl DocumentStore for SlowStore {
        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, EngineError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.get(collection, id).await
        }

        async fn set(
            &self,
            collection: &str,
            id: &str,
            fields: Document,
            merge: bool,
        ) -> Result<(), EngineError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.set(collection, id, fields, merge).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), EngineError> {
            self.0.delete(collection, id).await
        }

        async fn subscribe(&self, collection: &str, id: &str) -> Result<DocumentWatch, EngineError> {
            self.0.subscribe(collection, id).await
        }
    }

    fn key(slot: u8) -> CardKey {
        CardKey::new(ParticipantName::new("Alice"), 1, slot)
    }

    fn session() -> SessionCode {
        SessionCode::new("CACHE1")
    }

    async fn seed_round(store: &MemoryDocumentStore, doc: &RoundDoc) {
        let id = round_doc_id(&session(), &doc.participant, doc.round);
        store
            .set(ROUNDS_COLLECTION, &id, doc.to_document(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_generates_and_writes_back_slot_reference() {
        let store = Arc::new(MemoryDocumentStore::new());
        let generator = Arc::new(StubGenerator(Some("https://img/new".into())));
        let cache = IllustrationCache::new(store.clone(), generator);

        let mut doc = RoundDoc::blank(
            ParticipantName::new("Alice"),
            1,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        );
        doc.ideas[0] = "floating library".to_owned();
        seed_round(&store, &doc).await;

        let state = cache.ensure_image(&session(), key(0), "floating library").await;
        assert_eq!(state, IllustrationState::Ready("https://img/new".into()));

        let raw = store
            .get(ROUNDS_COLLECTION, "CACHE1_Alice_round_1")
            .await
            .unwrap()
            .unwrap();
        let stored = RoundDoc::from_document(&raw).unwrap();
        assert_eq!(stored.card_images.get(&0), Some(&"https://img/new".to_owned()));
        // The merge write must not touch the ideas.
        assert_eq!(stored.ideas[0], "floating library");
    }

    #[tokio::test]
    async fn test_concurrent_sibling_slot_write_backs_both_survive() {
        let inner = Arc::new(MemoryDocumentStore::new());
        let mut doc = RoundDoc::blank(
            ParticipantName::new("Alice"),
            1,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        );
        doc.ideas[0] = "silent tram".to_owned();
        doc.ideas[2] = "moss path".to_owned();
        seed_round(&inner, &doc).await;

        let store: Arc<dyn DocumentStore> = Arc::new(SlowStore(Arc::clone(&inner)));
        let generator = Arc::new(StubGenerator(Some("https://img/x".into())));
        let cache = IllustrationCache::new(store, generator);

        // One generation per non-blank slot, exactly as round finalization
        // fires them: overlapping, against the same round document.
        let session_code = session();
        let (first, third) = tokio::join!(
            cache.ensure_image(&session_code, key(0), "silent tram"),
            cache.ensure_image(&session_code, key(2), "moss path"),
        );
        assert_eq!(first, IllustrationState::Ready("https://img/x".into()));
        assert_eq!(third, IllustrationState::Ready("https://img/x".into()));

        let raw = inner
            .get(ROUNDS_COLLECTION, "CACHE1_Alice_round_1")
            .await
            .unwrap()
            .unwrap();
        let stored = RoundDoc::from_document(&raw).unwrap();
        assert_eq!(stored.card_images.len(), 2);
        assert_eq!(stored.card_images.get(&0), Some(&"https://img/x".to_owned()));
        assert_eq!(stored.card_images.get(&2), Some(&"https://img/x".to_owned()));
    }

    #[tokio::test]
    async fn test_adopts_already_persisted_reference_without_generating() {
        let store = Arc::new(MemoryDocumentStore::new());
        let generator = Arc::new(CountingGenerator::new(Some("https://img/other".into())));
        let cache = IllustrationCache::new(store.clone(), generator.clone());

        let mut doc = RoundDoc::blank(
            ParticipantName::new("Alice"),
            1,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        );
        doc.ideas[2] = "moss keyboard".to_owned();
        doc.card_images.insert(2, "https://img/persisted".to_owned());
        seed_round(&store, &doc).await;

        let state = cache.ensure_image(&session(), key(2), "moss keyboard").await;
        assert_eq!(state, IllustrationState::Ready("https://img/persisted".into()));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_trigger_for_same_key_does_not_regenerate() {
        let store = Arc::new(MemoryDocumentStore::new());
        let generator = Arc::new(CountingGenerator::new(Some("https://img/one".into())));
        let cache = IllustrationCache::new(store, generator.clone());

        cache.ensure_image(&session(), key(0), "paper drone").await;
        let second = cache.ensure_image(&session(), key(0), "paper drone").await;

        assert_eq!(second, IllustrationState::Ready("https://img/one".into()));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_caches_unavailable_marker_without_retry() {
        let store = Arc::new(MemoryDocumentStore::new());
        let generator = Arc::new(FailingGenerator);
        let cache = IllustrationCache::new(store, generator);

        let first = cache.ensure_image(&session(), key(1), "glass bee").await;
        assert_eq!(first, IllustrationState::Unavailable);

        // The marker is cached; the generator is not hit again.
        let second = cache.ensure_image(&session(), key(1), "glass bee").await;
        assert_eq!(second, IllustrationState::Unavailable);
    }

    #[tokio::test]
    async fn test_blank_and_placeholder_ideas_are_never_illustrated() {
        let store = Arc::new(MemoryDocumentStore::new());
        let generator = Arc::new(CountingGenerator::new(Some("https://img".into())));
        let cache = IllustrationCache::new(store, generator.clone());

        assert_eq!(
            cache.ensure_image(&session(), key(0), "   ").await,
            IllustrationState::Unavailable
        );
        assert_eq!(
            cache.ensure_image(&session(), key(1), NO_IDEA_PLACEHOLDER).await,
            IllustrationState::Unavailable
        );
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_is_derived_deterministically_from_idea_text() {
        let store = Arc::new(MemoryDocumentStore::new());
        let generator = Arc::new(CountingGenerator::new(Some("https://img".into())));
        let cache = IllustrationCache::new(store, generator.clone());

        cache.ensure_image(&session(), key(0), "kelp lantern").await;
        assert_eq!(
            generator.prompts(),
            vec!["Illustration representing \"kelp lantern\"".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_adopt_overrides_unavailable_marker() {
        let store = Arc::new(MemoryDocumentStore::new());
        let cache = IllustrationCache::new(store, Arc::new(FailingGenerator));

        cache.ensure_image(&session(), key(0), "sand clock").await;
        cache.adopt(key(0), "https://img/late".into());

        assert_eq!(
            cache.state(&key(0)),
            Some(IllustrationState::Ready("https://img/late".into()))
        );
    }
}
