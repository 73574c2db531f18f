//! In-memory `DocumentStore` with push subscriptions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use brainwriting_core::error::EngineError;
use brainwriting_core::store::{Document, DocumentStore, DocumentWatch};

type DocKey = (String, String);

#[derive(Debug, Default)]
struct Shared {
    documents: HashMap<DocKey, Document>,
    subscribers: HashMap<DocKey, HashMap<Uuid, mpsc::UnboundedSender<Document>>>,
}

impl Shared {
    /// Pushes a snapshot to every live subscriber of `key`, pruning
    /// subscribers whose watch has been dropped.
    fn publish(&mut self, key: &DocKey, snapshot: &Document) {
        if let Some(subs) = self.subscribers.get_mut(key) {
            subs.retain(|_, sender| sender.send(snapshot.clone()).is_ok());
            if subs.is_empty() {
                self.subscribers.remove(key);
            }
        }
    }
}

/// In-memory document store.
///
/// Merge writes overlay the given top-level fields onto the existing
/// document; full writes replace it. Every write pushes a full snapshot to
/// all live subscribers of that document (at-least-once: a new subscriber
/// also receives the current snapshot immediately, so duplicates are
/// expected). Deleting a document closes its subscriptions.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    shared: Mutex<Shared>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Shared>, EngineError> {
        self.shared
            .lock()
            .map_err(|_| EngineError::Store("document store mutex poisoned".into()))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, EngineError> {
        let shared = self.lock()?;
        Ok(shared
            .documents
            .get(&(collection.to_owned(), id.to_owned()))
            .cloned())
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        merge: bool,
    ) -> Result<(), EngineError> {
        let key = (collection.to_owned(), id.to_owned());
        let mut shared = self.lock()?;

        let snapshot = if merge {
            let mut doc = shared.documents.get(&key).cloned().unwrap_or_default();
            for (name, value) in fields {
                doc.insert(name, value);
            }
            doc
        } else {
            fields
        };

        shared.documents.insert(key.clone(), snapshot.clone());
        shared.publish(&key, &snapshot);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), EngineError> {
        let key = (collection.to_owned(), id.to_owned());
        let mut shared = self.lock()?;
        shared.documents.remove(&key);
        // Closing the channels lets watchers observe the end of the stream.
        shared.subscribers.remove(&key);
        Ok(())
    }

    async fn subscribe(&self, collection: &str, id: &str) -> Result<DocumentWatch, EngineError> {
        let key = (collection.to_owned(), id.to_owned());
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut shared = self.lock()?;
        if let Some(current) = shared.documents.get(&key) {
            // New subscribers start from the current snapshot.
            let _ = sender.send(current.clone());
        }
        shared
            .subscribers
            .entry(key)
            .or_default()
            .insert(Uuid::new_v4(), sender);
        Ok(DocumentWatch::new(receiver))
    }
}
