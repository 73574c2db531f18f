//! Document store abstraction.
//!
//! The persistence layer is an opaque key-value store of JSON documents
//! addressed by `(collection, id)`. It offers point reads, full or
//! shallow-merge writes, deletes, and per-document push subscriptions. There
//! are no cross-document transactions and no locks; every shared-field write
//! the engine issues is designed to be safe under last-write-wins.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::EngineError;

/// A stored document: a flat JSON object of named fields.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Live subscription to a single document.
///
/// The store pushes a full snapshot on every change, at-least-once; stale or
/// duplicate snapshots are possible and consumers must apply a snapshot only
/// when its content actually differs. Dropping the watch unsubscribes.
#[derive(Debug)]
pub struct DocumentWatch {
    receiver: mpsc::UnboundedReceiver<Document>,
}

impl DocumentWatch {
    /// Wraps a snapshot channel produced by a store implementation.
    #[must_use]
    pub fn new(receiver: mpsc::UnboundedReceiver<Document>) -> Self {
        Self { receiver }
    }

    /// Waits for the next snapshot. Returns `None` once the store side of
    /// the subscription is gone (document deleted with channel closed, or
    /// store dropped).
    pub async fn changed(&mut self) -> Option<Document> {
        self.receiver.recv().await
    }
}

/// Abstraction over the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. Returns `None` when the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, EngineError>;

    /// Point write. With `merge` set, `fields` are overlaid onto the
    /// existing document's top-level fields (creating it if absent);
    /// otherwise the document is replaced wholesale.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        merge: bool,
    ) -> Result<(), EngineError>;

    /// Deletes a document. Deleting an absent document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), EngineError>;

    /// Subscribes to a single document. The watch receives a snapshot after
    /// every subsequent write to the document.
    async fn subscribe(&self, collection: &str, id: &str) -> Result<DocumentWatch, EngineError>;
}
