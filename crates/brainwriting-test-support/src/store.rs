//! Test stores — mock `DocumentStore` implementations.

use async_trait::async_trait;

use brainwriting_core::error::EngineError;
use brainwriting_core::store::{Document, DocumentStore, DocumentWatch};

/// A wrapper that delegates reads and subscriptions to an inner store but
/// rejects every write. Useful for exercising submission rollback, where the
/// load succeeded and only the finalizing write fails.
#[derive(Debug)]
pub struct RejectingWriteStore<S>(pub S);

#[async_trait]
impl<S: DocumentStore> DocumentStore for RejectingWriteStore<S> {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, EngineError> {
        self.0.get(collection, id).await
    }

    async fn set(
        &self,
        _collection: &str,
        _id: &str,
        _fields: Document,
        _merge: bool,
    ) -> Result<(), EngineError> {
        Err(EngineError::Store("write rejected".into()))
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), EngineError> {
        Err(EngineError::Store("write rejected".into()))
    }

    async fn subscribe(&self, collection: &str, id: &str) -> Result<DocumentWatch, EngineError> {
        self.0.subscribe(collection, id).await
    }
}

/// A document store whose every operation fails with a store error. Useful
/// for exercising rollback and retry paths.
#[derive(Debug)]
pub struct FailingDocumentStore;

#[async_trait]
impl DocumentStore for FailingDocumentStore {
    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<Document>, EngineError> {
        Err(EngineError::Store("connection refused".into()))
    }

    async fn set(
        &self,
        _collection: &str,
        _id: &str,
        _fields: Document,
        _merge: bool,
    ) -> Result<(), EngineError> {
        Err(EngineError::Store("connection refused".into()))
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), EngineError> {
        Err(EngineError::Store("connection refused".into()))
    }

    async fn subscribe(&self, _collection: &str, _id: &str) -> Result<DocumentWatch, EngineError> {
        Err(EngineError::Store("connection refused".into()))
    }
}
