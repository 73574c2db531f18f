//! Brainwriting Store — in-process document store adapter.
//!
//! The engine treats persistence as an opaque key-value document store
//! (point read, full or merge write, per-document push subscriptions). This
//! crate provides the in-process implementation used by the server and by
//! tests; nothing outside the [`DocumentStore`] trait surface leaks to
//! consumers.

mod memory;

pub use memory::MemoryDocumentStore;

pub use brainwriting_core::store::{Document, DocumentStore, DocumentWatch};
