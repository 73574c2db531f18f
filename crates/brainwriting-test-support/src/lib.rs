//! Shared test fakes for the brainwriting engine.

mod clock;
mod generator;
mod store;

pub use clock::{FixedClock, ManualClock};
pub use generator::{CountingGenerator, FailingGenerator, StubGenerator};
pub use store::{FailingDocumentStore, RejectingWriteStore};
