//! Test generators — scripted `IllustrationGenerator` implementations.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use brainwriting_core::error::EngineError;
use brainwriting_core::generator::IllustrationGenerator;

/// A generator that returns the same configured result for every prompt.
/// `None` models the "service answered but produced nothing" case.
#[derive(Debug)]
pub struct StubGenerator(pub Option<String>);

#[async_trait]
impl IllustrationGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Option<String>, EngineError> {
        Ok(self.0.clone())
    }
}

/// A generator that always fails with a generation error.
#[derive(Debug)]
pub struct FailingGenerator;

#[async_trait]
impl IllustrationGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Option<String>, EngineError> {
        Err(EngineError::Generation("image service unreachable".into()))
    }
}

/// A generator that records every prompt and counts calls, for asserting
/// in-flight deduplication and prompt derivation.
#[derive(Debug, Default)]
pub struct CountingGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    result: Option<String>,
}

impl CountingGenerator {
    /// Creates a counting generator that answers every call with `result`.
    #[must_use]
    pub fn new(result: Option<String>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            result,
        }
    }

    /// Number of `generate` calls observed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of all prompts received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl IllustrationGenerator for CountingGenerator {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_owned());
        Ok(self.result.clone())
    }
}
