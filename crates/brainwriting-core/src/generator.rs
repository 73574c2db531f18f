//! Illustration generator abstraction.

use async_trait::async_trait;

use crate::error::EngineError;

/// Abstraction over the external text-to-image service.
///
/// Asynchronous, no SLA, no idempotency guarantee across repeated calls with
/// the same prompt. `Ok(None)` means the service answered but produced no
/// image; both that and `Err` degrade to "no image" at the cache boundary.
#[async_trait]
pub trait IllustrationGenerator: Send + Sync {
    /// Generates an illustration for `prompt`, returning an image reference
    /// (URL) on success.
    async fn generate(&self, prompt: &str) -> Result<Option<String>, EngineError>;
}
