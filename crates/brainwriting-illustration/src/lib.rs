//! Brainwriting Illustration — card illustration generation and caching.
//!
//! Maps each `(participant, round, slot)` card to at most one generation
//! attempt: already-persisted references are adopted, in-flight requests are
//! deduplicated, and failures are recorded as an explicit "unavailable"
//! marker so the view can render a failure state without retry storms.

mod cache;
mod openai;

pub use cache::{IllustrationCache, IllustrationState, prompt_for};
pub use openai::{NullGenerator, OpenAiImageGenerator};
