//! Image generation clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use brainwriting_core::error::EngineError;
use brainwriting_core::generator::IllustrationGenerator;

const IMAGES_ENDPOINT: &str = "https://api.openai.com/v1/images/generations";

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

/// `IllustrationGenerator` backed by the OpenAI Images API.
#[derive(Debug, Clone)]
pub struct OpenAiImageGenerator {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiImageGenerator {
    /// Creates a client with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Creates a client from the `OPENAI_API_KEY` environment variable, or
    /// `None` when it is unset.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var("OPENAI_API_KEY").ok().map(Self::new)
    }
}

#[async_trait]
impl IllustrationGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, EngineError> {
        let response = self
            .client
            .post(IMAGES_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&ImageRequest {
                prompt,
                n: 1,
                size: "256x256",
            })
            .send()
            .await
            .map_err(|e| EngineError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Generation(format!(
                "images endpoint returned {status}"
            )));
        }

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Generation(format!("malformed response: {e}")))?;

        Ok(body.data.into_iter().next().and_then(|datum| datum.url))
    }
}

/// Generator used when no API key is configured: answers every prompt with
/// "no image", so sessions run without illustrations instead of failing.
#[derive(Debug, Clone, Copy)]
pub struct NullGenerator;

#[async_trait]
impl IllustrationGenerator for NullGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Option<String>, EngineError> {
        Ok(None)
    }
}
