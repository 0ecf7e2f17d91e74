use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GenerationSettings;
use crate::error::{ConfigError, GenerationError};

/// One call to the text-generation capability.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text-generation capability.
///
/// Implementations must report quota problems as
/// `GenerationError::CapacityExceeded` or `GenerationError::RateLimited` so
/// the client can fall back or back off. Anything else is treated as fatal.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

const CAPACITY_MARKER: &str = "service_tier_capacity_exceeded";

/// Chat-completions backend (Mistral-compatible API).
#[derive(Clone)]
pub struct ChatCompletionsBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ChatCompletionsBackend {
    /// Credentials come from the settings or `MISTRAL_API_KEY`.
    pub fn new(settings: &GenerationSettings) -> Result<Self, ConfigError> {
        let api_key = if settings.api_key.trim().is_empty() {
            std::env::var("MISTRAL_API_KEY").unwrap_or_default()
        } else {
            settings.api_key.clone()
        };
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("MISTRAL_API_KEY".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "generation.request_timeout_secs".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_rate_limit(&request.model, &text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Fatal(format!("{}: {}", status, text)));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!("Generation returned {} chars from {}", content.len(), request.model);
        Ok(content)
    }
}

/// A 429 is a capacity problem only when the body says so.
pub fn classify_rate_limit(model: &str, body: &str) -> GenerationError {
    if body.contains(CAPACITY_MARKER) {
        GenerationError::CapacityExceeded {
            model: model.to_string(),
        }
    } else {
        GenerationError::RateLimited
    }
}
