use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::SynthesisSettings;
use crate::error::{ConfigError, SynthesisError};
use crate::segment::EmotionTag;

/// Which voice to speak with, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSelector {
    pub voice_id: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionTag>,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for VoiceSelector {
    fn default() -> Self {
        Self::new("alloy")
    }
}

impl VoiceSelector {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            speed: default_speed(),
            emotion: None,
        }
    }

    pub fn with_emotion(mut self, emotion: EmotionTag) -> Self {
        self.emotion = Some(emotion);
        self
    }
}

/// Speech-synthesis capability. Returns encoded audio (WAV for the bundled
/// backends).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceSelector) -> Result<Vec<u8>, SynthesisError>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

/// OpenAI-style `/audio/speech` backend.
#[derive(Clone)]
pub struct HttpSpeechBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpSpeechBackend {
    /// Credentials come from the settings or `OPENAI_API_KEY`.
    pub fn new(settings: &SynthesisSettings) -> Result<Self, ConfigError> {
        let api_key = if settings.api_key.trim().is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            settings.api_key.clone()
        };
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "synthesis.request_timeout_secs".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechBackend {
    async fn synthesize(&self, text: &str, voice: &VoiceSelector) -> Result<Vec<u8>, SynthesisError> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &voice.voice_id,
            speed: voice.speed,
            response_format: "wav",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Backend(format!("{}: {}", status, detail)));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        debug!("Synthesized {} bytes with voice {}", audio.len(), voice.voice_id);
        Ok(audio.to_vec())
    }
}
