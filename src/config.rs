//! Configuration surface.
//!
//! Every struct deserializes with defaults so a partial file (or none at all)
//! yields a working setup. `Settings::load` layers a file under `DUBFIT__*`
//! environment variables.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;

/// Per-job adaptation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    pub source_language: String,
    pub target_language: String,
    /// Retries after the first attempt in the lightweight service.
    pub max_retries: u32,
    /// Total synthesis-validated attempts per segment.
    pub max_attempts: u32,
    pub glossary: BTreeMap<String, String>,
    pub tolerance_percent: f64,
    pub short_segment_threshold_seconds: f64,
    pub short_segment_tolerance_percent: f64,
    /// Segments below this skip the synthesis loop entirely.
    pub min_duration: f64,
    pub max_duration: f64,
    pub concurrency: usize,
    /// Wall-clock budget for one segment's whole attempt loop.
    pub segment_deadline_secs: u64,
    /// Refuse to build a prompt builder for a pair the corpus lacks.
    pub require_few_shot: bool,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            max_retries: 2,
            max_attempts: 10,
            glossary: BTreeMap::new(),
            tolerance_percent: 15.0,
            short_segment_threshold_seconds: 1.0,
            short_segment_tolerance_percent: 30.0,
            min_duration: 0.3,
            max_duration: 30.0,
            concurrency: 3,
            segment_deadline_secs: 600,
            require_few_shot: true,
        }
    }
}

impl AdaptationConfig {
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
            ..Self::default()
        }
    }

    pub fn with_glossary(mut self, glossary: BTreeMap<String, String>) -> Self {
        self.glossary = glossary;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// `"src-tgt"` key used by the few-shot corpus.
    pub fn language_pair(&self) -> String {
        format!("{}-{}", self.source_language, self.target_language)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_language.trim().is_empty() || self.target_language.trim().is_empty() {
            return Err(invalid("language", "source and target language are required"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "at least one attempt is required"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "worker pool needs at least one worker"));
        }
        if self.tolerance_percent < 0.0 || self.short_segment_tolerance_percent < 0.0 {
            return Err(invalid("tolerance_percent", "tolerance cannot be negative"));
        }
        if self.min_duration >= self.max_duration {
            return Err(invalid(
                "min_duration",
                "min_duration must be below max_duration",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Generation backend and client policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    /// Falls back to `MISTRAL_API_KEY` when empty.
    pub api_key: String,
    /// Primary first. Capacity errors walk down this chain.
    pub model_chain: Vec<String>,
    pub min_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub max_retries: u32,
    pub temperature: f32,
    pub judge_temperature: f32,
    pub max_tokens: u32,
    pub judge_max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".to_string(),
            api_key: String::new(),
            model_chain: vec![
                "mistral-small-latest".to_string(),
                "mistral-medium-latest".to_string(),
                "mistral-large-latest".to_string(),
            ],
            min_interval_ms: 500,
            backoff_base_ms: 1000,
            max_retries: 2,
            temperature: 0.7,
            judge_temperature: 0.3,
            max_tokens: 1024,
            judge_max_tokens: 10,
            request_timeout_secs: 60,
        }
    }
}

/// Speech synthesis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY` when empty.
    pub api_key: String,
    pub model: String,
    pub default_voice: String,
    pub request_timeout_secs: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "tts-1".to_string(),
            default_voice: "alloy".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Stage-level knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Success rate (percent) at or above which the next stage is triggered.
    pub success_threshold_percent: f64,
    /// Optional few-shot corpus file; the bundled corpus is used otherwise.
    pub corpus_path: Option<String>,
    pub audio_dir: String,
    pub use_ffprobe: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            success_threshold_percent: 200.0 / 3.0,
            corpus_path: None,
            audio_dir: "temp/tts-validation".to_string(),
            use_ffprobe: false,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub adaptation: AdaptationConfig,
    pub generation: GenerationSettings,
    pub synthesis: SynthesisSettings,
    pub pipeline: PipelineSettings,
}

impl Settings {
    /// Load from an optional file, then `DUBFIT__SECTION__KEY` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("DUBFIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.adaptation.validate()?;
        Ok(settings)
    }
}
