//! Error types for the adaptation core.
//!
//! Each capability boundary gets its own enum so callers can tell a quota
//! problem from a broken synthesizer. `AdaptationError` is the umbrella the
//! orchestrator and the stage runner return.

use thiserror::Error;

/// Configuration and credential errors. Always raised at construction time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// Few-shot corpus errors. Raised when the corpus is loaded, never per request.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to read few-shot corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed few-shot corpus: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Language pair {pair} must have at least {required} examples, found {found}")]
    TooFewExamples {
        pair: String,
        required: usize,
        found: usize,
    },

    #[error("Invalid example #{index} for {pair}: {reason}")]
    InvalidExample {
        pair: String,
        index: usize,
        reason: String,
    },

    #[error("No few-shot examples for required language pair {0}")]
    MissingPair(String),
}

/// Text generation errors.
///
/// The first three variants are what a backend reports. The client turns
/// repeated `CapacityExceeded` / `RateLimited` into the terminal variants
/// once its retry budget is spent.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Model {model} capacity exceeded")]
    CapacityExceeded { model: String },

    #[error("Rate limited by generation backend")]
    RateLimited,

    #[error("Generation failed: {0}")]
    Fatal(String),

    #[error("All models at capacity, try again later")]
    AllModelsAtCapacity,

    #[error("Rate limit exceeded after {retries} retries")]
    RateLimitExhausted { retries: u32 },

    #[error("Generation transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GenerationError {
    /// Quota-class errors. Everything else is fatal for the call.
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            GenerationError::CapacityExceeded { .. }
                | GenerationError::RateLimited
                | GenerationError::AllModelsAtCapacity
                | GenerationError::RateLimitExhausted { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Speech synthesis failed: {0}")]
    Backend(String),

    #[error("Speech synthesis returned no audio")]
    EmptyAudio,

    #[error("Synthesis transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to store audio: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Unreadable audio: {0}")]
    Decode(String),

    #[error("Duration probe failed: {0}")]
    Tool(String),

    #[error("Invalid duration reported: {0}")]
    InvalidDuration(String),

    #[error("Probe IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for ProbeError {
    fn from(err: hound::Error) -> Self {
        ProbeError::Decode(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Context map not found for project {0}")]
    ProjectNotFound(String),

    #[error("Segment {segment_id} not found in project {project_id}")]
    SegmentNotFound { project_id: String, segment_id: u64 },

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Umbrella error for one orchestration call or one stage run.
#[derive(Error, Debug)]
pub enum AdaptationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Empty response from generation backend on attempt {attempt}")]
    EmptyResponse { attempt: u32 },

    #[error("Segment {segment_id} exceeded its deadline of {seconds}s")]
    DeadlineExceeded { segment_id: u64, seconds: u64 },

    #[error("Invalid segment {segment_id}: {reason}")]
    InvalidSegment { segment_id: u64, reason: String },

    #[error("Attempt machine rejected transition: {0}")]
    InvalidTransition(String),
}

impl AdaptationError {
    /// True when the failure came from producing or measuring audio.
    pub fn is_synthesis_failure(&self) -> bool {
        matches!(
            self,
            AdaptationError::Synthesis(_) | AdaptationError::Probe(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AdaptationError>;
