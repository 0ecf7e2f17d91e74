//! External capabilities the adaptation core talks to.

pub mod audio_store;
pub mod llm;
pub mod probe;
pub mod tts;

pub use audio_store::{AudioStore, FsAudioStore, MemoryAudioStore};
pub use llm::{ChatCompletionsBackend, GenerationClient, GenerationRequest, TextGenerator};
pub use probe::{DurationProbe, FfprobeDurationProbe, WavDurationProbe};
pub use tts::{HttpSpeechBackend, SpeechSynthesizer, VoiceSelector};
