pub mod backend;
pub mod client;

pub use backend::{ChatCompletionsBackend, GenerationRequest, TextGenerator};
pub use client::{strip_quotes, GenerationClient};
