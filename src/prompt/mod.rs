//! Prompt construction and the cheap local checks that go with it.

pub mod builder;
pub mod feedback;
pub mod glossary;
pub mod heuristic;
pub mod language;

pub use builder::{build_validation_prompt, DurationTier, PromptBuilder};
pub use feedback::{character_guidance, retry_feedback};
pub use glossary::Glossary;
pub use heuristic::{validate_heuristic, word_count, ValidationOutcome};
pub use language::{expansion_factor, language_name};
