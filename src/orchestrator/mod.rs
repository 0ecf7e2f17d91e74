//! Duration-validated adaptation.
//!
//! Every candidate is spoken by the synthesizer and measured before it is
//! accepted. The loop itself is driven by `AttemptMachine`, a pure
//! transition table that can be tested without any capability.

pub mod bypass;
pub mod machine;
pub mod report;
pub mod tolerance;
pub mod validated;

pub use bypass::{short_phrase_prompt, Phrasebook, ShortPhraseStrategy};
pub use machine::{AttemptEvent, AttemptMachine, AttemptPhase};
pub use report::validation_report;
pub use tolerance::{DurationCheck, TolerancePolicy};
pub use validated::{DurationValidatedOrchestrator, ValidatedResult, ValidatedStatus, ValidationAttempt};
