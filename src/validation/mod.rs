//! Two-stage translation validator: local heuristic, then an optional
//! semantic judge backed by the generation client.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::prompt::{build_validation_prompt, validate_heuristic, ValidationOutcome};
use crate::services::GenerationClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Run the heuristic stage. On by default.
    pub use_heuristic: bool,
    /// Stop after the heuristic stage.
    pub heuristic_only: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            use_heuristic: true,
            heuristic_only: false,
        }
    }
}

impl ValidationOptions {
    pub fn heuristic_only() -> Self {
        Self {
            use_heuristic: true,
            heuristic_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationItem {
    pub original: String,
    pub candidate: String,
    pub duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percent of items that passed.
    pub pass_rate: f64,
}

pub struct TranslationValidator {
    judge: Option<Arc<GenerationClient>>,
}

impl TranslationValidator {
    pub fn new(judge: Arc<GenerationClient>) -> Self {
        Self { judge: Some(judge) }
    }

    /// Validator without a judge; the semantic stage is skipped.
    pub fn heuristic() -> Self {
        Self { judge: None }
    }

    pub async fn validate(
        &self,
        original: &str,
        candidate: &str,
        duration: f64,
        target_language: &str,
        options: ValidationOptions,
    ) -> Result<ValidationOutcome, GenerationError> {
        let heuristic = if options.use_heuristic {
            let outcome = validate_heuristic(original, candidate, duration);
            if !outcome.is_valid {
                debug!("Heuristic validation failed: {}", outcome.feedback);
                return Ok(outcome);
            }
            Some(outcome)
        } else {
            None
        };

        if options.heuristic_only {
            return Ok(heuristic.unwrap_or_else(|| ValidationOutcome::pass("no checks requested")));
        }

        let judge = match &self.judge {
            Some(judge) => judge,
            None => {
                return heuristic.ok_or_else(|| {
                    GenerationError::Fatal("no semantic judge configured".to_string())
                })
            }
        };

        let prompt = build_validation_prompt(original, candidate, duration, target_language);
        match judge.validate(&prompt).await {
            Ok(answer) => Ok(interpret_judge(&answer, duration)),
            Err(e) => match heuristic {
                Some(outcome) => {
                    warn!("Semantic judge failed, keeping heuristic result: {}", e);
                    Ok(outcome)
                }
                None => Err(e),
            },
        }
    }

    /// Validate items one by one and tally the results.
    pub async fn validate_batch(
        &self,
        items: &[ValidationItem],
        target_language: &str,
        options: ValidationOptions,
    ) -> Result<(Vec<ValidationOutcome>, ValidationStats), GenerationError> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(
                self.validate(
                    &item.original,
                    &item.candidate,
                    item.duration,
                    target_language,
                    options,
                )
                .await?,
            );
        }
        let stats = validation_stats(&outcomes);
        Ok((outcomes, stats))
    }
}

/// Presence-based, case-insensitive. Ambiguous answers fail.
pub fn interpret_judge(answer: &str, duration: f64) -> ValidationOutcome {
    let upper = answer.to_uppercase();
    if upper.contains("YES") {
        ValidationOutcome::pass("passed semantic validation")
    } else if upper.contains("NO") {
        ValidationOutcome::fail(format!(
            "semantic judge: cannot be spoken naturally in {:.1}s",
            duration
        ))
    } else {
        ValidationOutcome::fail(format!("semantic judge gave an ambiguous answer: {}", answer.trim()))
    }
}

pub fn validation_stats(outcomes: &[ValidationOutcome]) -> ValidationStats {
    let total = outcomes.len();
    let passed = outcomes.iter().filter(|o| o.is_valid).count();
    let pass_rate = if total > 0 {
        passed as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    ValidationStats {
        total,
        passed,
        failed: total - passed,
        pass_rate,
    }
}
