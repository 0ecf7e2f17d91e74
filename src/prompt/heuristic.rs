use serde::{Deserialize, Serialize};

pub const MIN_CHAR_RATIO: f64 = 0.4;
pub const MAX_CHAR_RATIO: f64 = 2.0;
pub const MAX_WORDS_PER_SECOND: f64 = 4.5;
pub const MIN_WORDS_PER_SECOND: f64 = 0.8;

/// Pass/fail plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub feedback: String,
}

impl ValidationOutcome {
    pub fn pass(feedback: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            feedback: feedback.into(),
        }
    }

    pub fn fail(feedback: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            feedback: feedback.into(),
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Cheap length checks of a candidate against its time window.
///
/// Rules run in a fixed order and the first failure wins.
pub fn validate_heuristic(original: &str, candidate: &str, duration: f64) -> ValidationOutcome {
    let original_chars = original.chars().count();
    let candidate_chars = candidate.chars().count();

    if original_chars == 0 && candidate_chars > 0 {
        return ValidationOutcome::fail("too long (the original line has no text)");
    }
    if original_chars > 0 {
        let ratio = candidate_chars as f64 / original_chars as f64;
        if ratio > MAX_CHAR_RATIO {
            return ValidationOutcome::fail(format!(
                "too long (character count is {:.0}% of the original, limit 200%)",
                ratio * 100.0
            ));
        }
        if ratio < MIN_CHAR_RATIO {
            return ValidationOutcome::fail(format!(
                "too short (character count is {:.0}% of the original, floor 40%)",
                ratio * 100.0
            ));
        }
    }

    let words = word_count(candidate);
    let words_per_second = if duration > 0.0 {
        words as f64 / duration
    } else {
        f64::INFINITY
    };

    if words_per_second > MAX_WORDS_PER_SECOND {
        return ValidationOutcome::fail(format!(
            "too long ({:.1} words/sec would mean speaking too fast, reduce word count)",
            words_per_second
        ));
    }

    if duration < 1.0 && words > 2 {
        return ValidationOutcome::fail(format!(
            "too long for {:.1}s segment ({} words, use 1-2 words maximum)",
            duration, words
        ));
    }

    if duration < 2.0 && words > 5 {
        return ValidationOutcome::fail(format!(
            "too long for {:.1}s segment ({} words, use 5 words maximum)",
            duration, words
        ));
    }

    if duration > 2.0 && words_per_second < MIN_WORDS_PER_SECOND {
        return ValidationOutcome::fail(format!(
            "too short ({:.1} words/sec would leave awkward pauses)",
            words_per_second
        ));
    }

    ValidationOutcome::pass("passed heuristic validation")
}
