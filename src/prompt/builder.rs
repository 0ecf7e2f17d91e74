use std::fmt::Write;

use super::glossary::Glossary;
use super::heuristic::{validate_heuristic, ValidationOutcome};
use super::language::language_name;
use crate::config::AdaptationConfig;
use crate::corpus::{FewShotCorpus, FewShotExample};
use crate::error::CorpusError;
use crate::segment::Segment;

const RULE: &str = "==================================================\n";

/// Duration tier used for word-count guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationTier {
    VeryShort,
    Short,
    Medium,
    Long,
}

impl DurationTier {
    pub fn for_duration(seconds: f64) -> Self {
        if seconds < 1.0 {
            DurationTier::VeryShort
        } else if seconds < 2.0 {
            DurationTier::Short
        } else if seconds < 4.0 {
            DurationTier::Medium
        } else {
            DurationTier::Long
        }
    }

    /// Inclusive word range suggested for the tier.
    pub fn word_range(&self) -> (u32, u32) {
        match self {
            DurationTier::VeryShort => (1, 2),
            DurationTier::Short => (3, 5),
            DurationTier::Medium => (6, 10),
            DurationTier::Long => (10, 15),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DurationTier::VeryShort => "VERY SHORT SEGMENT",
            DurationTier::Short => "SHORT SEGMENT",
            DurationTier::Medium => "MEDIUM SEGMENT",
            DurationTier::Long => "LONGER SEGMENT",
        }
    }
}

/// Builds generation prompts for one language pair.
///
/// Pure: identical `(segment, attempt_index, feedback)` always yields the
/// identical prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    source_language: String,
    target_language: String,
    examples: Vec<FewShotExample>,
    glossary: Glossary,
}

impl PromptBuilder {
    /// Fails when the pair has no exemplars and `require_few_shot` is set.
    pub fn new(config: &AdaptationConfig, corpus: &FewShotCorpus) -> Result<Self, CorpusError> {
        let examples = if config.require_few_shot {
            corpus
                .require_pair(&config.source_language, &config.target_language)?
                .to_vec()
        } else {
            corpus
                .examples(&config.source_language, &config.target_language)
                .to_vec()
        };

        Ok(Self {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            examples,
            glossary: Glossary::new(&config.glossary),
        })
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn examples(&self) -> &[FewShotExample] {
        &self.examples
    }

    pub fn glossary(&self) -> &Glossary {
        &self.glossary
    }

    pub fn apply_glossary(&self, text: &str) -> String {
        self.glossary.apply(text)
    }

    pub fn validate_heuristic(
        &self,
        original: &str,
        candidate: &str,
        duration: f64,
    ) -> ValidationOutcome {
        validate_heuristic(original, candidate, duration)
    }

    /// Generation prompt for one attempt. `attempt_index` is 0-based; on the
    /// first attempt `previous_feedback` carries timing guidance, afterwards
    /// it describes what went wrong.
    pub fn build_prompt(
        &self,
        segment: &Segment,
        attempt_index: u32,
        previous_feedback: Option<&str>,
    ) -> String {
        let target_name = language_name(&self.target_language);
        let duration = segment.duration();
        let mut p = String::with_capacity(4096);

        let _ = write!(
            p,
            "You are a dubbing adaptation specialist. You are NOT translating word for word. \
             You are rewriting a line of dialogue so that it:\n\n\
             1. Fits the exact time window ({:.1} seconds)\n\
             2. Keeps the core meaning and emotional intent\n\
             3. Sounds natural when spoken aloud in {}\n\n\
             This is creative re-timing for actors, not document translation. If the \
             original cannot fit the window, shorten it and keep its essence.\n\n",
            duration, target_name
        );

        if !self.examples.is_empty() {
            p.push_str(RULE);
            p.push_str("EXAMPLES OF TIMING-AWARE ADAPTATIONS:\n");
            p.push_str(RULE);
            p.push('\n');
            for example in &self.examples {
                let _ = writeln!(p, "[{}s | {}]", example.duration, example.emotion);
                let _ = writeln!(p, "   Original: \"{}\"", example.source);
                let _ = writeln!(p, "   Adapted:  \"{}\"\n", example.target);
            }
        }

        p.push_str(RULE);
        p.push_str("TIMING GUIDELINES:\n");
        p.push_str(RULE);
        p.push('\n');
        let tier = DurationTier::for_duration(duration);
        let (min_words, max_words) = tier.word_range();
        let _ = writeln!(p, "{} ({:.1}s)", tier.label(), duration);
        let _ = writeln!(p, "   -> Use {}-{} words", min_words, max_words);
        match tier {
            DurationTier::VeryShort => {
                p.push_str("   -> Single exclamations or commands work best\n");
                p.push_str("   -> Example: \"Get out!\" -> \"¡Fuera!\"\n\n");
            }
            DurationTier::Short => {
                p.push_str("   -> Keep phrases brief and punchy\n\n");
            }
            DurationTier::Medium => {
                p.push_str("   -> One complete thought, about 2-3 words per second\n\n");
            }
            DurationTier::Long => {
                p.push_str("   -> One or two sentences at a natural speech rhythm\n\n");
            }
        }

        if !self.glossary.is_empty() {
            p.push_str(RULE);
            p.push_str("REQUIRED TERMINOLOGY (use these exact renderings):\n");
            p.push_str(RULE);
            p.push('\n');
            for (source, target) in self.glossary.terms() {
                let _ = writeln!(p, "   \"{}\" -> \"{}\"", source, target);
            }
            p.push('\n');
        }

        p.push_str(RULE);
        p.push_str("YOUR TASK:\n");
        p.push_str(RULE);
        p.push('\n');
        if let Some(previous) = &segment.previous_line {
            let _ = writeln!(p, "[Context, do not translate] Previous line: \"{}\"\n", previous);
        }
        let _ = writeln!(p, "TIME AVAILABLE: {:.1} seconds", duration);
        if let Some(emotion) = segment.emotion {
            let _ = writeln!(p, "EMOTION: {}", emotion.as_str());
        }
        let _ = writeln!(p, "TRANSLATE THIS LINE (and only this line): \"{}\"", segment.text);
        let _ = writeln!(p, "TARGET LANGUAGE: {}\n", target_name);
        if let Some(next) = &segment.next_line {
            let _ = writeln!(p, "[Context, do not translate] Next line: \"{}\"\n", next);
        }

        if let Some(feedback) = previous_feedback.filter(|f| !f.trim().is_empty()) {
            if attempt_index == 0 {
                p.push_str(RULE);
                p.push_str("TIMING GUIDANCE:\n");
                p.push_str(RULE);
                p.push('\n');
                p.push_str(feedback);
                p.push_str("\n\n");
            } else {
                self.push_retry_block(&mut p, feedback, duration, attempt_index);
            }
        }

        p.push_str(RULE);
        p.push_str("OUTPUT INSTRUCTIONS:\n");
        p.push_str(RULE);
        p.push('\n');
        let _ = writeln!(
            p,
            "Write a {} adaptation that can be spoken naturally in {:.1} seconds.",
            target_name, duration
        );
        if let Some(emotion) = segment.emotion {
            let _ = writeln!(p, "Keep the {} emotional tone.", emotion.as_str());
        }
        let _ = write!(
            p,
            "Respond with ONLY the adapted {} text. No quotes, no explanations, no notes.",
            target_name
        );

        p
    }

    fn push_retry_block(&self, p: &mut String, feedback: &str, duration: f64, attempt_index: u32) {
        p.push_str(RULE);
        let _ = writeln!(
            p,
            "RETRY REQUIRED (attempt {}): YOUR PREVIOUS ATTEMPT FAILED",
            attempt_index + 1
        );
        p.push_str(RULE);
        p.push('\n');
        let _ = writeln!(p, "Problem: {}\n", feedback);

        let lowered = feedback.to_lowercase();
        if lowered.contains("too long") || lowered.contains("too fast") {
            p.push_str("ACTION: the line was TOO LONG. Make it clearly shorter:\n");
            p.push_str("   - Remove filler words\n");
            p.push_str("   - Use shorter synonyms\n");
            p.push_str("   - Simplify the sentence structure\n");
            p.push_str("   - Before: \"I really don't think that's a good idea\"\n");
            p.push_str("     After:  \"Bad idea\"\n\n");
            if duration < 1.0 {
                let _ = writeln!(
                    p,
                    "For {:.1}s you need 1-2 words at most: \"Stop!\", not \"Please stop doing that!\"\n",
                    duration
                );
            }
        } else if lowered.contains("too short") {
            let _ = writeln!(
                p,
                "ACTION: the line was TOO SHORT. Add natural detail within {:.1}s:",
                duration
            );
            p.push_str("   - Use fuller expressions\n");
            p.push_str("   - Add natural filler words where they fit\n");
            p.push_str("   - Prefer more descriptive phrasing\n");
            p.push_str("   - Before: \"No\"\n");
            p.push_str("     After:  \"No, I don't think so\"\n\n");
        }
    }

    /// Strict yes/no judge prompt.
    pub fn build_validation_prompt(
        &self,
        original: &str,
        candidate: &str,
        duration: f64,
        target_language: &str,
    ) -> String {
        build_validation_prompt(original, candidate, duration, target_language)
    }
}

pub fn build_validation_prompt(
    original: &str,
    candidate: &str,
    duration: f64,
    target_language: &str,
) -> String {
    let target_name = language_name(target_language);
    format!(
        "You are a speech timing expert. Decide whether this {name} text can be spoken \
         naturally in {d:.1} seconds.\n\n\
         Original: \"{original}\"\n\
         Translation: \"{candidate}\"\n\
         Time limit: {d:.1} seconds\n\n\
         Consider a natural speech pace (typically 2-3 words per second), pauses and \
         breathing, and the emotional delivery.\n\n\
         Answer with ONLY \"YES\" if it fits naturally, or \"NO\" if it is too long or too short.",
        name = target_name,
        d = duration,
        original = original,
        candidate = candidate,
    )
}
