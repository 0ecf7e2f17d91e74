use std::collections::HashMap;

use crate::prompt::language_name;

/// Fixed renderings for very short lines, tried before any generation call.
pub trait ShortPhraseStrategy: Send + Sync {
    fn lookup(&self, text: &str, target_language: &str) -> Option<String>;
}

/// Per-language phrase table keyed by normalized source text.
#[derive(Debug, Clone, Default)]
pub struct Phrasebook {
    tables: HashMap<String, HashMap<String, String>>,
}

impl Phrasebook {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Common interjections for Spanish and French.
    pub fn builtin() -> Self {
        let mut book = Self::default();
        for (source, target) in [
            ("stay tuned", "Espera"),
            ("wait", "Espera"),
            ("yes", "Sí"),
            ("no", "No"),
            ("ok", "Vale"),
            ("thanks", "Gracias"),
            ("bye", "Adiós"),
        ] {
            book.insert("es", source, target);
        }
        for (source, target) in [
            ("stay tuned", "Attendez"),
            ("wait", "Attendez"),
            ("yes", "Oui"),
            ("no", "Non"),
            ("ok", "D'accord"),
            ("thanks", "Merci"),
            ("bye", "Salut"),
        ] {
            book.insert("fr", source, target);
        }
        book
    }

    pub fn insert(&mut self, target_language: &str, source: &str, target: &str) {
        self.tables
            .entry(target_language.to_string())
            .or_default()
            .insert(normalize(source), target.to_string());
    }
}

impl ShortPhraseStrategy for Phrasebook {
    fn lookup(&self, text: &str, target_language: &str) -> Option<String> {
        self.tables
            .get(target_language)?
            .get(&normalize(text))
            .cloned()
    }
}

/// Lowercase, trimmed, without surrounding punctuation.
fn normalize(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase()
}

/// Single constrained generation request used when the phrasebook misses.
pub fn short_phrase_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate to {}. Use the SHORTEST possible translation (1-2 words max): \"{}\"",
        language_name(target_language),
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_punctuation() {
        let book = Phrasebook::builtin();
        assert_eq!(book.lookup("Wait!", "es").as_deref(), Some("Espera"));
        assert_eq!(book.lookup("  Thanks. ", "fr").as_deref(), Some("Merci"));
        assert_eq!(book.lookup("Wait!", "de"), None);
        assert_eq!(book.lookup("Get out!", "es"), None);
    }
}
