use std::collections::BTreeMap;

/// Mandatory term substitutions.
///
/// Matching is case-insensitive and longest-source-first, in a single
/// left-to-right pass. Replacement text is never scanned again, so one
/// term's target can't be rewritten by another entry.
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    entries: Vec<GlossaryEntry>,
}

#[derive(Debug, Clone)]
struct GlossaryEntry {
    source: String,
    pattern: Vec<char>,
    target: String,
}

impl Glossary {
    pub fn new(terms: &BTreeMap<String, String>) -> Self {
        let mut entries: Vec<GlossaryEntry> = terms
            .iter()
            .filter(|(source, _)| !source.is_empty())
            .map(|(source, target)| GlossaryEntry {
                source: source.clone(),
                pattern: source.to_lowercase().chars().collect(),
                target: target.clone(),
            })
            .collect();

        entries.sort_by(|a, b| {
            b.pattern
                .len()
                .cmp(&a.pattern.len())
                .then_with(|| a.source.cmp(&b.source))
        });

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(source, target)` pairs in match priority order.
    pub fn terms(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
    }

    pub fn apply(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }

        // Lowercasing can expand one char into several ('İ' -> "i̇"), so
        // matching runs over the folded stream and must end on a char boundary.
        let chars: Vec<char> = text.chars().collect();
        let mut folded = Vec::with_capacity(chars.len());
        let mut owner = Vec::with_capacity(chars.len());
        let mut starts = Vec::with_capacity(chars.len());
        for (index, c) in chars.iter().enumerate() {
            starts.push(folded.len());
            for lower in c.to_lowercase() {
                folded.push(lower);
                owner.push(index);
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut i = 0;

        'scan: while i < chars.len() {
            let from = starts[i];
            for entry in &self.entries {
                let end = from + entry.pattern.len();
                if end <= folded.len()
                    && folded[from..end] == entry.pattern[..]
                    && (end == folded.len() || owner[end] != owner[end - 1])
                {
                    out.push_str(&entry.target);
                    i = owner[end - 1] + 1;
                    continue 'scan;
                }
            }
            out.push(chars[i]);
            i += 1;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glossary(pairs: &[(&str, &str)]) -> Glossary {
        let map = pairs
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect();
        Glossary::new(&map)
    }

    #[test]
    fn replaces_case_insensitively() {
        let g = glossary(&[("Gotham", "GOTHAM")]);
        assert_eq!(g.apply("the gotham and the GOTHAM"), "the GOTHAM and the GOTHAM");
    }

    #[test]
    fn multi_char_lowercase_matches_consistently() {
        let g = glossary(&[("İstanbul", "Estambul")]);
        assert_eq!(g.apply("Welcome to İSTANBUL"), "Welcome to Estambul");
        assert_eq!(g.apply("Welcome to i\u{307}stanbul"), "Welcome to Estambul");
        assert_eq!(g.apply("Welcome to istanbul"), "Welcome to istanbul");
    }

    #[test]
    fn match_must_end_on_a_char_boundary() {
        let g = glossary(&[("i", "X")]);
        assert_eq!(g.apply("İ"), "İ");
        assert_eq!(g.apply("hi"), "hX");
    }

    #[test]
    fn empty_source_is_ignored() {
        let g = glossary(&[("", "x")]);
        assert!(g.is_empty());
        assert_eq!(g.apply("abc"), "abc");
    }
}
