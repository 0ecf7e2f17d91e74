//! Few-shot exemplars keyed by `"src-tgt"` language pair.
//!
//! The corpus is validated once when it is loaded. A corpus that loads is
//! always well-formed, so prompt construction never has to re-check it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::CorpusError;

/// Minimum examples every pair in a corpus must carry.
pub const MIN_EXAMPLES_PER_PAIR: usize = 3;

const BUNDLED_CORPUS: &str = include_str!("../../data/few_shot_examples.json");

const REQUIRED_FIELDS: [&str; 6] = [
    "source",
    "target",
    "duration",
    "emotion",
    "source_char_count",
    "target_char_count",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub source: String,
    pub target: String,
    pub duration: f64,
    pub emotion: String,
    pub source_char_count: u32,
    pub target_char_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FewShotCorpus {
    pairs: BTreeMap<String, Vec<FewShotExample>>,
}

impl FewShotCorpus {
    /// Corpus shipped with the crate (en-es, en-fr, en-de).
    pub fn bundled() -> Result<Self, CorpusError> {
        Self::from_json(BUNDLED_CORPUS)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let corpus = Self::from_json(&content)?;
        info!("Loaded few-shot examples from {}", path.display());
        Ok(corpus)
    }

    pub fn from_json(json: &str) -> Result<Self, CorpusError> {
        let raw: BTreeMap<String, Vec<serde_json::Value>> = serde_json::from_str(json)?;
        let mut pairs = BTreeMap::new();

        for (pair, entries) in raw {
            if entries.len() < MIN_EXAMPLES_PER_PAIR {
                return Err(CorpusError::TooFewExamples {
                    pair,
                    required: MIN_EXAMPLES_PER_PAIR,
                    found: entries.len(),
                });
            }

            let mut examples = Vec::with_capacity(entries.len());
            for (index, entry) in entries.into_iter().enumerate() {
                examples.push(parse_example(&pair, index, entry)?);
            }
            pairs.insert(pair, examples);
        }

        Ok(Self { pairs })
    }

    /// Build from already-typed examples, applying the same checks as loading.
    pub fn from_pairs(pairs: BTreeMap<String, Vec<FewShotExample>>) -> Result<Self, CorpusError> {
        for (pair, examples) in &pairs {
            if examples.len() < MIN_EXAMPLES_PER_PAIR {
                return Err(CorpusError::TooFewExamples {
                    pair: pair.clone(),
                    required: MIN_EXAMPLES_PER_PAIR,
                    found: examples.len(),
                });
            }
            for (index, example) in examples.iter().enumerate() {
                check_duration(pair, index, example.duration)?;
            }
        }
        Ok(Self { pairs })
    }

    /// Examples for a pair, empty when the pair is unknown.
    pub fn examples(&self, source_language: &str, target_language: &str) -> &[FewShotExample] {
        let key = pair_key(source_language, target_language);
        match self.pairs.get(&key) {
            Some(examples) => examples,
            None => {
                warn!("No few-shot examples found for language pair: {}", key);
                &[]
            }
        }
    }

    pub fn supported_pairs(&self) -> Vec<&str> {
        self.pairs.keys().map(String::as_str).collect()
    }

    pub fn is_pair_supported(&self, source_language: &str, target_language: &str) -> bool {
        self.pairs
            .contains_key(&pair_key(source_language, target_language))
    }

    /// Fail unless the pair is present. Used when few-shot steering is mandatory.
    pub fn require_pair(
        &self,
        source_language: &str,
        target_language: &str,
    ) -> Result<&[FewShotExample], CorpusError> {
        let key = pair_key(source_language, target_language);
        self.pairs
            .get(&key)
            .map(Vec::as_slice)
            .ok_or(CorpusError::MissingPair(key))
    }
}

pub fn pair_key(source_language: &str, target_language: &str) -> String {
    format!("{}-{}", source_language, target_language)
}

fn parse_example(
    pair: &str,
    index: usize,
    entry: serde_json::Value,
) -> Result<FewShotExample, CorpusError> {
    let object = entry.as_object().ok_or_else(|| CorpusError::InvalidExample {
        pair: pair.to_string(),
        index,
        reason: "example must be an object".to_string(),
    })?;

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
        return Err(CorpusError::InvalidExample {
            pair: pair.to_string(),
            index,
            reason: format!("missing required field: {}", missing),
        });
    }

    let example: FewShotExample =
        serde_json::from_value(entry).map_err(|e| CorpusError::InvalidExample {
            pair: pair.to_string(),
            index,
            reason: e.to_string(),
        })?;
    check_duration(pair, index, example.duration)?;
    Ok(example)
}

fn check_duration(pair: &str, index: usize, duration: f64) -> Result<(), CorpusError> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(CorpusError::InvalidExample {
            pair: pair.to_string(),
            index,
            reason: "duration must be a positive number".to_string(),
        })
    }
}
