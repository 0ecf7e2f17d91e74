use std::collections::BTreeMap;

use dubfit::corpus::FewShotCorpus;
use dubfit::error::CorpusError;
use dubfit::prompt::{
    build_validation_prompt, retry_feedback, validate_heuristic, DurationTier, Glossary,
    PromptBuilder,
};
use dubfit::segment::{EmotionTag, Segment};
use dubfit::AdaptationConfig;

fn builder(config: &AdaptationConfig) -> PromptBuilder {
    let corpus = FewShotCorpus::bundled().unwrap();
    PromptBuilder::new(config, &corpus).unwrap()
}

fn glossary(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(s, t)| (s.to_string(), t.to_string()))
        .collect()
}

#[test]
fn test_prompt_is_deterministic() {
    let prompts = builder(&AdaptationConfig::new("en", "es"));
    let segment = Segment::new(4, 1000, 3500, "Where are you going?")
        .with_context(Some("Stop right there."), Some("I'm coming with you."));

    let first = prompts.build_prompt(&segment, 0, None);
    let second = prompts.build_prompt(&segment, 0, None);
    assert_eq!(first, second, "Same inputs must give the same prompt");

    assert!(first.contains("EXAMPLES OF TIMING-AWARE ADAPTATIONS"));
    assert!(first.contains("TRANSLATE THIS LINE (and only this line): \"Where are you going?\""));
    assert!(first.contains("Previous line: \"Stop right there.\""));
    assert!(first.contains("Next line: \"I'm coming with you.\""));
    assert!(first.contains("TARGET LANGUAGE: Spanish"));
    assert!(!first.contains("RETRY REQUIRED"));
    assert!(!first.contains("TIMING GUIDANCE"));
}

#[test]
fn test_word_guidance_follows_duration_tier() {
    let prompts = builder(&AdaptationConfig::new("en", "es"));

    let cases = [
        (500, "Use 1-2 words"),
        (1500, "Use 3-5 words"),
        (3000, "Use 6-10 words"),
        (5000, "Use 10-15 words"),
    ];
    for (end_ms, expected) in cases {
        let segment = Segment::new(1, 0, end_ms, "Some line of dialogue");
        let prompt = prompts.build_prompt(&segment, 0, None);
        assert!(
            prompt.contains(expected),
            "{}ms segment should say '{}'",
            end_ms,
            expected
        );
    }

    assert_eq!(DurationTier::for_duration(0.99), DurationTier::VeryShort);
    assert_eq!(DurationTier::for_duration(1.0), DurationTier::Short);
    assert_eq!(DurationTier::for_duration(2.0), DurationTier::Medium);
    assert_eq!(DurationTier::for_duration(4.0), DurationTier::Long);
}

#[test]
fn test_glossary_and_emotion_sections() {
    let config =
        AdaptationConfig::new("en", "es").with_glossary(glossary(&[("Citadel", "Ciudadela")]));
    let prompts = builder(&config);
    let segment =
        Segment::new(2, 0, 2000, "Welcome to the Citadel").with_emotion(EmotionTag::Excited);

    let prompt = prompts.build_prompt(&segment, 0, None);
    assert!(prompt.contains("REQUIRED TERMINOLOGY"));
    assert!(prompt.contains("\"Citadel\" -> \"Ciudadela\""));
    assert!(prompt.contains("EMOTION: excited"));
    assert!(prompt.contains("Keep the excited emotional tone."));

    let plain = builder(&AdaptationConfig::new("en", "es"));
    assert!(!plain
        .build_prompt(&segment, 0, None)
        .contains("REQUIRED TERMINOLOGY"));
}

#[test]
fn test_first_attempt_feedback_is_timing_guidance() {
    let prompts = builder(&AdaptationConfig::new("en", "es"));
    let segment = Segment::new(1, 0, 2000, "Hello there");

    let prompt = prompts.build_prompt(&segment, 0, Some("CHARACTER GUIDANCE:\n- be brief"));
    assert!(prompt.contains("TIMING GUIDANCE"));
    assert!(prompt.contains("be brief"));
    assert!(!prompt.contains("RETRY REQUIRED"));
}

#[test]
fn test_retry_block_picks_strategy_from_feedback() {
    let prompts = builder(&AdaptationConfig::new("en", "es"));
    let segment = Segment::new(1, 0, 3000, "I think we should leave now");

    // 1. Too long -> cut
    let too_long = retry_feedback("Creo que deberíamos irnos ahora mismo", 3.75, 3.0, 1);
    let prompt = prompts.build_prompt(&segment, 1, Some(&too_long));
    assert!(prompt.contains("RETRY REQUIRED (attempt 2)"));
    assert!(prompt.contains("the line was TOO LONG"));
    assert!(prompt.contains("25.0%"));

    // 2. Too short -> expand
    let too_short = retry_feedback("Vamos", 1.5, 3.0, 2);
    let prompt = prompts.build_prompt(&segment, 2, Some(&too_short));
    assert!(prompt.contains("RETRY REQUIRED (attempt 3)"));
    assert!(prompt.contains("the line was TOO SHORT"));
    assert!(!prompt.contains("the line was TOO LONG"));

    // 3. Words-per-second heuristic feedback also counts as too long
    let prompt = prompts.build_prompt(&segment, 1, Some("Speaking too fast for the window"));
    assert!(prompt.contains("the line was TOO LONG"));
}

#[test]
fn test_missing_pair_is_rejected_when_required() {
    let corpus = FewShotCorpus::bundled().unwrap();

    let strict = AdaptationConfig::new("en", "ja");
    match PromptBuilder::new(&strict, &corpus) {
        Err(CorpusError::MissingPair(pair)) => assert_eq!(pair, "en-ja"),
        other => panic!("expected MissingPair, got {:?}", other.map(|_| ())),
    }

    let mut relaxed = AdaptationConfig::new("en", "ja");
    relaxed.require_few_shot = false;
    let prompts = PromptBuilder::new(&relaxed, &corpus).unwrap();
    assert!(prompts.examples().is_empty());
    let prompt = prompts.build_prompt(&Segment::new(1, 0, 2000, "Hello"), 0, None);
    assert!(!prompt.contains("EXAMPLES OF TIMING-AWARE ADAPTATIONS"));
    assert!(prompt.contains("TARGET LANGUAGE: Japanese"));
}

#[test]
fn test_validation_prompt_asks_for_yes_or_no() {
    let prompt = build_validation_prompt("Get out!", "¡Fuera!", 0.5, "es");
    assert!(prompt.contains("Spanish"));
    assert!(prompt.contains("Translation: \"¡Fuera!\""));
    assert!(prompt.contains("Time limit: 0.5 seconds"));
    assert!(prompt.ends_with("\"NO\" if it is too long or too short."));
}

#[test]
fn test_heuristic_accepts_natural_adaptation() {
    let outcome = validate_heuristic(
        "I think we should leave before the storm arrives.",
        "Creo que deberíamos irnos antes de la tormenta.",
        3.0,
    );
    assert!(outcome.is_valid, "unexpected rejection: {}", outcome.feedback);
    assert_eq!(outcome.feedback, "passed heuristic validation");
}

#[test]
fn test_heuristic_rules_in_order() {
    // Character ratio above 2.0
    let outcome = validate_heuristic("Hi", "Hola amigo", 2.0);
    assert!(!outcome.is_valid);
    assert!(outcome.feedback.starts_with("too long"), "{}", outcome.feedback);

    // Character ratio below 0.4
    let outcome = validate_heuristic("I really think we should go now", "Ya", 2.0);
    assert!(!outcome.is_valid);
    assert!(outcome.feedback.starts_with("too short"), "{}", outcome.feedback);

    // More than 4.5 words per second
    let outcome = validate_heuristic(
        "one two three four five six seven eight nine ten",
        "uno dos tres cuatro cinco seis siete ocho nueve diez",
        2.0,
    );
    assert!(!outcome.is_valid);
    assert!(outcome.feedback.contains("words/sec"), "{}", outcome.feedback);

    // Under a second with more than two words
    let outcome = validate_heuristic("Get out of here", "Sal de aquí", 0.9);
    assert!(!outcome.is_valid);
    assert!(outcome.feedback.contains("1-2 words"), "{}", outcome.feedback);

    // Under two seconds with more than five words
    let outcome = validate_heuristic("I do not want to go there", "No quiero ir allí ya mismo", 1.5);
    assert!(!outcome.is_valid);
    assert!(outcome.feedback.contains("5 words maximum"), "{}", outcome.feedback);

    // Long window, too few words
    let outcome = validate_heuristic("Come here now", "Ven aquí ahora", 5.0);
    assert!(!outcome.is_valid);
    assert!(outcome.feedback.starts_with("too short"), "{}", outcome.feedback);

    // Empty source line: any text is too long
    let outcome = validate_heuristic("", "Hola", 2.0);
    assert!(!outcome.is_valid);
    assert!(outcome.feedback.starts_with("too long"), "{}", outcome.feedback);
}

#[test]
fn test_glossary_prefers_longest_match() {
    let g = Glossary::new(&glossary(&[("Star", "Estrella"), ("Star Fleet", "Flota Estelar")]));
    assert_eq!(
        g.apply("the star fleet and a star"),
        "the Flota Estelar and a Estrella"
    );
    let order: Vec<&str> = g.terms().map(|(s, _)| s).collect();
    assert_eq!(order, vec!["Star Fleet", "Star"]);
}

#[test]
fn test_glossary_never_rescans_replacements() {
    let g = Glossary::new(&glossary(&[("cat", "dog"), ("dog", "wolf")]));
    assert_eq!(g.apply("cat dog"), "dog wolf");
}
