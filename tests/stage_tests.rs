mod common;

use std::sync::Arc;

use common::{client_for, CountingTrigger, EchoSynthesizer, FakeProbe, Reply, ScriptedGenerator};
use dubfit::adaptation::AdaptationService;
use dubfit::corpus::FewShotCorpus;
use dubfit::error::{AdaptationError, StoreError};
use dubfit::orchestrator::DurationValidatedOrchestrator;
use dubfit::segment::{ContextMap, InMemorySegmentStore, Segment, SegmentStatus, SegmentStore};
use dubfit::services::{MemoryAudioStore, VoiceSelector};
use dubfit::stage::{AdaptationStage, PipelineGate, StageEngine};
use dubfit::AdaptationConfig;

const PROJECT: &str = "proj-42";
const STORM_EN: &str = "I think we should leave before the storm arrives.";
const STORM_ES: &str = "Creo que deberíamos irnos antes de la tormenta.";

/// Answers with a fixed rendering per source line.
fn translating_generator() -> ScriptedGenerator {
    ScriptedGenerator::with_responder(vec![], |request| {
        let marker = "TRANSLATE THIS LINE (and only this line): \"";
        let line = request
            .prompt
            .find(marker)
            .map(|i| &request.prompt[i + marker.len()..])
            .and_then(|rest| rest.split('"').next())
            .unwrap_or_default();
        let text = match line {
            STORM_EN => STORM_ES,
            "Get out!" => "¡Fuera!",
            "Stay with me" => "Quédate conmigo",
            _ => "Texto",
        };
        Reply::text(text)
    })
}

fn context_map() -> ContextMap {
    let mut done = Segment::new(4, 7000, 9000, "Already handled");
    done.adapted_text = Some("Ya hecho".to_string());
    done.status = SegmentStatus::Success;
    done.attempts = 1;

    let mut speaker_two = Segment::new(3, 4000, 6000, "Stay with me");
    speaker_two.speaker = "SPEAKER_01".to_string();

    ContextMap::new(
        PROJECT,
        "en",
        "es",
        vec![
            Segment::new(1, 0, 3000, STORM_EN),
            Segment::new(2, 3000, 3500, "Get out!"),
            speaker_two,
            done,
        ],
    )
}

async fn store() -> Arc<InMemorySegmentStore> {
    let store = Arc::new(InMemorySegmentStore::new());
    store.insert(context_map()).await;
    store
}

fn validated_engine(synthesizer: EchoSynthesizer, max_attempts: u32) -> StageEngine {
    let corpus = FewShotCorpus::bundled().unwrap();
    let probe = FakeProbe::by_text(
        &[(STORM_ES, 3.0), ("¡Fuera!", 0.5), ("Quédate conmigo", 9.0)],
        9.0,
    );
    let orchestrator = DurationValidatedOrchestrator::new(
        AdaptationConfig::new("en", "es").with_max_attempts(max_attempts),
        &corpus,
        client_for(Arc::new(translating_generator())),
        Arc::new(synthesizer),
        Arc::new(probe),
        Arc::new(MemoryAudioStore::new()),
    )
    .unwrap();
    StageEngine::Validated(Arc::new(orchestrator))
}

#[tokio::test]
async fn test_validated_run_writes_back_and_triggers() {
    let store = store().await;
    let trigger = Arc::new(CountingTrigger::default());
    let stage = AdaptationStage::new(
        store.clone(),
        validated_engine(EchoSynthesizer::new(), 2),
        trigger.clone(),
        3,
    );

    let report = stage.run(PROJECT, &VoiceSelector::default()).await.unwrap();

    // 1. Only pending segments were processed, in order
    let ids: Vec<u64> = report.results.iter().map(|r| r.segment_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(report.stats.successful, 2);
    assert!(report.triggered_next_stage, "2 of 3 meets the default gate");
    assert_eq!(trigger.count(), 1);
    assert_eq!(*trigger.projects.lock().unwrap(), vec![PROJECT.to_string()]);

    // 2. Store carries the adaptation fields
    let map = store.get(PROJECT).await.unwrap();
    let first = map.segment(1).unwrap();
    assert_eq!(first.status, SegmentStatus::Success);
    assert_eq!(first.adapted_text.as_deref(), Some(STORM_ES));
    assert_eq!(first.attempts, 1);
    assert_eq!(
        first.validation_feedback.as_deref(),
        Some("Duration: 3.00s (target: 3.00s)")
    );
    assert_eq!(
        first.generated_audio_ref.as_deref(),
        Some("mem://segment_1/attempt1")
    );

    let third = map.segment(3).unwrap();
    assert_eq!(third.status, SegmentStatus::FailedAdaptation);
    assert_eq!(third.adapted_text.as_deref(), Some("Quédate conmigo"));
    assert_eq!(third.attempts, 2);
    assert_eq!(third.generated_audio_ref, None, "Best-effort audio is not committed");
    assert_eq!(third.speaker, "SPEAKER_01", "Source fields are untouched");

    let untouched = map.segment(4).unwrap();
    assert_eq!(untouched.adapted_text.as_deref(), Some("Ya hecho"));

    // 3. Report has both summaries
    assert!(report.report.contains("Duration-validated adaptation summary"));
    assert!(report.report.contains("Adaptation summary"));
    assert!(report.report.contains("- Segment 3 [failed_adaptation]"));
}

#[tokio::test]
async fn test_gate_halts_below_threshold() {
    let store = store().await;
    let trigger = Arc::new(CountingTrigger::default());
    let stage = AdaptationStage::new(
        store.clone(),
        validated_engine(EchoSynthesizer::new(), 2),
        trigger.clone(),
        1,
    )
    .with_gate(PipelineGate::new(90.0));

    let report = stage.run(PROJECT, &VoiceSelector::default()).await.unwrap();

    assert!(!report.triggered_next_stage);
    assert_eq!(trigger.count(), 0);
    assert!((report.stats.success_rate - 200.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_synthesis_failure_maps_to_failed_tts() {
    let store = store().await;
    let trigger = Arc::new(CountingTrigger::default());
    let stage = AdaptationStage::new(
        store.clone(),
        validated_engine(EchoSynthesizer::always_failing(), 1),
        trigger.clone(),
        2,
    );

    let report = stage.run(PROJECT, &VoiceSelector::default()).await.unwrap();

    assert_eq!(report.stats.successful, 0);
    let map = store.get(PROJECT).await.unwrap();
    for id in 1..=3 {
        let segment = map.segment(id).unwrap();
        assert_eq!(segment.status, SegmentStatus::FailedTts, "segment {}", id);
        assert_eq!(segment.adapted_text.as_deref(), Some(segment.text.as_str()));
        assert_eq!(segment.attempts, 0);
        assert_eq!(segment.generated_audio_ref, None);
    }
    assert!(!report.triggered_next_stage);
}

#[tokio::test]
async fn test_nothing_pending_still_triggers() {
    let mut map = context_map();
    for segment in &mut map.segments {
        segment.adapted_text = Some("hecho".to_string());
        segment.status = SegmentStatus::Success;
    }
    let store = Arc::new(InMemorySegmentStore::new());
    store.insert(map).await;
    let trigger = Arc::new(CountingTrigger::default());
    let stage = AdaptationStage::new(
        store,
        validated_engine(EchoSynthesizer::new(), 2),
        trigger.clone(),
        3,
    );

    let report = stage.run(PROJECT, &VoiceSelector::default()).await.unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.stats.success_rate, 100.0);
    assert!(report.triggered_next_stage);
    assert_eq!(trigger.count(), 1);
}

#[tokio::test]
async fn test_failed_segments_are_retried_on_next_run() {
    let mut map = context_map();
    if let Some(segment) = map.segment_mut(4) {
        segment.status = SegmentStatus::FailedAdaptation;
    }
    let store = Arc::new(InMemorySegmentStore::new());
    store.insert(map).await;
    let stage = AdaptationStage::new(
        store,
        validated_engine(EchoSynthesizer::new(), 1),
        Arc::new(CountingTrigger::default()),
        3,
    );

    let report = stage.run(PROJECT, &VoiceSelector::default()).await.unwrap();
    let ids: Vec<u64> = report.results.iter().map(|r| r.segment_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_lightweight_run_writes_without_audio() {
    let store = store().await;
    let corpus = FewShotCorpus::bundled().unwrap();
    let service = AdaptationService::new(
        AdaptationConfig::new("en", "es"),
        &corpus,
        client_for(Arc::new(translating_generator())),
    )
    .unwrap();
    let trigger = Arc::new(CountingTrigger::default());
    let stage = AdaptationStage::new(
        store.clone(),
        StageEngine::Lightweight(Arc::new(service)),
        trigger.clone(),
        2,
    );

    let report = stage.run(PROJECT, &VoiceSelector::default()).await.unwrap();
    assert_eq!(report.results.len(), 3);
    assert!(report.report.starts_with("Adaptation summary"));

    let map = store.get(PROJECT).await.unwrap();
    let first = map.segment(1).unwrap();
    assert_eq!(first.status, SegmentStatus::Success);
    assert_eq!(first.adapted_text.as_deref(), Some(STORM_ES));
    assert_eq!(first.generated_audio_ref, None);
    assert_eq!(
        first.validation_feedback.as_deref(),
        Some("passed heuristic validation")
    );
}

#[tokio::test]
async fn test_unknown_project_is_an_error() {
    let store = Arc::new(InMemorySegmentStore::new());
    let stage = AdaptationStage::new(
        store,
        validated_engine(EchoSynthesizer::new(), 1),
        Arc::new(CountingTrigger::default()),
        1,
    );

    let err = stage
        .run("missing", &VoiceSelector::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdaptationError::Store(StoreError::ProjectNotFound(_))
    ));
}
