mod common;

use common::wav_bytes;
use dubfit::error::{ConfigError, StoreError};
use dubfit::segment::{
    ContextMap, JsonFileSegmentStore, Segment, SegmentPatch, SegmentStatus, SegmentStore,
};
use dubfit::services::{AudioStore, DurationProbe, FsAudioStore, WavDurationProbe};
use dubfit::Settings;

fn sample_map() -> ContextMap {
    ContextMap::new(
        "film-1",
        "en",
        "es",
        vec![
            Segment::new(1, 0, 1500, "Hello there"),
            Segment::new(2, 1500, 4000, "Where are you going?"),
        ],
    )
}

#[tokio::test]
async fn test_json_store_round_trip_and_partial_update() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileSegmentStore::new(dir.path());
    store.save(&sample_map()).await.unwrap();
    assert!(store.path_for("film-1").exists());

    // 1. Patch one segment
    let patch = SegmentPatch::adapted("Hola", SegmentStatus::Success, 2, Some("ok".to_string()))
        .with_audio_ref("temp/segment_1_attempt2.wav");
    store.update_fields("film-1", 1, &patch).await.unwrap();

    // 2. A fresh store instance sees the change
    let reopened = JsonFileSegmentStore::new(dir.path());
    let map = reopened.get("film-1").await.unwrap();
    let first = map.segment(1).unwrap();
    assert_eq!(first.adapted_text.as_deref(), Some("Hola"));
    assert_eq!(first.status, SegmentStatus::Success);
    assert_eq!(first.attempts, 2);
    assert_eq!(
        first.generated_audio_ref.as_deref(),
        Some("temp/segment_1_attempt2.wav")
    );
    assert_eq!(first.text, "Hello there");

    let second = map.segment(2).unwrap();
    assert_eq!(second.adapted_text, None);
    assert_eq!(second.status, SegmentStatus::Pending);

    // 3. Fields absent from a patch are left alone
    let status_only = SegmentPatch {
        status: Some(SegmentStatus::FailedTts),
        ..SegmentPatch::default()
    };
    reopened.update_fields("film-1", 1, &status_only).await.unwrap();
    let first = reopened.get("film-1").await.unwrap().segment(1).cloned().unwrap();
    assert_eq!(first.status, SegmentStatus::FailedTts);
    assert_eq!(first.adapted_text.as_deref(), Some("Hola"));
}

#[tokio::test]
async fn test_json_store_missing_entries() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileSegmentStore::new(dir.path());

    assert!(matches!(
        store.get("nope").await,
        Err(StoreError::ProjectNotFound(_))
    ));

    store.save(&sample_map()).await.unwrap();
    let patch = SegmentPatch::adapted("x", SegmentStatus::Success, 1, None);
    assert!(matches!(
        store.update_fields("film-1", 99, &patch).await,
        Err(StoreError::SegmentNotFound { segment_id: 99, .. })
    ));
}

#[test]
fn test_patch_is_idempotent() {
    let mut segment = Segment::new(1, 0, 1000, "Hi");
    let patch = SegmentPatch::adapted("Hola", SegmentStatus::Success, 1, None);
    assert!(!patch.is_empty());
    assert!(SegmentPatch::default().is_empty());

    patch.apply(&mut segment);
    let once = segment.clone();
    patch.apply(&mut segment);
    assert_eq!(segment, once);
    assert!(!segment.needs_adaptation());
}

#[test]
fn test_context_map_validation_and_summary() {
    let mut map = sample_map();
    assert!(map.validate().is_empty());

    map.segments.push(Segment::new(3, 3500, 3400, " "));
    let errors = map.validate();
    assert!(errors.iter().any(|e| e.contains("end_ms must be greater")));
    assert!(errors.iter().any(|e| e.contains("Missing text")));
    assert!(errors.iter().any(|e| e.contains("overlap")));

    if let Some(segment) = map.segment_mut(1) {
        segment.status = SegmentStatus::Success;
        segment.attempts = 3;
    }
    let summary = map.summary();
    assert_eq!(summary.total_segments, 3);
    assert_eq!(summary.successful_segments, 1);
    assert_eq!(summary.pending_segments, 2);
    assert_eq!(summary.average_attempts, 1.0);
}

#[test]
fn test_segment_wire_format() {
    let json = r#"{"id":5,"start_ms":1000,"end_ms":2500,"text":"Hey","speaker":"SPEAKER_02","emotion":"angry","status":"failed_adaptation"}"#;
    let segment: Segment = serde_json::from_str(json).unwrap();
    assert_eq!(segment.duration(), 1.5);
    assert_eq!(segment.status, SegmentStatus::FailedAdaptation);
    assert!(segment.needs_adaptation());

    let out = serde_json::to_value(&segment).unwrap();
    assert_eq!(out["emotion"], "angry");
    assert!(out.get("adapted_text").is_none());
}

#[tokio::test]
async fn test_wav_probe_reads_exact_duration() {
    let audio = wav_bytes(1.5, 16_000);
    let seconds = WavDurationProbe.duration(&audio).await.unwrap();
    assert!((seconds - 1.5).abs() < 1e-9, "measured {}", seconds);

    assert!(WavDurationProbe.duration(b"not a wav file").await.is_err());
}

#[tokio::test]
async fn test_wav_probe_handles_streamed_placeholder_sizes() {
    let mut audio = wav_bytes(1.0, 24_000);
    let data = audio
        .windows(4)
        .position(|w| w == b"data")
        .expect("data chunk");
    audio[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    audio[data + 4..data + 8].copy_from_slice(&u32::MAX.to_le_bytes());

    let seconds = WavDurationProbe.duration(&audio).await.unwrap();
    assert!((seconds - 1.0).abs() < 1e-9, "measured {}", seconds);

    // Truncated stream: only the frames that arrived count
    audio.truncate(audio.len() - 24_000);
    let seconds = WavDurationProbe::measure(&audio).unwrap();
    assert!((seconds - 0.5).abs() < 1e-9, "measured {}", seconds);
}

#[tokio::test]
async fn test_fs_audio_store_writes_named_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsAudioStore::new(dir.path().join("takes"));
    let audio = wav_bytes(0.25, 8_000);

    let reference = store.persist(12, 3, &audio).await.unwrap();
    assert!(reference.ends_with("segment_12_attempt3.wav"));
    assert_eq!(std::fs::read(&reference).unwrap(), audio);
}

#[test]
fn test_settings_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dubfit.toml");
    std::fs::write(
        &path,
        "[adaptation]\ntarget_language = \"fr\"\nmax_attempts = 4\n\n[generation]\nmin_interval_ms = 250\n",
    )
    .unwrap();

    let settings = Settings::load(Some(path.as_path())).unwrap();
    assert_eq!(settings.adaptation.target_language, "fr");
    assert_eq!(settings.adaptation.max_attempts, 4);
    assert_eq!(settings.adaptation.tolerance_percent, 15.0);
    assert_eq!(settings.generation.min_interval_ms, 250);
    assert_eq!(settings.synthesis.default_voice, "alloy");

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[adaptation]\nmax_attempts = 0\n").unwrap();
    assert!(matches!(
        Settings::load(Some(bad.as_path())),
        Err(ConfigError::InvalidValue { .. })
    ));
}
