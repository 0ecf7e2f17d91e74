use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTag {
    Neutral,
    Happy,
    Sad,
    Angry,
    Excited,
    Fearful,
    Surprised,
    Disgusted,
}

impl EmotionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionTag::Neutral => "neutral",
            EmotionTag::Happy => "happy",
            EmotionTag::Sad => "sad",
            EmotionTag::Angry => "angry",
            EmotionTag::Excited => "excited",
            EmotionTag::Fearful => "fearful",
            EmotionTag::Surprised => "surprised",
            EmotionTag::Disgusted => "disgusted",
        }
    }
}

/// Adaptation lifecycle of a segment as stored in the Context Map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    #[default]
    Pending,
    Success,
    FailedAdaptation,
    FailedTts,
    FailedVocalIsolation,
}

impl SegmentStatus {
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            SegmentStatus::FailedAdaptation
                | SegmentStatus::FailedTts
                | SegmentStatus::FailedVocalIsolation
        )
    }
}

/// Minimal timed dialogue unit.
///
/// Source fields are written upstream and never touched here. Only the
/// adaptation fields change, and only through a `SegmentPatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: u64,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_line: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapted_text: Option<String>,
    #[serde(default)]
    pub status: SegmentStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_audio_ref: Option<String>,
}

impl Segment {
    pub fn new(id: u64, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            start_ms,
            end_ms,
            text: text.into(),
            speaker: "SPEAKER_00".to_string(),
            confidence: 1.0,
            emotion: None,
            previous_line: None,
            next_line: None,
            adapted_text: None,
            status: SegmentStatus::Pending,
            attempts: 0,
            validation_feedback: None,
            generated_audio_ref: None,
        }
    }

    pub fn with_emotion(mut self, emotion: EmotionTag) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn with_context(mut self, previous: Option<&str>, next: Option<&str>) -> Self {
        self.previous_line = previous.map(str::to_string);
        self.next_line = next.map(str::to_string);
        self
    }

    /// Time window in milliseconds. Zero for malformed bounds.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Time window in seconds.
    pub fn duration(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0
    }

    /// Still needs adaptation: nothing committed yet, or the last run failed it.
    pub fn needs_adaptation(&self) -> bool {
        self.adapted_text.is_none() || self.status == SegmentStatus::FailedAdaptation
    }
}

/// Partial update of the fields this core owns. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SegmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_audio_ref: Option<String>,
}

impl SegmentPatch {
    pub fn adapted(
        text: impl Into<String>,
        status: SegmentStatus,
        attempts: u32,
        feedback: Option<String>,
    ) -> Self {
        Self {
            adapted_text: Some(text.into()),
            status: Some(status),
            attempts: Some(attempts),
            validation_feedback: feedback,
            generated_audio_ref: None,
        }
    }

    pub fn with_audio_ref(mut self, audio_ref: impl Into<String>) -> Self {
        self.generated_audio_ref = Some(audio_ref.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &SegmentPatch::default()
    }

    /// Upsert only the fields present. Applying the same patch twice is a no-op.
    pub fn apply(&self, segment: &mut Segment) {
        if let Some(text) = &self.adapted_text {
            segment.adapted_text = Some(text.clone());
        }
        if let Some(status) = self.status {
            segment.status = status;
        }
        if let Some(attempts) = self.attempts {
            segment.attempts = attempts;
        }
        if let Some(feedback) = &self.validation_feedback {
            segment.validation_feedback = Some(feedback.clone());
        }
        if let Some(audio_ref) = &self.generated_audio_ref {
            segment.generated_audio_ref = Some(audio_ref.clone());
        }
    }
}

/// Per-project segment collection owned by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMap {
    pub project_id: String,
    pub source_language: String,
    pub target_language: String,
    #[serde(default)]
    pub original_duration_ms: u64,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextMapSummary {
    pub total_segments: usize,
    pub successful_segments: usize,
    pub failed_segments: usize,
    pub pending_segments: usize,
    pub average_attempts: f64,
    pub completion_rate: f64,
}

impl ContextMap {
    pub fn new(
        project_id: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        segments: Vec<Segment>,
    ) -> Self {
        let original_duration_ms = segments.iter().map(|s| s.end_ms).max().unwrap_or(0);
        Self {
            project_id: project_id.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            original_duration_ms,
            segments,
        }
    }

    pub fn segment(&self, id: u64) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn segment_mut(&mut self, id: u64) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.id == id)
    }

    /// Structural problems, one message per issue. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.project_id.is_empty() {
            errors.push("Missing project_id".to_string());
        }

        for (index, segment) in self.segments.iter().enumerate() {
            if segment.end_ms <= segment.start_ms {
                errors.push(format!("Segment {}: end_ms must be greater than start_ms", index));
            }
            if segment.text.trim().is_empty() {
                errors.push(format!("Segment {}: Missing text", index));
            }
            if segment.speaker.is_empty() {
                errors.push(format!("Segment {}: Missing speaker", index));
            }
        }

        for (i, pair) in self.segments.windows(2).enumerate() {
            if pair[0].end_ms > pair[1].start_ms {
                errors.push(format!("Segments {} and {} overlap", i, i + 1));
            }
        }

        errors
    }

    pub fn summary(&self) -> ContextMapSummary {
        let total_segments = self.segments.len();
        let successful_segments = self
            .segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Success)
            .count();
        let failed_segments = self.segments.iter().filter(|s| s.status.is_failed()).count();
        let pending_segments = self
            .segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Pending)
            .count();
        let total_attempts: u64 = self.segments.iter().map(|s| s.attempts as u64).sum();

        let (average_attempts, completion_rate) = if total_segments > 0 {
            (
                total_attempts as f64 / total_segments as f64,
                successful_segments as f64 / total_segments as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        ContextMapSummary {
            total_segments,
            successful_segments,
            failed_segments,
            pending_segments,
            average_attempts,
            completion_rate,
        }
    }
}
