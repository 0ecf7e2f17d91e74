use serde::{Deserialize, Serialize};

// Allowed: IDs, durations, counts, enums.
// Forbidden: dialogue text, prompts, audio bytes.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdaptationEvent {
    AttemptMeasured {
        segment_id: u64,
        attempt: u32,
        measured_secs: f64,
        target_secs: f64,
        within_tolerance: bool,
    },

    SegmentCompleted {
        segment_id: u64,
        attempts: u32,
        outcome: SegmentOutcome,
    },

    BypassUsed {
        segment_id: u64,
        source: BypassSource,
    },

    ModelFallback {
        from_index: usize,
        to_index: usize,
    },

    RateLimitBackoff {
        retry: u32,
        delay_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentOutcome {
    Accepted,
    BestEffort,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BypassSource {
    Phrasebook,
    Generation,
    SourceText,
}
