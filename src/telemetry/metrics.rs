use std::collections::VecDeque;

use super::event::{AdaptationEvent, SegmentOutcome};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub segment_stats: SegmentStats,
    pub attempt_stats: AttemptStats,
    pub backend_stats: BackendStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentStats {
    pub total: u64,
    pub accepted: u64,
    pub best_effort: u64,
    pub errored: u64,
    pub bypassed: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptStats {
    /// One per synthesized and measured candidate.
    pub synthesis_calls: u64,
    pub within_tolerance: u64,
    pub out_of_tolerance: u64,
    pub total_abs_drift_secs: f64,
    pub mean_abs_drift_secs: f64,
    pub max_abs_drift_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendStats {
    pub model_fallbacks: u64,
    pub rate_limit_backoffs: u64,
    pub total_backoff_ms: u64,
}

pub fn compute_snapshot(events: &VecDeque<AdaptationEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            AdaptationEvent::AttemptMeasured {
                measured_secs,
                target_secs,
                within_tolerance,
                ..
            } => {
                let stats = &mut snap.attempt_stats;
                stats.synthesis_calls += 1;
                if *within_tolerance {
                    stats.within_tolerance += 1;
                } else {
                    stats.out_of_tolerance += 1;
                }
                let drift = (measured_secs - target_secs).abs();
                stats.total_abs_drift_secs += drift;
                if drift > stats.max_abs_drift_secs {
                    stats.max_abs_drift_secs = drift;
                }
            }
            AdaptationEvent::SegmentCompleted { outcome, .. } => {
                snap.segment_stats.total += 1;
                match outcome {
                    SegmentOutcome::Accepted => snap.segment_stats.accepted += 1,
                    SegmentOutcome::BestEffort => snap.segment_stats.best_effort += 1,
                    SegmentOutcome::Errored => snap.segment_stats.errored += 1,
                }
            }
            AdaptationEvent::BypassUsed { .. } => snap.segment_stats.bypassed += 1,
            AdaptationEvent::ModelFallback { .. } => snap.backend_stats.model_fallbacks += 1,
            AdaptationEvent::RateLimitBackoff { delay_ms, .. } => {
                snap.backend_stats.rate_limit_backoffs += 1;
                snap.backend_stats.total_backoff_ms += delay_ms;
            }
        }
    }

    if snap.attempt_stats.synthesis_calls > 0 {
        snap.attempt_stats.mean_abs_drift_secs =
            snap.attempt_stats.total_abs_drift_secs / snap.attempt_stats.synthesis_calls as f64;
    }

    snap
}
