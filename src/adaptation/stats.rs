use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::segment::SegmentStatus;

/// Outcome of adapting one segment, in the form written back to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationResult {
    pub segment_id: u64,
    pub adapted_text: String,
    pub status: SegmentStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_feedback: Option<String>,
}

impl AdaptationResult {
    pub fn is_success(&self) -> bool {
        self.status == SegmentStatus::Success
    }

    /// Stand-in for a segment that was never adapted: keeps the source text.
    pub fn fallback(segment_id: u64, source_text: &str, status: SegmentStatus, reason: impl Into<String>) -> Self {
        Self {
            segment_id,
            adapted_text: source_text.to_string(),
            status,
            attempts: 0,
            validation_feedback: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptationStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percent of segments with status `success`.
    pub success_rate: f64,
    pub average_attempts: f64,
}

impl AdaptationStats {
    pub fn from_results(results: &[AdaptationResult]) -> Self {
        let total = results.len();
        let successful = results.iter().filter(|r| r.is_success()).count();
        let total_attempts: u64 = results.iter().map(|r| r.attempts as u64).sum();
        let (success_rate, average_attempts) = if total > 0 {
            (
                successful as f64 / total as f64 * 100.0,
                total_attempts as f64 / total as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            total,
            successful,
            failed: total - successful,
            success_rate,
            average_attempts,
        }
    }
}

/// Plain-text summary listing every failed segment and why.
pub fn summary_report(results: &[AdaptationResult]) -> String {
    let stats = AdaptationStats::from_results(results);
    let mut out = String::from("Adaptation summary\n");
    let _ = writeln!(out, "  Total segments:   {}", stats.total);
    let _ = writeln!(
        out,
        "  Successful:       {} ({:.1}%)",
        stats.successful, stats.success_rate
    );
    let _ = writeln!(out, "  Failed:           {}", stats.failed);
    let _ = writeln!(out, "  Average attempts: {:.2}", stats.average_attempts);

    if stats.failed > 0 {
        out.push_str("\nFailed segments:\n");
        for result in results.iter().filter(|r| !r.is_success()) {
            let _ = writeln!(
                out,
                "  - Segment {} [{}]: {}",
                result.segment_id,
                status_label(result.status),
                result.validation_feedback.as_deref().unwrap_or("no feedback")
            );
        }
    }

    out
}

fn status_label(status: SegmentStatus) -> &'static str {
    match status {
        SegmentStatus::Pending => "pending",
        SegmentStatus::Success => "success",
        SegmentStatus::FailedAdaptation => "failed_adaptation",
        SegmentStatus::FailedTts => "failed_tts",
        SegmentStatus::FailedVocalIsolation => "failed_vocal_isolation",
    }
}
