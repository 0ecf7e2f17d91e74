use std::fmt::Write;

use super::validated::ValidatedResult;

/// Human-readable summary of a batch of duration-validated results.
pub fn validation_report(results: &[ValidatedResult]) -> String {
    let total = results.len();
    let successful = results.iter().filter(|r| r.is_success()).count();
    let failed = total - successful;
    let total_attempts: u64 = results.iter().map(|r| r.attempts as u64).sum();
    let synthesis_calls: usize = results.iter().map(|r| r.validation_history.len()).sum();
    let (success_rate, average_attempts) = if total > 0 {
        (
            successful as f64 / total as f64 * 100.0,
            total_attempts as f64 / total as f64,
        )
    } else {
        (0.0, 0.0)
    };

    let mut out = String::new();
    out.push_str("Duration-validated adaptation summary\n");
    let _ = writeln!(out, "  Segments:        {}", total);
    let _ = writeln!(out, "  Successful:      {} ({:.1}%)", successful, success_rate);
    let _ = writeln!(out, "  Best effort:     {}", failed);
    let _ = writeln!(out, "  Average attempts: {:.2}", average_attempts);
    let _ = writeln!(out, "  Synthesis calls: {}", synthesis_calls);

    if failed > 0 {
        out.push_str("\nSegments outside tolerance:\n");
        for result in results.iter().filter(|r| !r.is_success()) {
            let drift = result.measured_duration - result.target_duration;
            let percent = if result.target_duration > 0.0 {
                drift / result.target_duration * 100.0
            } else {
                0.0
            };
            let _ = writeln!(
                out,
                "  - Segment {}: best {:.2}s vs target {:.2}s ({:+.1}%) after {} attempts",
                result.segment_id,
                result.measured_duration,
                result.target_duration,
                percent,
                result.attempts
            );
        }
    }

    out
}
