use serde::{Deserialize, Serialize};

use crate::config::AdaptationConfig;

/// Acceptance band around a target duration. Short targets get a wider band
/// because synthesis onset and offset dominate their relative error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TolerancePolicy {
    pub tolerance_percent: f64,
    pub short_threshold_secs: f64,
    pub short_tolerance_percent: f64,
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self::from_config(&AdaptationConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationCheck {
    pub within_tolerance: bool,
    /// measured - target, in seconds.
    pub difference: f64,
    pub percent_diff: f64,
    pub tolerance_percent: f64,
    pub feedback: String,
}

impl TolerancePolicy {
    pub fn from_config(config: &AdaptationConfig) -> Self {
        Self {
            tolerance_percent: config.tolerance_percent,
            short_threshold_secs: config.short_segment_threshold_seconds,
            short_tolerance_percent: config.short_segment_tolerance_percent,
        }
    }

    pub fn is_short(&self, target: f64) -> bool {
        target < self.short_threshold_secs
    }

    pub fn effective_percent(&self, target: f64) -> f64 {
        if self.is_short(target) {
            self.short_tolerance_percent
        } else {
            self.tolerance_percent
        }
    }

    /// `[target * (1 - p), target * (1 + p)]`
    pub fn band(&self, target: f64) -> (f64, f64) {
        let p = self.effective_percent(target) / 100.0;
        (target * (1.0 - p), target * (1.0 + p))
    }

    pub fn check(&self, measured: f64, target: f64) -> DurationCheck {
        let tolerance_percent = self.effective_percent(target);
        let (low, high) = self.band(target);
        let difference = measured - target;
        let percent_diff = if target > 0.0 {
            difference / target * 100.0
        } else {
            0.0
        };
        let within_tolerance = measured >= low && measured <= high;

        let verdict = if within_tolerance {
            "within tolerance"
        } else if measured < low {
            "too short"
        } else {
            "too long"
        };
        let feedback = format!(
            "{}: measured {:.2}s vs target {:.2}s ({:+.1}% diff, allowed ±{:.0}%)",
            verdict, measured, target, percent_diff, tolerance_percent
        );

        DurationCheck {
            within_tolerance,
            difference,
            percent_diff,
            tolerance_percent,
            feedback,
        }
    }
}
