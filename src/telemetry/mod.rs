//! Adaptation telemetry.
//!
//! Telemetry is a write-only side channel: nothing in the attempt loop reads
//! it back. Events never carry dialogue text or audio, only ids, counts and
//! durations.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{AdaptationEvent, BypassSource, SegmentOutcome};
pub use metrics::TelemetrySnapshot;
pub use recorder::{SharedRecorder, TelemetryRecorder};
