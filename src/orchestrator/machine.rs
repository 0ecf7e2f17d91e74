use serde::{Deserialize, Serialize};

/// Phases of one segment's attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttemptPhase {
    /// Building the prompt and waiting on the generation capability.
    #[default]
    Generate,
    /// Candidate text is being spoken by the synthesizer.
    Synthesize,
    /// Audio exists, waiting on the duration probe.
    Measure,
    /// Measured duration is compared against the tolerance band.
    Decide,
    /// Candidate fits. Terminal.
    Accept,
    /// Attempt failed, feedback is ready for the next one.
    Retry,
    /// No attempt fit; best-effort candidate is returned. Terminal.
    Exhausted,
    /// Final attempt errored before producing a measurement. Terminal.
    Fault,
}

impl AttemptPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptPhase::Accept | AttemptPhase::Exhausted | AttemptPhase::Fault
        )
    }
}

/// Things that happen during an attempt. The machine validates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent {
    TextGenerated,
    EmptyOutput { attempts_left: u32 },
    AudioSynthesized,
    DurationMeasured,
    WithinTolerance,
    OutOfTolerance { attempts_left: u32 },
    /// Generation, synthesis or probing raised an error.
    StepFailed { attempts_left: u32 },
    Restart,
    DeadlineReached { has_candidates: bool },
}

pub struct AttemptMachine;

impl AttemptMachine {
    /// Pure function: (current phase, event) -> next phase.
    /// Returns None if the event is not valid in the current phase.
    pub fn transition(current: AttemptPhase, event: AttemptEvent) -> Option<AttemptPhase> {
        use AttemptEvent::*;
        use AttemptPhase::*;

        match (current, event) {
            // Terminal phases accept nothing.
            (Accept | Exhausted | Fault, _) => None,

            (_, DeadlineReached { has_candidates: true }) => Some(Exhausted),
            (_, DeadlineReached { has_candidates: false }) => Some(Fault),

            (Generate, TextGenerated) => Some(Synthesize),
            (Generate, EmptyOutput { attempts_left }) => Some(retry_or(attempts_left, Fault)),

            (Synthesize, AudioSynthesized) => Some(Measure),
            (Measure, DurationMeasured) => Some(Decide),

            (Generate | Synthesize | Measure, StepFailed { attempts_left }) => {
                Some(retry_or(attempts_left, Fault))
            }

            (Decide, WithinTolerance) => Some(Accept),
            (Decide, OutOfTolerance { attempts_left }) => Some(retry_or(attempts_left, Exhausted)),

            (Retry, Restart) => Some(Generate),

            _ => None,
        }
    }
}

fn retry_or(attempts_left: u32, otherwise: AttemptPhase) -> AttemptPhase {
    if attempts_left > 0 {
        AttemptPhase::Retry
    } else {
        otherwise
    }
}
