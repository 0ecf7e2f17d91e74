use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::bypass::{short_phrase_prompt, Phrasebook, ShortPhraseStrategy};
use super::machine::{AttemptEvent, AttemptMachine, AttemptPhase};
use super::tolerance::TolerancePolicy;
use crate::config::AdaptationConfig;
use crate::corpus::FewShotCorpus;
use crate::error::{AdaptationError, Result};
use crate::prompt::{character_guidance, retry_feedback, PromptBuilder};
use crate::segment::Segment;
use crate::services::{AudioStore, DurationProbe, GenerationClient, SpeechSynthesizer, VoiceSelector};
use crate::telemetry::{AdaptationEvent, BypassSource, SegmentOutcome, SharedRecorder};

const EMPTY_RESPONSE_FEEDBACK: &str =
    "empty response: the previous attempt produced no text. Reply with the adapted line only.";

/// One measured candidate. Ephemeral: returned to the caller, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAttempt {
    pub attempt: u32,
    pub text: String,
    pub measured_duration: f64,
    pub target_duration: f64,
    pub tolerance_percent: f64,
    pub within_tolerance: bool,
    pub feedback: String,
}

impl ValidationAttempt {
    pub fn drift(&self) -> f64 {
        (self.measured_duration - self.target_duration).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatedStatus {
    Success,
    /// Attempts exhausted; the result is the best-effort candidate.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedResult {
    pub segment_id: u64,
    pub adapted_text: String,
    pub audio_ref: Option<String>,
    pub measured_duration: f64,
    pub target_duration: f64,
    pub attempts: u32,
    pub status: ValidatedStatus,
    pub validation_history: Vec<ValidationAttempt>,
}

impl ValidatedResult {
    pub fn is_success(&self) -> bool {
        self.status == ValidatedStatus::Success
    }

    /// Feedback line written back to the segment store.
    pub fn store_feedback(&self) -> String {
        format!(
            "Duration: {:.2}s (target: {:.2}s)",
            self.measured_duration, self.target_duration
        )
    }
}

struct BestCandidate {
    index: usize,
    drift: f64,
    audio: Vec<u8>,
}

/// Mutable state of one segment's loop. Lives outside the loop future so a
/// deadline can still read what was measured.
struct AttemptLog {
    phase: AttemptPhase,
    history: Vec<ValidationAttempt>,
    best: Option<BestCandidate>,
    feedback: Option<String>,
    attempts_started: u32,
}

impl AttemptLog {
    fn new() -> Self {
        Self {
            phase: AttemptPhase::Generate,
            history: Vec::new(),
            best: None,
            feedback: None,
            attempts_started: 0,
        }
    }

    fn step(&mut self, event: AttemptEvent) -> Result<AttemptPhase> {
        let next = AttemptMachine::transition(self.phase, event).ok_or_else(|| {
            AdaptationError::InvalidTransition(format!("{:?} on {:?}", event, self.phase))
        })?;
        self.phase = next;
        Ok(next)
    }

    fn offer_best(&mut self, audio: Vec<u8>) {
        let Some(last) = self.history.last() else {
            return;
        };
        let drift = last.drift();
        // Strictly smaller keeps the earliest attempt on ties.
        if self.best.as_ref().map_or(true, |b| drift < b.drift) {
            self.best = Some(BestCandidate {
                index: self.history.len() - 1,
                drift,
                audio,
            });
        }
    }
}

/// Closed-loop generate, synthesize, measure, decide.
pub struct DurationValidatedOrchestrator {
    config: AdaptationConfig,
    prompts: PromptBuilder,
    client: Arc<GenerationClient>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    probe: Arc<dyn DurationProbe>,
    audio_store: Arc<dyn AudioStore>,
    phrasebook: Arc<dyn ShortPhraseStrategy>,
    tolerance: TolerancePolicy,
    telemetry: Option<SharedRecorder>,
}

impl DurationValidatedOrchestrator {
    pub fn new(
        config: AdaptationConfig,
        corpus: &FewShotCorpus,
        client: Arc<GenerationClient>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        probe: Arc<dyn DurationProbe>,
        audio_store: Arc<dyn AudioStore>,
    ) -> Result<Self> {
        config.validate()?;
        let prompts = PromptBuilder::new(&config, corpus)?;
        let tolerance = TolerancePolicy::from_config(&config);

        Ok(Self {
            config,
            prompts,
            client,
            synthesizer,
            probe,
            audio_store,
            phrasebook: Arc::new(Phrasebook::builtin()),
            tolerance,
            telemetry: None,
        })
    }

    pub fn with_phrasebook(mut self, phrasebook: Arc<dyn ShortPhraseStrategy>) -> Self {
        self.phrasebook = phrasebook;
        self
    }

    pub fn with_telemetry(mut self, recorder: SharedRecorder) -> Self {
        self.telemetry = Some(recorder);
        self
    }

    pub fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    pub fn tolerance(&self) -> &TolerancePolicy {
        &self.tolerance
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Adapt one segment until a candidate fits, attempts run out, or the
    /// segment deadline passes.
    pub async fn adapt_segment(
        &self,
        segment: &Segment,
        voice: &VoiceSelector,
    ) -> Result<ValidatedResult> {
        let target = segment.duration();
        if target <= 0.0 {
            return Err(AdaptationError::InvalidSegment {
                segment_id: segment.id,
                reason: format!("end_ms {} is not after start_ms {}", segment.end_ms, segment.start_ms),
            });
        }

        if target < self.config.min_duration {
            return self.bypass(segment, target).await;
        }

        if target > self.config.max_duration {
            warn!(
                "Segment {} is {:.2}s, above max_duration {:.2}s",
                segment.id, target, self.config.max_duration
            );
        }

        let tolerance = self.tolerance.effective_percent(target);
        info!(
            "Starting duration-validated adaptation for segment {} (target {:.2}s, ±{}%)",
            segment.id, target, tolerance
        );

        let mut log = AttemptLog::new();
        let deadline = Duration::from_secs(self.config.segment_deadline_secs);
        let outcome =
            tokio::time::timeout(deadline, self.run_attempts(segment, voice, target, &mut log))
                .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                let has_candidates = log.best.is_some();
                if !log.phase.is_terminal() {
                    log.step(AttemptEvent::DeadlineReached { has_candidates })?;
                }
                warn!(
                    "Segment {} hit its {}s deadline after {} attempts",
                    segment.id, self.config.segment_deadline_secs, log.attempts_started
                );
                if has_candidates {
                    let attempts = log.attempts_started;
                    self.best_effort(segment, target, log, attempts).await
                } else {
                    Err(AdaptationError::DeadlineExceeded {
                        segment_id: segment.id,
                        seconds: self.config.segment_deadline_secs,
                    })
                }
            }
        };

        let outcome = match &result {
            Ok(r) if r.is_success() => SegmentOutcome::Accepted,
            Ok(_) => SegmentOutcome::BestEffort,
            Err(_) => SegmentOutcome::Errored,
        };
        let attempts = result.as_ref().map(|r| r.attempts).unwrap_or(0);
        self.record(AdaptationEvent::SegmentCompleted {
            segment_id: segment.id,
            attempts,
            outcome,
        });

        result
    }

    async fn run_attempts(
        &self,
        segment: &Segment,
        voice: &VoiceSelector,
        target: f64,
        log: &mut AttemptLog,
    ) -> Result<ValidatedResult> {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            let attempts_left = max_attempts - attempt;
            log.attempts_started = attempt;
            info!("Segment {}: attempt {}/{}", segment.id, attempt, max_attempts);

            // GENERATE
            let prompt = if attempt == 1 {
                let guidance =
                    character_guidance(&segment.text, target, self.prompts.target_language());
                self.prompts.build_prompt(segment, 0, Some(&guidance))
            } else {
                self.prompts
                    .build_prompt(segment, attempt - 1, log.feedback.as_deref())
            };

            let text = match self.client.translate(&prompt).await {
                Ok(raw) if !raw.trim().is_empty() => {
                    log.step(AttemptEvent::TextGenerated)?;
                    self.prompts.apply_glossary(&raw)
                }
                Ok(_) => {
                    warn!("Segment {}: empty generation on attempt {}", segment.id, attempt);
                    if log.step(AttemptEvent::EmptyOutput { attempts_left })? == AttemptPhase::Fault {
                        return Err(AdaptationError::EmptyResponse { attempt });
                    }
                    log.feedback = Some(EMPTY_RESPONSE_FEEDBACK.to_string());
                    log.step(AttemptEvent::Restart)?;
                    continue;
                }
                Err(e) => {
                    self.step_failed(log, segment.id, attempt, attempts_left, e.into())?;
                    continue;
                }
            };
            debug!("Segment {}: candidate \"{}\"", segment.id, text);

            // SYNTHESIZE
            let audio = match self.synthesizer.synthesize(&text, voice).await {
                Ok(audio) if !audio.is_empty() => {
                    log.step(AttemptEvent::AudioSynthesized)?;
                    audio
                }
                Ok(_) => {
                    let e = crate::error::SynthesisError::EmptyAudio;
                    self.step_failed(log, segment.id, attempt, attempts_left, e.into())?;
                    continue;
                }
                Err(e) => {
                    self.step_failed(log, segment.id, attempt, attempts_left, e.into())?;
                    continue;
                }
            };

            // MEASURE
            let measured = match self.probe.duration(&audio).await {
                Ok(measured) => {
                    log.step(AttemptEvent::DurationMeasured)?;
                    measured
                }
                Err(e) => {
                    self.step_failed(log, segment.id, attempt, attempts_left, e.into())?;
                    continue;
                }
            };

            // DECIDE
            let check = self.tolerance.check(measured, target);
            info!("Segment {}: {}", segment.id, check.feedback);
            self.record(AdaptationEvent::AttemptMeasured {
                segment_id: segment.id,
                attempt,
                measured_secs: measured,
                target_secs: target,
                within_tolerance: check.within_tolerance,
            });
            log.history.push(ValidationAttempt {
                attempt,
                text: text.clone(),
                measured_duration: measured,
                target_duration: target,
                tolerance_percent: check.tolerance_percent,
                within_tolerance: check.within_tolerance,
                feedback: check.feedback.clone(),
            });

            if check.within_tolerance {
                log.step(AttemptEvent::WithinTolerance)?;
                let audio_ref = self.audio_store.persist(segment.id, attempt, &audio).await?;
                return Ok(ValidatedResult {
                    segment_id: segment.id,
                    adapted_text: text,
                    audio_ref: Some(audio_ref),
                    measured_duration: measured,
                    target_duration: target,
                    attempts: attempt,
                    status: ValidatedStatus::Success,
                    validation_history: std::mem::take(&mut log.history),
                });
            }

            log.offer_best(audio);
            if log.step(AttemptEvent::OutOfTolerance { attempts_left })? == AttemptPhase::Exhausted {
                error!(
                    "Segment {}: max attempts ({}) reached without a fit",
                    segment.id, max_attempts
                );
                let history = std::mem::take(&mut log.history);
                let best = log.best.take();
                return self
                    .finish_best_effort(segment, target, history, best, max_attempts)
                    .await;
            }

            log.feedback = Some(retry_feedback(&text, measured, target, attempt));
            log.step(AttemptEvent::Restart)?;
        }

        Err(AdaptationError::InvalidTransition(format!(
            "attempt loop ended in {:?}",
            log.phase
        )))
    }

    /// Non-final failures become retry feedback; the final one propagates.
    fn step_failed(
        &self,
        log: &mut AttemptLog,
        segment_id: u64,
        attempt: u32,
        attempts_left: u32,
        error: AdaptationError,
    ) -> Result<()> {
        warn!("Segment {}: attempt {} failed: {}", segment_id, attempt, error);
        if log.step(AttemptEvent::StepFailed { attempts_left })? == AttemptPhase::Fault {
            return Err(error);
        }
        log.feedback = Some(format!("error occurred: {}. Please try again.", error));
        log.step(AttemptEvent::Restart)?;
        Ok(())
    }

    async fn best_effort(
        &self,
        segment: &Segment,
        target: f64,
        mut log: AttemptLog,
        attempts: u32,
    ) -> Result<ValidatedResult> {
        let history = std::mem::take(&mut log.history);
        let best = log.best.take();
        self.finish_best_effort(segment, target, history, best, attempts)
            .await
    }

    async fn finish_best_effort(
        &self,
        segment: &Segment,
        target: f64,
        history: Vec<ValidationAttempt>,
        best: Option<BestCandidate>,
        attempts: u32,
    ) -> Result<ValidatedResult> {
        let Some(best) = best else {
            return Err(AdaptationError::InvalidTransition(
                "no measured candidate to fall back to".to_string(),
            ));
        };
        let chosen = history.get(best.index).cloned().ok_or_else(|| {
            AdaptationError::InvalidTransition("best candidate missing from history".to_string())
        })?;

        info!(
            "Segment {}: using best attempt #{} ({:.2}s vs {:.2}s)",
            segment.id, chosen.attempt, chosen.measured_duration, target
        );
        let audio_ref = self
            .audio_store
            .persist(segment.id, chosen.attempt, &best.audio)
            .await?;

        Ok(ValidatedResult {
            segment_id: segment.id,
            adapted_text: chosen.text,
            audio_ref: Some(audio_ref),
            measured_duration: chosen.measured_duration,
            target_duration: target,
            attempts,
            status: ValidatedStatus::Failed,
            validation_history: history,
        })
    }

    /// Sub-floor segments: phrasebook, then one constrained generation call,
    /// then the source text. Never synthesized.
    async fn bypass(&self, segment: &Segment, target: f64) -> Result<ValidatedResult> {
        let target_language = self.prompts.target_language();
        warn!(
            "Segment {} is extremely short ({:.3}s), skipping synthesis validation",
            segment.id, target
        );

        let (text, source) = match self.phrasebook.lookup(&segment.text, target_language) {
            Some(phrase) => (phrase, BypassSource::Phrasebook),
            None => {
                let prompt = short_phrase_prompt(&segment.text, target_language);
                match self.client.translate(&prompt).await {
                    Ok(raw) if !raw.trim().is_empty() => {
                        (self.prompts.apply_glossary(&raw), BypassSource::Generation)
                    }
                    Ok(_) => (segment.text.clone(), BypassSource::SourceText),
                    Err(e) => {
                        warn!(
                            "Segment {}: short translation failed, keeping source text: {}",
                            segment.id, e
                        );
                        (segment.text.clone(), BypassSource::SourceText)
                    }
                }
            }
        };

        self.record(AdaptationEvent::BypassUsed {
            segment_id: segment.id,
            source,
        });
        self.record(AdaptationEvent::SegmentCompleted {
            segment_id: segment.id,
            attempts: 1,
            outcome: SegmentOutcome::Accepted,
        });

        Ok(ValidatedResult {
            segment_id: segment.id,
            adapted_text: text,
            audio_ref: None,
            measured_duration: target,
            target_duration: target,
            attempts: 1,
            status: ValidatedStatus::Success,
            validation_history: Vec::new(),
        })
    }

    fn record(&self, event: AdaptationEvent) {
        if let Some(recorder) = &self.telemetry {
            recorder.record(event);
        }
    }
}
