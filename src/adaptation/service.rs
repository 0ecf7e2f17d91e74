use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::pool::{PoolOutcome, WorkerPool};
use super::stats::AdaptationResult;
use crate::config::AdaptationConfig;
use crate::corpus::FewShotCorpus;
use crate::error::Result;
use crate::prompt::PromptBuilder;
use crate::segment::{Segment, SegmentStatus};
use crate::services::GenerationClient;
use crate::validation::{TranslationValidator, ValidationOptions};

const EMPTY_RESPONSE_FEEDBACK: &str = "empty response from the generation backend";

/// Adaptation without synthesis probing: generate, apply the glossary and
/// validate with the heuristic (and optionally the judge).
pub struct AdaptationService {
    config: AdaptationConfig,
    prompts: PromptBuilder,
    client: Arc<GenerationClient>,
    validator: TranslationValidator,
    options: ValidationOptions,
}

impl AdaptationService {
    /// Heuristic-only service.
    pub fn new(
        config: AdaptationConfig,
        corpus: &FewShotCorpus,
        client: Arc<GenerationClient>,
    ) -> Result<Self> {
        config.validate()?;
        let prompts = PromptBuilder::new(&config, corpus)?;
        Ok(Self {
            config,
            prompts,
            client,
            validator: TranslationValidator::heuristic(),
            options: ValidationOptions::heuristic_only(),
        })
    }

    /// Add the semantic judge as a second validation stage.
    pub fn with_judge(mut self) -> Self {
        self.validator = TranslationValidator::new(Arc::clone(&self.client));
        self.options = ValidationOptions::default();
        self
    }

    pub fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Up to `max_retries + 1` attempts. Quota errors that survive the
    /// client's own retries propagate; everything else becomes feedback.
    pub async fn adapt_segment(&self, segment: &Segment) -> Result<AdaptationResult> {
        let duration = segment.duration();
        let total_attempts = self.config.max_retries + 1;
        let mut feedback: Option<String> = None;
        let mut last_candidate: Option<String> = None;

        for attempt in 1..=total_attempts {
            debug!(
                "Attempt {}/{} for segment {}",
                attempt, total_attempts, segment.id
            );
            let prompt = self
                .prompts
                .build_prompt(segment, attempt - 1, feedback.as_deref());

            let candidate = match self.client.translate(&prompt).await {
                Ok(raw) if !raw.trim().is_empty() => self.prompts.apply_glossary(&raw),
                Ok(_) => {
                    warn!("Segment {}: empty generation on attempt {}", segment.id, attempt);
                    if attempt == total_attempts {
                        let result = errored_last_attempt(segment, attempt, EMPTY_RESPONSE_FEEDBACK);
                        return Ok(result);
                    }
                    feedback = Some(EMPTY_RESPONSE_FEEDBACK.to_string());
                    continue;
                }
                Err(e) if e.is_quota() => {
                    error!("Segment {}: generation quota exhausted: {}", segment.id, e);
                    return Err(e.into());
                }
                Err(e) => {
                    warn!("Segment {}: attempt {} failed: {}", segment.id, attempt, e);
                    if attempt == total_attempts {
                        return Ok(errored_last_attempt(segment, attempt, e));
                    }
                    feedback = Some(format!("error occurred: {}", e));
                    continue;
                }
            };

            let outcome = match self
                .validator
                .validate(
                    &segment.text,
                    &candidate,
                    duration,
                    self.prompts.target_language(),
                    self.options,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Segment {}: validation failed: {}", segment.id, e);
                    if attempt == total_attempts {
                        return Ok(errored_last_attempt(segment, attempt, e));
                    }
                    feedback = Some(format!("validation error: {}", e));
                    last_candidate = Some(candidate);
                    continue;
                }
            };

            if outcome.is_valid {
                info!(
                    "Segment {} adapted on attempt {}",
                    segment.id, attempt
                );
                return Ok(AdaptationResult {
                    segment_id: segment.id,
                    adapted_text: candidate,
                    status: SegmentStatus::Success,
                    attempts: attempt,
                    validation_feedback: Some(outcome.feedback),
                });
            }

            debug!("Segment {}: {}", segment.id, outcome.feedback);
            feedback = Some(outcome.feedback);
            last_candidate = Some(candidate);
        }

        warn!(
            "Segment {} failed adaptation after {} attempts",
            segment.id, total_attempts
        );
        Ok(AdaptationResult {
            segment_id: segment.id,
            adapted_text: last_candidate.unwrap_or_else(|| segment.text.clone()),
            status: SegmentStatus::FailedAdaptation,
            attempts: total_attempts,
            validation_feedback: feedback,
        })
    }

    /// One segment at a time, in order.
    pub async fn adapt_segments(&self, segments: &[Segment]) -> Vec<AdaptationResult> {
        let mut results = Vec::with_capacity(segments.len());
        for segment in segments {
            results.push(settle(segment, self.adapt_segment(segment).await));
        }
        results
    }

    /// Bounded-concurrency variant. Results keep input order.
    pub async fn adapt_segments_parallel(
        self: &Arc<Self>,
        segments: Vec<Segment>,
        pool: &WorkerPool,
    ) -> Vec<AdaptationResult> {
        let fallbacks: Vec<(u64, String)> =
            segments.iter().map(|s| (s.id, s.text.clone())).collect();
        let service = Arc::clone(self);

        let results = pool
            .run(segments, move |segment: Segment| {
                let service = Arc::clone(&service);
                async move {
                    let outcome = service.adapt_segment(&segment).await;
                    settle(&segment, outcome)
                }
            })
            .await;

        results
            .into_iter()
            .zip(fallbacks)
            .map(|(outcome, (id, text))| match outcome {
                PoolOutcome::Completed(result) => result,
                other => AdaptationResult::fallback(
                    id,
                    &text,
                    SegmentStatus::FailedAdaptation,
                    other.failure_reason().unwrap_or_default(),
                ),
            })
            .collect()
    }
}

/// An error on the final attempt discards earlier rejected candidates and
/// keeps the source text.
fn errored_last_attempt(
    segment: &Segment,
    attempt: u32,
    error: impl std::fmt::Display,
) -> AdaptationResult {
    error!(
        "Segment {} failed adaptation, attempt {} errored: {}",
        segment.id, attempt, error
    );
    AdaptationResult {
        segment_id: segment.id,
        adapted_text: segment.text.clone(),
        status: SegmentStatus::FailedAdaptation,
        attempts: attempt,
        validation_feedback: Some(format!("Error: {}", error)),
    }
}

/// A segment is never dropped: errors become `failed_adaptation` results.
fn settle(segment: &Segment, outcome: Result<AdaptationResult>) -> AdaptationResult {
    outcome.unwrap_or_else(|e| {
        error!("Segment {} errored: {}", segment.id, e);
        AdaptationResult::fallback(
            segment.id,
            &segment.text,
            SegmentStatus::FailedAdaptation,
            e.to_string(),
        )
    })
}
