//! Adaptation stage: pending segments in, partial updates out, then the
//! pipeline gate decides whether the next stage runs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adaptation::{
    summary_report, AdaptationResult, AdaptationService, AdaptationStats, PoolOutcome, WorkerPool,
};
use crate::error::{AdaptationError, Result, StoreError};
use crate::orchestrator::{validation_report, DurationValidatedOrchestrator, ValidatedResult};
use crate::segment::{ContextMap, Segment, SegmentPatch, SegmentStatus, SegmentStore};
use crate::services::VoiceSelector;

/// Hook that enqueues whatever runs after adaptation.
#[async_trait]
pub trait NextStageTrigger: Send + Sync {
    async fn trigger(&self, project_id: &str) -> Result<()>;
}

/// Trigger that only logs. For standalone runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyTrigger;

#[async_trait]
impl NextStageTrigger for LogOnlyTrigger {
    async fn trigger(&self, project_id: &str) -> Result<()> {
        info!("Next stage ready for project {}", project_id);
        Ok(())
    }
}

/// Reads pending segments and writes only the fields adaptation owns.
#[derive(Clone)]
pub struct SegmentStoreAdapter {
    store: Arc<dyn SegmentStore>,
}

impl SegmentStoreAdapter {
    pub fn new(store: Arc<dyn SegmentStore>) -> Self {
        Self { store }
    }

    pub async fn context_map(&self, project_id: &str) -> std::result::Result<ContextMap, StoreError> {
        self.store.get(project_id).await
    }

    /// Segments with nothing committed yet, or whose last adaptation failed.
    pub async fn pending_segments(
        &self,
        project_id: &str,
    ) -> std::result::Result<Vec<Segment>, StoreError> {
        let map = self.store.get(project_id).await?;
        Ok(map
            .segments
            .into_iter()
            .filter(Segment::needs_adaptation)
            .collect())
    }

    pub async fn write_result(
        &self,
        project_id: &str,
        result: &AdaptationResult,
        audio_ref: Option<&str>,
    ) -> std::result::Result<(), StoreError> {
        let mut patch = SegmentPatch::adapted(
            result.adapted_text.clone(),
            result.status,
            result.attempts,
            result.validation_feedback.clone(),
        );
        if let Some(audio_ref) = audio_ref {
            patch = patch.with_audio_ref(audio_ref);
        }
        self.store
            .update_fields(project_id, result.segment_id, &patch)
            .await
    }
}

/// Triggers the next stage only when enough segments succeeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineGate {
    /// Percent, e.g. 66.67.
    pub threshold_percent: f64,
}

impl Default for PipelineGate {
    fn default() -> Self {
        Self {
            threshold_percent: 200.0 / 3.0,
        }
    }
}

impl PipelineGate {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }

    pub fn should_trigger(&self, success_rate: f64) -> bool {
        success_rate + 1e-9 >= self.threshold_percent
    }
}

/// Which engine adapts the segments.
#[derive(Clone)]
pub enum StageEngine {
    /// Synthesis-probed loop.
    Validated(Arc<DurationValidatedOrchestrator>),
    /// Heuristic-only service.
    Lightweight(Arc<AdaptationService>),
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub run_id: Uuid,
    pub project_id: String,
    pub results: Vec<AdaptationResult>,
    pub stats: AdaptationStats,
    pub report: String,
    pub triggered_next_stage: bool,
}

pub struct AdaptationStage {
    adapter: SegmentStoreAdapter,
    engine: StageEngine,
    gate: PipelineGate,
    trigger: Arc<dyn NextStageTrigger>,
    pool: WorkerPool,
}

impl AdaptationStage {
    pub fn new(
        store: Arc<dyn SegmentStore>,
        engine: StageEngine,
        trigger: Arc<dyn NextStageTrigger>,
        concurrency: usize,
    ) -> Self {
        Self {
            adapter: SegmentStoreAdapter::new(store),
            engine,
            gate: PipelineGate::default(),
            trigger,
            pool: WorkerPool::new(concurrency),
        }
    }

    pub fn with_gate(mut self, gate: PipelineGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.pool.cancel_token()
    }

    pub async fn run(&self, project_id: &str, voice: &VoiceSelector) -> Result<StageReport> {
        let run_id = Uuid::new_v4();
        let pending = self.adapter.pending_segments(project_id).await?;
        info!(
            "Adaptation run {} for project {}: {} pending segments",
            run_id,
            project_id,
            pending.len()
        );

        let (results, mut report) = if pending.is_empty() {
            (Vec::new(), String::from("No segments pending adaptation\n"))
        } else {
            match &self.engine {
                StageEngine::Validated(orchestrator) => {
                    self.run_validated(project_id, orchestrator, pending, voice)
                        .await?
                }
                StageEngine::Lightweight(service) => {
                    self.run_lightweight(project_id, service, pending).await?
                }
            }
        };

        let mut stats = AdaptationStats::from_results(&results);
        if stats.total == 0 {
            stats.success_rate = 100.0;
        }
        if !report.is_empty() {
            report.push('\n');
        }
        report.push_str(&summary_report(&results));

        let triggered = if self.gate.should_trigger(stats.success_rate) {
            info!(
                "Success rate {:.1}% meets threshold {:.1}%, triggering next stage",
                stats.success_rate, self.gate.threshold_percent
            );
            self.trigger.trigger(project_id).await?;
            true
        } else {
            warn!(
                "Success rate {:.1}% below threshold {:.1}%, halting for manual review",
                stats.success_rate, self.gate.threshold_percent
            );
            false
        };

        Ok(StageReport {
            run_id,
            project_id: project_id.to_string(),
            results,
            stats,
            report,
            triggered_next_stage: triggered,
        })
    }

    async fn run_validated(
        &self,
        project_id: &str,
        orchestrator: &Arc<DurationValidatedOrchestrator>,
        pending: Vec<Segment>,
        voice: &VoiceSelector,
    ) -> Result<(Vec<AdaptationResult>, String)> {
        let worker_orchestrator = Arc::clone(orchestrator);
        let voice = Arc::new(voice.clone());
        let outcomes = self
            .pool
            .run(pending.clone(), move |segment: Segment| {
                let orchestrator = Arc::clone(&worker_orchestrator);
                let voice = Arc::clone(&voice);
                async move { orchestrator.adapt_segment(&segment, &voice).await }
            })
            .await;

        let mut results = Vec::with_capacity(pending.len());
        let mut validated: Vec<ValidatedResult> = Vec::new();

        for (segment, outcome) in pending.iter().zip(outcomes) {
            let (result, audio_ref) = match outcome {
                PoolOutcome::Completed(Ok(v)) => {
                    let status = if v.is_success() {
                        SegmentStatus::Success
                    } else {
                        SegmentStatus::FailedAdaptation
                    };
                    let audio_ref = if v.is_success() { v.audio_ref.clone() } else { None };
                    let result = AdaptationResult {
                        segment_id: segment.id,
                        adapted_text: v.adapted_text.clone(),
                        status,
                        attempts: v.attempts,
                        validation_feedback: Some(v.store_feedback()),
                    };
                    validated.push(v);
                    (result, audio_ref)
                }
                PoolOutcome::Completed(Err(e)) => (failure_result(segment, &e), None),
                other => (
                    AdaptationResult::fallback(
                        segment.id,
                        &segment.text,
                        SegmentStatus::FailedAdaptation,
                        other.failure_reason().unwrap_or_default(),
                    ),
                    None,
                ),
            };

            self.adapter
                .write_result(project_id, &result, audio_ref.as_deref())
                .await?;
            results.push(result);
        }

        Ok((results, validation_report(&validated)))
    }

    async fn run_lightweight(
        &self,
        project_id: &str,
        service: &Arc<AdaptationService>,
        pending: Vec<Segment>,
    ) -> Result<(Vec<AdaptationResult>, String)> {
        let results = service.adapt_segments_parallel(pending, &self.pool).await;
        for result in &results {
            self.adapter.write_result(project_id, result, None).await?;
        }
        Ok((results, String::new()))
    }
}

/// Orchestration errors still leave a record: the source text and a
/// failed status matching where things broke.
fn failure_result(segment: &Segment, error: &AdaptationError) -> AdaptationResult {
    let status = if error.is_synthesis_failure() {
        SegmentStatus::FailedTts
    } else {
        SegmentStatus::FailedAdaptation
    };
    error!("Segment {} failed: {}", segment.id, error);
    AdaptationResult::fallback(segment.id, &segment.text, status, error.to_string())
}
