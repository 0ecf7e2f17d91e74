use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dubfit::adaptation::AdaptationService;
use dubfit::corpus::FewShotCorpus;
use dubfit::orchestrator::DurationValidatedOrchestrator;
use dubfit::segment::JsonFileSegmentStore;
use dubfit::services::{
    AudioStore, ChatCompletionsBackend, DurationProbe, FfprobeDurationProbe, FsAudioStore,
    GenerationClient, HttpSpeechBackend, VoiceSelector, WavDurationProbe,
};
use dubfit::stage::{AdaptationStage, LogOnlyTrigger, PipelineGate, StageEngine};
use dubfit::telemetry::SharedRecorder;
use dubfit::Settings;

/// Timing-aware dialogue adaptation for dubbing.
#[derive(Parser)]
#[command(name = "dubfit")]
struct Cli {
    /// Root directory of the JSON segment store.
    #[arg(long)]
    store: PathBuf,

    /// Project whose pending segments are adapted.
    #[arg(long)]
    project: String,

    /// Settings file (TOML, JSON or YAML). DUBFIT__* variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip synthesis probing and validate with the heuristic only.
    #[arg(long)]
    heuristic_only: bool,

    /// Ask the semantic judge too in heuristic-only mode.
    #[arg(long, requires = "heuristic_only")]
    judge: bool,

    /// Voice used for synthesis probing.
    #[arg(long)]
    voice: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    let corpus = match &settings.pipeline.corpus_path {
        Some(path) => FewShotCorpus::from_path(path),
        None => FewShotCorpus::bundled(),
    }
    .context("loading few-shot corpus")?;

    let telemetry = SharedRecorder::new();
    let backend = Arc::new(ChatCompletionsBackend::new(&settings.generation)?);
    let client = Arc::new(
        GenerationClient::new(backend, settings.generation.clone())?.with_telemetry(telemetry.clone()),
    );

    client
        .test_connection()
        .await
        .context("generation backend unreachable")?;

    let engine = if cli.heuristic_only {
        let mut service = AdaptationService::new(settings.adaptation.clone(), &corpus, client)?;
        if cli.judge {
            service = service.with_judge();
        }
        StageEngine::Lightweight(Arc::new(service))
    } else {
        let synthesizer = Arc::new(HttpSpeechBackend::new(&settings.synthesis)?);
        let probe: Arc<dyn DurationProbe> = if settings.pipeline.use_ffprobe {
            Arc::new(FfprobeDurationProbe::default())
        } else {
            Arc::new(WavDurationProbe)
        };
        let audio_store: Arc<dyn AudioStore> =
            Arc::new(FsAudioStore::new(&settings.pipeline.audio_dir));
        let orchestrator = DurationValidatedOrchestrator::new(
            settings.adaptation.clone(),
            &corpus,
            client,
            synthesizer,
            probe,
            audio_store,
        )?
        .with_telemetry(telemetry.clone());
        StageEngine::Validated(Arc::new(orchestrator))
    };

    let store = Arc::new(JsonFileSegmentStore::new(&cli.store));
    let stage = AdaptationStage::new(
        store,
        engine,
        Arc::new(LogOnlyTrigger),
        settings.adaptation.concurrency,
    )
    .with_gate(PipelineGate::new(settings.pipeline.success_threshold_percent));

    let cancel = stage.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing segments in flight");
            cancel.cancel();
        }
    });

    let voice = VoiceSelector::new(
        cli.voice
            .unwrap_or_else(|| settings.synthesis.default_voice.clone()),
    );
    let outcome = stage.run(&cli.project, &voice).await?;

    println!("{}", outcome.report);
    let snapshot = telemetry.snapshot();
    tracing::info!(
        "Run {}: {} synthesis calls, mean drift {:.2}s, {} model fallbacks, {} backoffs",
        outcome.run_id,
        snapshot.attempt_stats.synthesis_calls,
        snapshot.attempt_stats.mean_abs_drift_secs,
        snapshot.backend_stats.model_fallbacks,
        snapshot.backend_stats.rate_limit_backoffs
    );
    if !outcome.triggered_next_stage {
        tracing::warn!("Next stage not triggered, review the failed segments");
    }

    Ok(())
}
