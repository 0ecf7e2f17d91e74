#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dubfit::config::GenerationSettings;
use dubfit::error::{GenerationError, ProbeError, SynthesisError};
use dubfit::segment::Segment;
use dubfit::services::{
    DurationProbe, GenerationClient, GenerationRequest, SpeechSynthesizer, TextGenerator,
    VoiceSelector,
};
use dubfit::stage::NextStageTrigger;

/// What a fake generator answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Capacity,
    RateLimited,
    Fatal(String),
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }

    fn into_result(self, model: &str) -> Result<String, GenerationError> {
        match self {
            Reply::Text(s) => Ok(s),
            Reply::Capacity => Err(GenerationError::CapacityExceeded {
                model: model.to_string(),
            }),
            Reply::RateLimited => Err(GenerationError::RateLimited),
            Reply::Fatal(msg) => Err(GenerationError::Fatal(msg)),
        }
    }
}

type Responder = Box<dyn Fn(&GenerationRequest) -> Reply + Send + Sync>;

/// Plays back scripted replies, then falls back to a responder.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Reply>>,
    responder: Responder,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Reply>) -> Self {
        Self::with_responder(script, |_| Reply::text("Texto de relleno"))
    }

    pub fn with_responder(
        script: Vec<Reply>,
        responder: impl Fn(&GenerationRequest) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn models(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.model).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = self.script.lock().unwrap().pop_front();
        let reply = scripted.unwrap_or_else(|| (self.responder)(request));
        reply.into_result(&request.model)
    }
}

/// Synthesizer whose "audio" is the UTF-8 text itself.
#[derive(Default)]
pub struct EchoSynthesizer {
    failures: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl EchoSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` entries fail the corresponding call.
    pub fn with_failures(failures: Vec<bool>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self::with_failures(vec![true; 64])
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &VoiceSelector) -> Result<Vec<u8>, SynthesisError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(SynthesisError::Backend(format!("synthesis call {} failed", call)));
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Probe that answers from a scripted queue, or by looking up the echoed
/// text, or with a default.
pub struct FakeProbe {
    script: Mutex<VecDeque<f64>>,
    by_text: HashMap<String, f64>,
    default: f64,
    calls: AtomicUsize,
}

impl FakeProbe {
    pub fn scripted(durations: Vec<f64>) -> Self {
        Self {
            script: Mutex::new(durations.into()),
            by_text: HashMap::new(),
            default: 99.0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn by_text(map: &[(&str, f64)], default: f64) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            by_text: map.iter().map(|(t, d)| (t.to_string(), *d)).collect(),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn constant(duration: f64) -> Self {
        Self::by_text(&[], duration)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurationProbe for FakeProbe {
    async fn duration(&self, audio: &[u8]) -> Result<f64, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return Ok(next);
        }
        let text = String::from_utf8_lossy(audio).to_string();
        Ok(self.by_text.get(&text).copied().unwrap_or(self.default))
    }
}

#[derive(Default)]
pub struct CountingTrigger {
    pub calls: AtomicUsize,
    pub projects: Mutex<Vec<String>>,
}

impl CountingTrigger {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NextStageTrigger for CountingTrigger {
    async fn trigger(&self, project_id: &str) -> dubfit::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.projects.lock().unwrap().push(project_id.to_string());
        Ok(())
    }
}

/// Client settings with pacing disabled and short backoff.
pub fn fast_settings() -> GenerationSettings {
    GenerationSettings {
        api_key: "test-key".to_string(),
        min_interval_ms: 0,
        backoff_base_ms: 10,
        ..GenerationSettings::default()
    }
}

pub fn client_for(generator: Arc<ScriptedGenerator>) -> Arc<GenerationClient> {
    Arc::new(GenerationClient::new(generator, fast_settings()).unwrap())
}

pub fn segment(id: u64, start_ms: u64, end_ms: u64, text: &str) -> Segment {
    Segment::new(id, start_ms, end_ms, text)
}

/// Mono 16-bit PCM WAV of silence.
pub fn wav_bytes(seconds: f64, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (seconds * sample_rate as f64).round() as u32;
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
