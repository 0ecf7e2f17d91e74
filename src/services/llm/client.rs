use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backend::{GenerationRequest, TextGenerator};
use crate::config::GenerationSettings;
use crate::error::{ConfigError, GenerationError};
use crate::telemetry::{AdaptationEvent, SharedRecorder};

#[derive(Debug, Default)]
struct ClientState {
    /// Earliest instant the next request may start.
    next_slot: Option<Instant>,
    model_index: usize,
}

/// Rate-limited, model-fallback-aware wrapper around a `TextGenerator`.
///
/// Share one instance (behind an `Arc`) across workers: the pacing slot and
/// the fallback index live under a single lock.
pub struct GenerationClient {
    backend: Arc<dyn TextGenerator>,
    settings: GenerationSettings,
    state: Mutex<ClientState>,
    telemetry: Option<SharedRecorder>,
}

impl GenerationClient {
    pub fn new(
        backend: Arc<dyn TextGenerator>,
        settings: GenerationSettings,
    ) -> Result<Self, ConfigError> {
        if settings.model_chain.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "generation.model_chain".to_string(),
                message: "at least one model is required".to_string(),
            });
        }
        Ok(Self {
            backend,
            settings,
            state: Mutex::new(ClientState::default()),
            telemetry: None,
        })
    }

    pub fn with_telemetry(mut self, recorder: SharedRecorder) -> Self {
        self.telemetry = Some(recorder);
        self
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn current_model(&self) -> String {
        let state = self.lock_state();
        self.model_at(state.model_index)
    }

    /// Adaptation call: generation at the translation temperature with one
    /// layer of surrounding quotes removed.
    pub async fn translate(&self, prompt: &str) -> Result<String, GenerationError> {
        let raw = self
            .generate(prompt, self.settings.temperature, self.settings.max_tokens)
            .await?;
        Ok(strip_quotes(&raw))
    }

    /// Judge call: low temperature, short answer.
    pub async fn validate(&self, prompt: &str) -> Result<String, GenerationError> {
        let raw = self
            .generate(
                prompt,
                self.settings.judge_temperature,
                self.settings.judge_max_tokens,
            )
            .await?;
        Ok(raw.trim().to_string())
    }

    /// Tiny round trip to check credentials and reachability.
    pub async fn test_connection(&self) -> Result<(), GenerationError> {
        self.generate("Reply with OK.", self.settings.judge_temperature, 5)
            .await
            .map(|_| ())
    }

    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let mut retries: u32 = 0;

        loop {
            self.pace().await;

            let request = GenerationRequest {
                prompt: prompt.to_string(),
                model: self.current_model(),
                temperature,
                max_tokens,
            };
            debug!(
                "Generation request to {} ({} chars): {}",
                request.model,
                prompt.len(),
                preview(prompt)
            );

            match self.backend.generate(&request).await {
                Ok(text) => {
                    self.reset_model();
                    return Ok(text);
                }
                Err(GenerationError::CapacityExceeded { model }) => {
                    if retries >= self.settings.max_retries {
                        warn!("Capacity exceeded on {} with no retries left", model);
                        return Err(GenerationError::AllModelsAtCapacity);
                    }
                    match self.advance_model() {
                        Some((from, to)) => {
                            info!(
                                "Model {} at capacity, falling back to {}",
                                model,
                                self.model_at(to)
                            );
                            self.record(AdaptationEvent::ModelFallback {
                                from_index: from,
                                to_index: to,
                            });
                        }
                        None => {
                            warn!("Capacity exceeded on last model {}", model);
                            return Err(GenerationError::AllModelsAtCapacity);
                        }
                    }
                    retries += 1;
                }
                Err(GenerationError::RateLimited) => {
                    if retries >= self.settings.max_retries {
                        return Err(GenerationError::RateLimitExhausted { retries });
                    }
                    let delay_ms = self
                        .settings
                        .backoff_base_ms
                        .saturating_mul(1u64.checked_shl(retries).unwrap_or(u64::MAX));
                    warn!(
                        "Rate limited, backing off {}ms (retry {}/{})",
                        delay_ms,
                        retries + 1,
                        self.settings.max_retries
                    );
                    self.record(AdaptationEvent::RateLimitBackoff {
                        retry: retries + 1,
                        delay_ms,
                    });
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    retries += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Wait for this call's slot. The slot is reserved under the lock so two
    /// concurrent callers are spaced by the minimum interval.
    async fn pace(&self) {
        let interval = Duration::from_millis(self.settings.min_interval_ms);
        let wait = {
            let mut state = self.lock_state();
            let now = Instant::now();
            let slot = match state.next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            state.next_slot = Some(slot + interval);
            slot.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            debug!("Pacing generation call by {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    fn advance_model(&self) -> Option<(usize, usize)> {
        let mut state = self.lock_state();
        let from = state.model_index;
        if from + 1 >= self.settings.model_chain.len() {
            return None;
        }
        state.model_index = from + 1;
        Some((from, from + 1))
    }

    fn reset_model(&self) {
        let mut state = self.lock_state();
        if state.model_index != 0 {
            debug!("Resetting to primary model {}", self.model_at(0));
            state.model_index = 0;
        }
    }

    fn model_at(&self, index: usize) -> String {
        self.settings
            .model_chain
            .get(index)
            .or_else(|| self.settings.model_chain.last())
            .cloned()
            .unwrap_or_default()
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: AdaptationEvent) {
        if let Some(recorder) = &self.telemetry {
            recorder.record(event);
        }
    }
}

const QUOTE_PAIRS: [(char, char); 4] = [('"', '"'), ('\'', '\''), ('“', '”'), ('«', '»')];

/// Trim and remove one layer of matching surrounding quotes.
pub fn strip_quotes(text: &str) -> String {
    let trimmed = text.trim();
    for (open, close) in QUOTE_PAIRS {
        if trimmed.chars().count() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
            let inner = &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()];
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

fn preview(prompt: &str) -> String {
    prompt.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_one_layer_of_quotes() {
        assert_eq!(strip_quotes("  \"Hola\"  "), "Hola");
        assert_eq!(strip_quotes("«Bonjour»"), "Bonjour");
        assert_eq!(strip_quotes("“Hallo”"), "Hallo");
        assert_eq!(strip_quotes("\"'Hola'\""), "'Hola'");
        assert_eq!(strip_quotes("\""), "\"");
        assert_eq!(strip_quotes("Sin comillas"), "Sin comillas");
    }
}
