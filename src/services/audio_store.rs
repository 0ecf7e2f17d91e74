use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

use crate::error::SynthesisError;

/// Keeps synthesized audio and hands back the reference stored as
/// `generatedAudioRef`.
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn persist(&self, segment_id: u64, attempt: u32, audio: &[u8]) -> Result<String, SynthesisError>;
}

/// Writes `<dir>/segment_<id>_attempt<k>.wav`.
#[derive(Debug, Clone)]
pub struct FsAudioStore {
    dir: PathBuf,
}

impl FsAudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, segment_id: u64, attempt: u32) -> PathBuf {
        self.dir
            .join(format!("segment_{}_attempt{}.wav", segment_id, attempt))
    }
}

#[async_trait]
impl AudioStore for FsAudioStore {
    async fn persist(&self, segment_id: u64, attempt: u32, audio: &[u8]) -> Result<String, SynthesisError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(segment_id, attempt);
        tokio::fs::write(&path, audio).await?;
        debug!("Stored {} bytes of audio at {}", audio.len(), path.display());
        Ok(path.display().to_string())
    }
}

/// Keeps audio in memory under `mem://segment_<id>/attempt<k>`.
#[derive(Debug, Default)]
pub struct MemoryAudioStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryAudioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(reference).cloned())
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AudioStore for MemoryAudioStore {
    async fn persist(&self, segment_id: u64, attempt: u32, audio: &[u8]) -> Result<String, SynthesisError> {
        let reference = format!("mem://segment_{}/attempt{}", segment_id, attempt);
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| SynthesisError::Backend("audio store lock poisoned".to_string()))?;
        blobs.insert(reference.clone(), audio.to_vec());
        Ok(reference)
    }
}
