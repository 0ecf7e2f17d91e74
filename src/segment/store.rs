use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::StoreError;
use crate::segment::types::{ContextMap, SegmentPatch};

/// External per-project segment store.
///
/// Writers only ever send partial patches, so two stages updating different
/// fields of the same segment never clobber each other.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn get(&self, project_id: &str) -> Result<ContextMap, StoreError>;

    async fn update_fields(
        &self,
        project_id: &str,
        segment_id: u64,
        patch: &SegmentPatch,
    ) -> Result<(), StoreError>;
}

/// In-memory implementation of the segment store.
#[derive(Default)]
pub struct InMemorySegmentStore {
    maps: RwLock<HashMap<String, ContextMap>>,
}

impl InMemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, map: ContextMap) {
        self.maps.write().await.insert(map.project_id.clone(), map);
    }
}

#[async_trait]
impl SegmentStore for InMemorySegmentStore {
    async fn get(&self, project_id: &str) -> Result<ContextMap, StoreError> {
        self.maps
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))
    }

    async fn update_fields(
        &self,
        project_id: &str,
        segment_id: u64,
        patch: &SegmentPatch,
    ) -> Result<(), StoreError> {
        let mut maps = self.maps.write().await;
        let map = maps
            .get_mut(project_id)
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))?;
        let segment = map
            .segment_mut(segment_id)
            .ok_or_else(|| StoreError::SegmentNotFound {
                project_id: project_id.to_string(),
                segment_id,
            })?;
        patch.apply(segment);
        Ok(())
    }
}

/// File-based implementation: `<root>/<project>/context_map.json`.
pub struct JsonFileSegmentStore {
    root: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileSegmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id).join("context_map.json")
    }

    pub async fn save(&self, map: &ContextMap) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write(map).await
    }

    async fn read(&self, project_id: &str) -> Result<ContextMap, StoreError> {
        let path = self.path_for(project_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::ProjectNotFound(project_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    async fn write(&self, map: &ContextMap) -> Result<(), StoreError> {
        let path = self.path_for(&map.project_id);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(map)?;
        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Context map saved to {}", path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[async_trait]
impl SegmentStore for JsonFileSegmentStore {
    async fn get(&self, project_id: &str) -> Result<ContextMap, StoreError> {
        self.read(project_id).await
    }

    async fn update_fields(
        &self,
        project_id: &str,
        segment_id: u64,
        patch: &SegmentPatch,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read(project_id).await?;
        let segment = map
            .segment_mut(segment_id)
            .ok_or_else(|| StoreError::SegmentNotFound {
                project_id: project_id.to_string(),
                segment_id,
            })?;
        patch.apply(segment);
        self.write(&map).await
    }
}
