//! File storage for finished records
//!
//! One file per entity at `<dir>/<entity_id>.json`. Writes go to a temporary
//! sibling first and are renamed into place, so a record file is either the
//! previous version or the new one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kcrawl_core::{EntityRecord, KcError, RecordStore, Result};

/// Writes records as pretty-printed JSON files
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Target path for an identifier
    pub fn path_for(&self, entity_id: &str) -> Result<PathBuf> {
        if entity_id.is_empty() {
            return Err(KcError::StorageError("empty entity_id".to_string()));
        }
        if !entity_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(KcError::StorageError(format!(
                "entity_id '{entity_id}' is not a safe file name"
            )));
        }
        Ok(self.dir.join(format!("{entity_id}.json")))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn persist(&self, record: &EntityRecord) -> Result<String> {
        let entity_id = record
            .entity_id()
            .ok_or_else(|| KcError::StorageError("record has no entity_id".to_string()))?;
        let path = self.path_for(entity_id)?;

        let content = record
            .to_pretty_json()
            .map_err(|e| KcError::StorageError(format!("Failed to serialize record: {e}")))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            KcError::StorageError(format!("Failed to create {}: {e}", self.dir.display()))
        })?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content.as_bytes())
            .await
            .map_err(|e| KcError::StorageError(format!("Failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            KcError::StorageError(format!("Failed to move record to {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "Record written");
        Ok(path.display().to_string())
    }
}
