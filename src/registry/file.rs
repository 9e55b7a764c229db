//! JSON-file-backed registry store.
//!
//! The whole record map is held in memory behind a read-write lock and the
//! backing file is rewritten on every mutation. Mutations hold the write
//! lock across the rewrite, so file writes are serialized; reads never touch
//! the filesystem.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ServiceRecord, ServiceStore, StoreError};

/// Durable [`ServiceStore`] persisting to a single JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<HashMap<String, ServiceRecord>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing records if the file is
    /// present. A missing file is an empty registry, not an error.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(path = %path.display(), "opened service registry");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Rewrite the backing file from the given map snapshot.
    ///
    /// Records are serialized in id order so the file is diff-stable across
    /// rewrites.
    async fn persist(&self, records: &HashMap<String, ServiceRecord>) -> Result<(), StoreError> {
        let ordered: BTreeMap<&String, &ServiceRecord> = records.iter().collect();
        let bytes = serde_json::to_vec_pretty(&ordered)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ServiceStore for JsonFileStore {
    async fn get(&self, id: &str) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, record: ServiceRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
        self.persist(&records).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        if records.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(&records).await?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let mut records: Vec<ServiceRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
