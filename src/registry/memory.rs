//! In-memory registry store.
//!
//! Backed by a lock-free concurrent map; used by tests and by deployments
//! that do not need the registry to survive a restart.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{ServiceRecord, ServiceStore, StoreError};

/// Concurrent in-memory [`ServiceStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, ServiceRecord>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, record: ServiceRecord) -> Result<(), StoreError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let mut records: Vec<ServiceRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
