use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::types::Timestamp;

use super::engine::{StatusStore, StatusStoreError};
use super::record::PersistedRecord;

/// Process-local status record store. Contents die with the process.
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    records: RwLock<HashMap<String, PersistedRecord>>,
    high_water_mark: AtomicU64,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get(&self, key: &str) -> Result<Option<PersistedRecord>, StatusStoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: PersistedRecord) -> Result<(), StatusStoreError> {
        self.records.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: PersistedRecord,
    ) -> Result<Option<PersistedRecord>, StatusStoreError> {
        match self.records.write().await.entry(key.to_string()) {
            Entry::Occupied(existing) => Ok(Some(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(None)
            }
        }
    }

    async fn contains_key(&self, key: &str) -> Result<bool, StatusStoreError> {
        Ok(self.records.read().await.contains_key(key))
    }

    async fn high_water_mark(&self) -> Result<Timestamp, StatusStoreError> {
        Ok(self.high_water_mark.load(Ordering::SeqCst))
    }

    async fn raise_high_water_mark(&self, mark: Timestamp) -> Result<(), StatusStoreError> {
        self.high_water_mark.fetch_max(mark, Ordering::SeqCst);
        Ok(())
    }
}
