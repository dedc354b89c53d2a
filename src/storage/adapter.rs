use std::path::Path;

use crate::config::{StorageBackend, StorageConfig};
use crate::types::Timestamp;

use super::disk::OnDiskStatusStore;
use super::engine::{StatusStore, StatusStoreError};
use super::memory::InMemoryStatusStore;
use super::record::PersistedRecord;

/// Runtime-selectable store wrapper so binaries can switch between memory and disk.
pub enum StatusStoreAdapter {
    Memory(InMemoryStatusStore),
    Disk(OnDiskStatusStore),
}

impl StatusStoreAdapter {
    pub fn memory() -> Self {
        Self::Memory(InMemoryStatusStore::new())
    }

    pub fn disk(dir: impl AsRef<Path>, name: &str) -> Result<Self, StatusStoreError> {
        Ok(Self::Disk(OnDiskStatusStore::open(dir, name)?))
    }

    /// Opens the map `name` on the configured backend.
    pub fn open(config: &StorageConfig, name: &str) -> Result<Self, StatusStoreError> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::memory()),
            StorageBackend::Disk => {
                let path = config.path.as_ref().ok_or_else(|| {
                    StatusStoreError::Misconfigured("disk backend requires a path".into())
                })?;
                Self::disk(path, name)
            }
        }
    }
}

#[async_trait::async_trait]
impl StatusStore for StatusStoreAdapter {
    async fn get(&self, key: &str) -> Result<Option<PersistedRecord>, StatusStoreError> {
        match self {
            StatusStoreAdapter::Memory(inner) => inner.get(key).await,
            StatusStoreAdapter::Disk(inner) => inner.get(key).await,
        }
    }

    async fn put(&self, key: &str, value: PersistedRecord) -> Result<(), StatusStoreError> {
        match self {
            StatusStoreAdapter::Memory(inner) => inner.put(key, value).await,
            StatusStoreAdapter::Disk(inner) => inner.put(key, value).await,
        }
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: PersistedRecord,
    ) -> Result<Option<PersistedRecord>, StatusStoreError> {
        match self {
            StatusStoreAdapter::Memory(inner) => inner.put_if_absent(key, value).await,
            StatusStoreAdapter::Disk(inner) => inner.put_if_absent(key, value).await,
        }
    }

    async fn contains_key(&self, key: &str) -> Result<bool, StatusStoreError> {
        match self {
            StatusStoreAdapter::Memory(inner) => inner.contains_key(key).await,
            StatusStoreAdapter::Disk(inner) => inner.contains_key(key).await,
        }
    }

    async fn high_water_mark(&self) -> Result<Timestamp, StatusStoreError> {
        match self {
            StatusStoreAdapter::Memory(inner) => inner.high_water_mark().await,
            StatusStoreAdapter::Disk(inner) => inner.high_water_mark().await,
        }
    }

    async fn raise_high_water_mark(&self, mark: Timestamp) -> Result<(), StatusStoreError> {
        match self {
            StatusStoreAdapter::Memory(inner) => inner.raise_high_water_mark(mark).await,
            StatusStoreAdapter::Disk(inner) => inner.raise_high_water_mark(mark).await,
        }
    }
}
