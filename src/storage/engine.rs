use async_trait::async_trait;
use thiserror::Error;

use crate::types::Timestamp;

use super::record::PersistedRecord;

/// Errors surfaced by status record store implementations.
#[derive(Debug, Error)]
pub enum StatusStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("status store is misconfigured: {0}")]
    Misconfigured(String),
}

/// Durable map from transaction name to its commit record.
///
/// Consistency and replication of the map are the implementation's concern.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<PersistedRecord>, StatusStoreError>;

    async fn put(&self, key: &str, value: PersistedRecord) -> Result<(), StatusStoreError>;

    /// Inserts `value` unless `key` is already present, atomically. Returns the
    /// record that was already stored, if any; that record is left untouched.
    async fn put_if_absent(
        &self,
        key: &str,
        value: PersistedRecord,
    ) -> Result<Option<PersistedRecord>, StatusStoreError>;

    async fn contains_key(&self, key: &str) -> Result<bool, StatusStoreError>;

    /// Highest transaction id or timestamp the owning node has reserved.
    /// Zero for a fresh store.
    async fn high_water_mark(&self) -> Result<Timestamp, StatusStoreError>;

    /// Raises the reserved mark to `mark`; lower values are ignored.
    async fn raise_high_water_mark(&self, mark: Timestamp) -> Result<(), StatusStoreError>;
}
