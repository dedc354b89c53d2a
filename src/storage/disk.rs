use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::Timestamp;

use super::engine::{StatusStore, StatusStoreError};
use super::record::PersistedRecord;

/// File-backed status record store.
///
/// The whole map is rewritten on every put through a temp file and a rename,
/// so a crash leaves either the old or the new map on disk.
pub struct OnDiskStatusStore {
    data_file: PathBuf,
    state: RwLock<StoredRecords>,
}

#[derive(Default, Serialize, Deserialize)]
struct StoredRecords {
    records: HashMap<String, PersistedRecord>,
    #[serde(default)]
    high_water_mark: Timestamp,
}

impl OnDiskStatusStore {
    /// Opens (or creates) the map `name` under `dir`.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self, StatusStoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let data_file = dir.join(format!("{name}.json"));
        let mut state: StoredRecords = match fs::read(&data_file) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoredRecords::default(),
            Err(err) => return Err(StatusStoreError::Io(err)),
        };
        // Files written without a mark still bound it by their commit timestamps.
        let recorded = state.records.values().map(|r| r.commit_ts).max().unwrap_or(0);
        state.high_water_mark = state.high_water_mark.max(recorded);

        Ok(Self {
            data_file,
            state: RwLock::new(state),
        })
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    fn persist(&self, state: &StoredRecords) -> Result<(), StatusStoreError> {
        let serialized = serde_json::to_vec(state)?;
        let tmp = self.data_file.with_extension("tmp");
        fs::write(&tmp, serialized)?;
        fs::rename(tmp, &self.data_file)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatusStore for OnDiskStatusStore {
    async fn get(&self, key: &str) -> Result<Option<PersistedRecord>, StatusStoreError> {
        Ok(self.state.read().await.records.get(key).cloned())
    }

    async fn put(&self, key: &str, value: PersistedRecord) -> Result<(), StatusStoreError> {
        let mut state = self.state.write().await;
        let previous = state.records.insert(key.to_string(), value);
        if let Err(err) = self.persist(&state) {
            // Keep memory in line with what is on disk.
            match previous {
                Some(old) => state.records.insert(key.to_string(), old),
                None => state.records.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: PersistedRecord,
    ) -> Result<Option<PersistedRecord>, StatusStoreError> {
        let mut state = self.state.write().await;
        match state.records.entry(key.to_string()) {
            Entry::Occupied(existing) => return Ok(Some(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
        if let Err(err) = self.persist(&state) {
            state.records.remove(key);
            return Err(err);
        }
        Ok(None)
    }

    async fn contains_key(&self, key: &str) -> Result<bool, StatusStoreError> {
        Ok(self.state.read().await.records.contains_key(key))
    }

    async fn high_water_mark(&self) -> Result<Timestamp, StatusStoreError> {
        Ok(self.state.read().await.high_water_mark)
    }

    async fn raise_high_water_mark(&self, mark: Timestamp) -> Result<(), StatusStoreError> {
        let mut state = self.state.write().await;
        let previous = state.high_water_mark;
        if mark <= previous {
            return Ok(());
        }
        state.high_water_mark = mark;
        if let Err(err) = self.persist(&state) {
            state.high_water_mark = previous;
            return Err(err);
        }
        Ok(())
    }
}
