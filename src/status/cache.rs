use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::warn;

use crate::types::{Timestamp, TxnId};

/// Memoized resolution of one writer transaction.
///
/// `Invalid` and `Resolved` are terminal: once installed they never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntry {
    Unknown,
    Invalid,
    Resolved(Timestamp),
}

impl CacheEntry {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CacheEntry::Unknown)
    }
}

/// Resolutions for writers that originated on one host:port.
#[derive(Debug, Default)]
pub struct HostStatusCache {
    entries: RwLock<HashMap<TxnId, CacheEntry>>,
}

impl HostStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, tid: TxnId) -> CacheEntry {
        self.entries
            .read()
            .await
            .get(&tid)
            .copied()
            .unwrap_or(CacheEntry::Unknown)
    }

    /// Installs a terminal entry. The first terminal value for a key wins;
    /// `Unknown` is never stored.
    pub async fn set(&self, tid: TxnId, entry: CacheEntry) {
        if !entry.is_terminal() {
            return;
        }
        let mut entries = self.entries.write().await;
        let installed = *entries.entry(tid).or_insert(entry);
        if installed != entry {
            warn!(tid, ?installed, ?entry, "conflicting terminal status ignored");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
