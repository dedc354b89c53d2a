use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use txnstatus::storage::{
    PersistedRecord, StatusRecord, StatusStore, StatusStoreAdapter, StatusStoreError,
};
use txnstatus::{
    StorageConfig, Timestamp, Transaction, TransactionName, ValidationConfig, ValidationError,
    Validator,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Disk,
}

pub fn all_backends() -> [BackendKind; 2] {
    [BackendKind::Memory, BackendKind::Disk]
}

/// Holds store state and keeps tempdirs alive for disk-backed runs.
#[allow(dead_code)]
pub struct TestStore {
    backend: BackendKind,
    path: Option<PathBuf>,
    _guard: Option<TempDir>,
}

#[allow(dead_code)]
impl TestStore {
    pub fn new(backend: BackendKind) -> Self {
        match backend {
            BackendKind::Memory => Self {
                backend,
                path: None,
                _guard: None,
            },
            BackendKind::Disk => {
                let dir = TempDir::new().expect("create temp dir for status store");
                Self {
                    backend,
                    path: Some(dir.path().join("status")),
                    _guard: Some(dir),
                }
            }
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn storage_config(&self) -> StorageConfig {
        match self.backend {
            BackendKind::Memory => StorageConfig::memory(),
            BackendKind::Disk => StorageConfig::disk(self.path.as_ref().expect("path")),
        }
    }

    pub fn store(&self) -> Arc<StatusStoreAdapter> {
        Arc::new(
            StatusStoreAdapter::open(&self.storage_config(), "transactionStatusTable")
                .expect("open status store"),
        )
    }

    /// Reopen the store at the same path (used for restart tests).
    pub fn reopen(&self) -> Arc<StatusStoreAdapter> {
        self.store()
    }
}

#[allow(dead_code)]
pub fn fast_validation() -> ValidationConfig {
    ValidationConfig {
        timeout_ms: 500,
        retries: 0,
        retry_backoff_ms: 1,
    }
}

#[allow(dead_code)]
pub fn name(raw: &str) -> TransactionName {
    raw.parse().expect("valid transaction name")
}

#[allow(dead_code)]
pub fn reader(start_id: u64) -> Transaction {
    Transaction::new("reader:1", start_id)
}

/// Persists the commit record of `owner` as another node would have written it.
#[allow(dead_code)]
pub async fn seed_record<S: StatusStore + ?Sized>(
    store: &S,
    owner: &str,
    participants: &[&str],
    commit_ts: Timestamp,
) {
    let participants: Vec<_> = participants.iter().map(|p| name(p)).collect();
    let persisted = StatusRecord::new(participants, commit_ts)
        .encode()
        .expect("encode status record");
    store.put(owner, persisted).await.expect("write status record");
}

/// Store wrapper counting reads, to observe cache hits.
#[allow(dead_code)]
pub struct CountingStore<S> {
    inner: Arc<S>,
    gets: AtomicUsize,
}

#[allow(dead_code)]
impl<S: StatusStore> CountingStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: StatusStore> StatusStore for CountingStore<S> {
    async fn get(&self, key: &str) -> Result<Option<PersistedRecord>, StatusStoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: PersistedRecord) -> Result<(), StatusStoreError> {
        self.inner.put(key, value).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: PersistedRecord,
    ) -> Result<Option<PersistedRecord>, StatusStoreError> {
        self.inner.put_if_absent(key, value).await
    }

    async fn contains_key(&self, key: &str) -> Result<bool, StatusStoreError> {
        self.inner.contains_key(key).await
    }

    async fn high_water_mark(&self) -> Result<Timestamp, StatusStoreError> {
        self.inner.high_water_mark().await
    }

    async fn raise_high_water_mark(&self, mark: Timestamp) -> Result<(), StatusStoreError> {
        self.inner.raise_high_water_mark(mark).await
    }
}

/// Validator with a fixed answer per participant, counting calls.
#[allow(dead_code)]
#[derive(Default)]
pub struct FixedValidator {
    answers: Mutex<HashMap<String, Result<bool, ValidationError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl FixedValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, participant: &str, answer: Result<bool, ValidationError>) -> Self {
        self.set(participant, answer);
        self
    }

    /// Makes every call wait before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set(&self, participant: &str, answer: Result<bool, ValidationError>) {
        self.answers
            .lock()
            .expect("validator answers lock")
            .insert(participant.to_string(), answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Validator for FixedValidator {
    async fn validate(&self, participant: &TransactionName) -> Result<bool, ValidationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answers
            .lock()
            .expect("validator answers lock")
            .get(&participant.to_string())
            .cloned()
            .unwrap_or(Ok(false))
    }
}
