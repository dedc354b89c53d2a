use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::ValidationConfig;
use crate::storage::{RecordError, StatusRecord, StatusStore, StatusStoreError};
use crate::transaction::Transaction;
use crate::types::{Timestamp, TransactionName, TxnId};
use crate::validator::{ValidationError, Validator};

use super::cache::{CacheEntry, HostStatusCache};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("transaction status table is not initialized")]
    NotInitialized,
    #[error("transaction {0} has no commit timestamp")]
    NotCommitted(TransactionName),
    #[error("a different status record already exists for {0}")]
    RecordConflict(TransactionName),
    #[error("status store error: {0}")]
    Store(#[from] StatusStoreError),
    #[error("malformed status record: {0}")]
    Record(#[from] RecordError),
}

/// Outcome of resolving a writer transaction.
///
/// `Committed` and `Invalid` are memoized; the other two are retried on the
/// next read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Every participant confirmed; the writer committed at this timestamp.
    Committed(Timestamp),
    /// Some participant definitively did not commit.
    Invalid,
    /// Some participant could not be reached or has not finished.
    Undetermined,
    /// No commit record exists for the writer (yet).
    Missing,
}

impl Resolution {
    pub fn visible_to(&self, reader: &Transaction) -> bool {
        match self {
            Resolution::Committed(commit_ts) => reader.sees(*commit_ts),
            Resolution::Invalid | Resolution::Undetermined | Resolution::Missing => false,
        }
    }
}

/// Commit-visibility resolver for rows written by other, possibly
/// distributed, transactions.
///
/// Commit records live in a durable [`StatusStore`]; resolutions are memoized
/// in one [`HostStatusCache`] per origin host:port. The miss path holds no
/// lock, so concurrent readers of the same row may resolve it twice; both
/// reach the same answer because commit records are immutable.
pub struct TransactionStatusTable<S: StatusStore> {
    store: OnceCell<Arc<S>>,
    hosts: RwLock<HashMap<String, Arc<HostStatusCache>>>,
    validation: ValidationConfig,
}

impl<S: StatusStore> TransactionStatusTable<S> {
    pub fn new(validation: ValidationConfig) -> Self {
        Self {
            store: OnceCell::new(),
            hosts: RwLock::new(HashMap::new()),
            validation,
        }
    }

    /// Attaches the record store. Only the first call has effect; returns
    /// whether this call was the one that attached it.
    pub async fn initialize(&self, store: Arc<S>) -> bool {
        let mut attached = false;
        let ran = &mut attached;
        self.store
            .get_or_init(|| async move {
                *ran = true;
                store
            })
            .await;

        if attached {
            info!("transaction status table initialized");
        } else {
            debug!("transaction status table already initialized");
        }
        attached
    }

    /// Opens and attaches the record store unless one is attached already.
    /// `open` runs at most once even under concurrent callers; a failed open
    /// leaves the table uninitialized.
    pub async fn initialize_with<F, Fut>(&self, open: F) -> Result<&Arc<S>, StatusError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, StatusStoreError>>,
    {
        self.store
            .get_or_try_init(|| async move {
                let store = open().await?;
                info!("transaction status table initialized");
                Ok::<_, StatusError>(Arc::new(store))
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.store.initialized()
    }

    fn store(&self) -> Result<&Arc<S>, StatusError> {
        self.store.get().ok_or(StatusError::NotInitialized)
    }

    /// Writes the commit record of `txn` with the names of all its local pieces.
    pub async fn commit(
        &self,
        txn: &Transaction,
        participants: &[TransactionName],
    ) -> Result<(), StatusError> {
        let store = self.store()?;
        let name = txn.name();
        let commit_ts = txn
            .commit_timestamp()
            .ok_or_else(|| StatusError::NotCommitted(name.clone()))?;
        let record = StatusRecord::new(participants.to_vec(), commit_ts).encode()?;
        let key = name.to_string();

        match store.put_if_absent(&key, record.clone()).await? {
            Some(existing) if existing == record => {
                debug!(txn = %name, "commit record already present");
                return Ok(());
            }
            Some(_) => return Err(StatusError::RecordConflict(name)),
            None => {}
        }
        info!(
            txn = %name,
            commit_ts,
            participants = participants.len(),
            "commit record written"
        );
        Ok(())
    }

    /// Whether a commit record exists for exactly `name`. Bypasses the cache.
    pub async fn is_committed(&self, name: &TransactionName) -> Result<bool, StatusError> {
        Ok(self.store()?.contains_key(&name.to_string()).await?)
    }

    /// Reads and decodes the commit record of `name`.
    pub async fn record(&self, name: &TransactionName) -> Result<Option<StatusRecord>, StatusError> {
        match self.store()?.get(&name.to_string()).await? {
            Some(persisted) => Ok(Some(StatusRecord::decode(&persisted)?)),
            None => Ok(None),
        }
    }

    /// Whether the row version written by `old_tid` on `host_and_port` is
    /// visible to `current`.
    pub async fn is_valid<V: Validator + ?Sized>(
        &self,
        validator: &V,
        host_and_port: &str,
        old_tid: TxnId,
        current: &Transaction,
    ) -> Result<bool, StatusError> {
        let resolution = self.resolve(validator, host_and_port, old_tid).await?;
        Ok(resolution.visible_to(current))
    }

    /// Resolves the commit status of `old_tid` from `host_and_port`, consulting
    /// the cache first and memoizing terminal outcomes.
    pub async fn resolve<V: Validator + ?Sized>(
        &self,
        validator: &V,
        host_and_port: &str,
        old_tid: TxnId,
    ) -> Result<Resolution, StatusError> {
        let cache = self.cache_for(host_and_port).await;
        match cache.get(old_tid).await {
            CacheEntry::Invalid => return Ok(Resolution::Invalid),
            CacheEntry::Resolved(commit_ts) => return Ok(Resolution::Committed(commit_ts)),
            CacheEntry::Unknown => {}
        }

        let store = self.store()?;
        let name = TransactionName::build(host_and_port, old_tid);
        debug!(txn = %name, "status cache miss");

        let Some(persisted) = store.get(&name.to_string()).await? else {
            warn!(txn = %name, "commit record not found");
            return Ok(Resolution::Missing);
        };
        let record = StatusRecord::decode(&persisted)?;

        for participant in record.others(&name) {
            match self.confirm(validator, participant).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(txn = %name, participant = %participant, "participant did not commit");
                    cache.set(old_tid, CacheEntry::Invalid).await;
                    return Ok(Resolution::Invalid);
                }
                Err(err) => {
                    warn!(
                        txn = %name,
                        participant = %participant,
                        error = %err,
                        "participant commit undetermined"
                    );
                    return Ok(Resolution::Undetermined);
                }
            }
        }

        cache
            .set(old_tid, CacheEntry::Resolved(record.commit_timestamp))
            .await;
        Ok(Resolution::Committed(record.commit_timestamp))
    }

    /// Current cache state for a writer, without resolving it.
    pub async fn cached_entry(&self, host_and_port: &str, tid: TxnId) -> CacheEntry {
        let cache = self.hosts.read().await.get(host_and_port).cloned();
        match cache {
            Some(cache) => cache.get(tid).await,
            None => CacheEntry::Unknown,
        }
    }

    pub async fn cached_hosts(&self) -> usize {
        self.hosts.read().await.len()
    }

    async fn cache_for(&self, host_and_port: &str) -> Arc<HostStatusCache> {
        if let Some(cache) = self.hosts.read().await.get(host_and_port) {
            return cache.clone();
        }

        let mut hosts = self.hosts.write().await;
        hosts
            .entry(host_and_port.to_string())
            .or_insert_with(|| {
                debug!(host = host_and_port, "creating status cache");
                Arc::new(HostStatusCache::new())
            })
            .clone()
    }

    /// One participant check, bounded by the configured timeout and retried
    /// while the outcome stays undetermined.
    async fn confirm<V: Validator + ?Sized>(
        &self,
        validator: &V,
        participant: &TransactionName,
    ) -> Result<bool, ValidationError> {
        let attempts = self.validation.attempts();
        let mut attempt = 1;
        loop {
            let outcome = timeout(self.validation.timeout(), validator.validate(participant))
                .await
                .unwrap_or(Err(ValidationError::TimedOut));

            match outcome {
                Err(err) if attempt < attempts => {
                    debug!(
                        participant = %participant,
                        attempt,
                        error = %err,
                        "retrying participant validation"
                    );
                    sleep(self.validation.retry_backoff()).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
