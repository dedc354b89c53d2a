use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::StatusConfig;
use crate::status::{Resolution, StatusError, TransactionStatusTable};
use crate::storage::{StatusStore, StatusStoreAdapter, StatusStoreError};
use crate::transaction::{Transaction, TransactionClock, TransactionError};
use crate::types::{Timestamp, TransactionName, TxnId};
use crate::validator::{PeerEndpoint, PeerRegistry, PieceState, RegistryValidator};

/// Ids and timestamps covered by one durable write of the high-water mark.
const RESERVATION_BLOCK: Timestamp = 1_000;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Store(#[from] StatusStoreError),
    #[error("transaction {txn} does not originate on this node ({local})")]
    ForeignTransaction { txn: TransactionName, local: String },
    #[error("transaction {0} was aborted")]
    Aborted(TransactionName),
}

/// What this node tells peers about its own pieces.
struct LocalPieces {
    store: Arc<StatusStoreAdapter>,
    /// Ids at or below this were reserved before the last restart. Any of
    /// them without a commit record was lost with the old process.
    recovered_through: Timestamp,
    aborted: RwLock<HashSet<TxnId>>,
}

impl LocalPieces {
    fn closed(&self, aborted: &HashSet<TxnId>, id: TxnId) -> bool {
        id <= self.recovered_through || aborted.contains(&id)
    }
}

#[async_trait]
impl PeerEndpoint for LocalPieces {
    async fn piece_state(&self, piece: &TransactionName) -> Result<PieceState, StatusStoreError> {
        if self.store.contains_key(&piece.to_string()).await? {
            return Ok(PieceState::Committed);
        }
        if self.closed(&*self.aborted.read().await, piece.id()) {
            return Ok(PieceState::Aborted);
        }
        Ok(PieceState::InFlight)
    }
}

/// One database node's view of transaction status.
///
/// Owns the status table for its host:port and registers itself with the
/// shared peer registry, so other nodes can confirm the pieces of
/// distributed transactions that ran here.
pub struct StatusNode {
    config: StatusConfig,
    clock: TransactionClock,
    table: TransactionStatusTable<StatusStoreAdapter>,
    pieces: Arc<LocalPieces>,
    reserved: AtomicU64,
    reservation: Mutex<()>,
    registry: Arc<PeerRegistry>,
    validator: RegistryValidator,
}

impl StatusNode {
    /// Opens the node's store and resumes its clock above every id or
    /// timestamp reserved by a previous run.
    pub async fn open(config: StatusConfig, registry: Arc<PeerRegistry>) -> Result<Self, NodeError> {
        let table = TransactionStatusTable::new(config.validation.clone());
        let (storage, map_name) = (&config.storage, config.map_name.as_str());
        let store = table
            .initialize_with(|| async move { StatusStoreAdapter::open(storage, map_name) })
            .await?
            .clone();

        let recovered = store.high_water_mark().await?;
        let pieces = Arc::new(LocalPieces {
            store,
            recovered_through: recovered,
            aborted: RwLock::new(HashSet::new()),
        });
        registry
            .register(config.host_and_port.clone(), pieces.clone())
            .await;
        info!(
            host = %config.host_and_port,
            recovered_through = recovered,
            "status node registered"
        );

        Ok(Self {
            clock: TransactionClock::starting_at(config.host_and_port.clone(), recovered),
            validator: RegistryValidator::new(registry.clone()),
            reserved: AtomicU64::new(recovered),
            reservation: Mutex::new(()),
            config,
            table,
            pieces,
            registry,
        })
    }

    pub fn host_and_port(&self) -> &str {
        &self.config.host_and_port
    }

    pub fn table(&self) -> &TransactionStatusTable<StatusStoreAdapter> {
        &self.table
    }

    pub async fn begin(&self) -> Result<Transaction, NodeError> {
        let txn = self.clock.begin();
        self.reserve_through(txn.start_id()).await?;
        Ok(txn)
    }

    /// Commits the local piece `txn` and records `participants` as the full set
    /// of pieces. A commit timestamp already chosen by a coordinator is kept;
    /// otherwise one is drawn from this node's clock.
    pub async fn commit(
        &self,
        txn: &mut Transaction,
        participants: &[TransactionName],
    ) -> Result<Timestamp, NodeError> {
        self.ensure_local(txn)?;

        // Held until the record is written so an abort cannot slip in between.
        let aborted = self.pieces.aborted.read().await;
        if self.pieces.closed(&aborted, txn.start_id())
            && !self.table.is_committed(&txn.name()).await?
        {
            return Err(NodeError::Aborted(txn.name()));
        }

        let commit_ts = match txn.commit_timestamp() {
            Some(commit_ts) => {
                self.clock.observe(commit_ts);
                commit_ts
            }
            None => self.clock.commit(txn)?,
        };
        self.reserve_through(commit_ts).await?;
        self.table.commit(txn, participants).await?;
        drop(aborted);
        Ok(commit_ts)
    }

    /// Commits a transaction that touched only this node.
    pub async fn commit_local(&self, txn: &mut Transaction) -> Result<Timestamp, NodeError> {
        let name = txn.name();
        self.commit(txn, &[name]).await
    }

    /// Marks the local piece `txn` as never committing. Peers asking about it
    /// get a definite rejection from now on.
    pub async fn abort(&self, txn: &Transaction) -> Result<(), NodeError> {
        self.ensure_local(txn)?;
        let name = txn.name();

        let mut aborted = self.pieces.aborted.write().await;
        if self.table.is_committed(&name).await? {
            return Err(TransactionError::AlreadyCommitted(name).into());
        }
        aborted.insert(txn.start_id());
        info!(txn = %name, "transaction aborted");
        Ok(())
    }

    /// Whether the row version written by `old_tid` from `host_and_port` is
    /// visible to `reader`, confirming remote pieces through the registry.
    pub async fn is_visible(
        &self,
        host_and_port: &str,
        old_tid: TxnId,
        reader: &Transaction,
    ) -> Result<bool, StatusError> {
        self.table
            .is_valid(&self.validator, host_and_port, old_tid, reader)
            .await
    }

    pub async fn resolve(
        &self,
        host_and_port: &str,
        old_tid: TxnId,
    ) -> Result<Resolution, StatusError> {
        self.table
            .resolve(&self.validator, host_and_port, old_tid)
            .await
    }

    /// Local answer to a peer asking whether one of our pieces committed.
    pub async fn validate_local(&self, name: &TransactionName) -> Result<bool, StatusError> {
        self.table.is_committed(name).await
    }

    /// Withdraws this node from the registry; peers see it as unreachable.
    pub async fn shutdown(&self) {
        self.registry.unregister(self.host_and_port()).await;
        info!(host = %self.config.host_and_port, "status node unregistered");
    }

    fn ensure_local(&self, txn: &Transaction) -> Result<(), NodeError> {
        if txn.host_and_port() != self.host_and_port() {
            return Err(NodeError::ForeignTransaction {
                txn: txn.name(),
                local: self.host_and_port().to_string(),
            });
        }
        Ok(())
    }

    /// Makes `ts` durable as issued before it is handed out, one block at a time.
    async fn reserve_through(&self, ts: Timestamp) -> Result<(), NodeError> {
        if ts <= self.reserved.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.reservation.lock().await;
        if ts <= self.reserved.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mark = ts.saturating_add(RESERVATION_BLOCK);
        self.pieces.store.raise_high_water_mark(mark).await?;
        self.reserved.store(mark, Ordering::SeqCst);
        debug!(host = %self.config.host_and_port, mark, "reserved transaction ids");
        Ok(())
    }
}
