//! Commit-visibility resolution for MVCC rows written by distributed transactions.
//!
//! A row carries the id of the transaction that wrote it. Before a reader
//! trusts that row, the writer's commit record is looked up, every remote
//! piece of the writer is confirmed, and the commit timestamp is compared
//! with the reader's snapshot. Terminal outcomes are memoized per origin
//! host:port.

pub mod config;
pub mod node;
pub mod status;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod validator;

pub use config::{StatusConfig, StorageConfig, ValidationConfig};
pub use node::{NodeError, StatusNode};
pub use status::{CacheEntry, HostStatusCache, Resolution, StatusError, TransactionStatusTable};
pub use storage::{StatusRecord, StatusStore, StatusStoreAdapter};
pub use transaction::{Transaction, TransactionClock, TransactionError};
pub use types::{Timestamp, TransactionName, TxnId};
pub use validator::{
    PeerEndpoint, PeerRegistry, PieceState, RegistryValidator, ValidationError, Validator,
};
