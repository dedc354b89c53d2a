//! Commit-visibility resolution for rows written by other transactions.

pub mod cache;
pub mod table;

pub use cache::{CacheEntry, HostStatusCache};
pub use table::{Resolution, StatusError, TransactionStatusTable};
