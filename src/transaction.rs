use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::types::{Timestamp, TransactionName, TxnId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("commit timestamp {commit_ts} precedes start id {start_id}")]
    CommitBeforeStart { start_id: TxnId, commit_ts: Timestamp },
    #[error("transaction {0} is already committed")]
    AlreadyCommitted(TransactionName),
}

/// Transaction context as seen by the status table.
///
/// The start id doubles as the reader's snapshot: a write is visible to this
/// transaction iff it committed at or before `start_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    host_and_port: String,
    start_id: TxnId,
    commit_ts: Option<Timestamp>,
}

impl Transaction {
    pub fn new(host_and_port: impl Into<String>, start_id: TxnId) -> Self {
        Self {
            host_and_port: host_and_port.into(),
            start_id,
            commit_ts: None,
        }
    }

    pub fn host_and_port(&self) -> &str {
        &self.host_and_port
    }

    pub fn start_id(&self) -> TxnId {
        self.start_id
    }

    pub fn commit_timestamp(&self) -> Option<Timestamp> {
        self.commit_ts
    }

    pub fn name(&self) -> TransactionName {
        TransactionName::build(self.host_and_port.clone(), self.start_id)
    }

    /// Stamps the commit timestamp. It is set once and never precedes the start id.
    pub fn mark_committed(&mut self, commit_ts: Timestamp) -> Result<(), TransactionError> {
        if self.commit_ts.is_some() {
            return Err(TransactionError::AlreadyCommitted(self.name()));
        }
        if commit_ts < self.start_id {
            return Err(TransactionError::CommitBeforeStart {
                start_id: self.start_id,
                commit_ts,
            });
        }
        self.commit_ts = Some(commit_ts);
        Ok(())
    }

    /// Snapshot visibility of a write committed at `commit_ts`.
    pub fn sees(&self, commit_ts: Timestamp) -> bool {
        commit_ts <= self.start_id
    }
}

/// Per-node logical clock handing out start ids and commit timestamps.
#[derive(Debug)]
pub struct TransactionClock {
    host_and_port: String,
    clock: AtomicU64,
}

impl TransactionClock {
    pub fn new(host_and_port: impl Into<String>) -> Self {
        Self::starting_at(host_and_port, 0)
    }

    /// Resumes a clock after restart so new ids stay above everything already issued.
    pub fn starting_at(host_and_port: impl Into<String>, last_issued: Timestamp) -> Self {
        Self {
            host_and_port: host_and_port.into(),
            clock: AtomicU64::new(last_issued),
        }
    }

    pub fn begin(&self) -> Transaction {
        Transaction::new(self.host_and_port.clone(), self.next_ts())
    }

    pub fn commit(&self, txn: &mut Transaction) -> Result<Timestamp, TransactionError> {
        let commit_ts = self.next_ts();
        txn.mark_committed(commit_ts)?;
        Ok(commit_ts)
    }

    /// Advances the clock past a timestamp observed from elsewhere.
    pub fn observe(&self, ts: Timestamp) {
        self.clock.fetch_max(ts, Ordering::SeqCst);
    }

    fn next_ts(&self) -> Timestamp {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_follows_start() {
        let clock = TransactionClock::new("h1:1");
        let mut txn = clock.begin();
        let commit_ts = clock.commit(&mut txn).unwrap();
        assert!(commit_ts > txn.start_id());
        assert_eq!(txn.commit_timestamp(), Some(commit_ts));
        assert_eq!(txn.name(), TransactionName::build("h1:1", txn.start_id()));
    }

    #[test]
    fn commit_timestamp_is_set_once() {
        let mut txn = Transaction::new("h1", 10);
        assert_eq!(
            txn.mark_committed(9),
            Err(TransactionError::CommitBeforeStart {
                start_id: 10,
                commit_ts: 9
            })
        );
        txn.mark_committed(10).unwrap();
        assert!(matches!(
            txn.mark_committed(11),
            Err(TransactionError::AlreadyCommitted(_))
        ));
    }

    #[test]
    fn observe_moves_clock_forward_only() {
        let clock = TransactionClock::starting_at("h1", 5);
        clock.observe(3);
        assert_eq!(clock.begin().start_id(), 6);
        clock.observe(20);
        assert_eq!(clock.begin().start_id(), 21);
    }

    #[test]
    fn sees_includes_equal_timestamp() {
        let reader = Transaction::new("h1", 60);
        assert!(reader.sees(50));
        assert!(reader.sees(60));
        assert!(!reader.sees(61));
    }
}
