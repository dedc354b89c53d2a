use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric transaction identifier, monotonic per originating node.
pub type TxnId = u64;
/// Logical timestamp used for snapshot ordering and commit visibility.
pub type Timestamp = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("transaction name `{0}` has no `:` separator")]
    MissingSeparator(String),
    #[error("transaction name `{0}` has an empty host part")]
    EmptyHost(String),
    #[error("transaction name `{0}` has a non-numeric id")]
    InvalidId(String),
}

/// Canonical name of a transaction: its origin host:port plus its id.
///
/// The origin is kept even when the data it wrote has since moved to another
/// node, so a row's recorded origin always resolves to the same status record.
/// Rendered as `<host:port>:<id>` and parsed by splitting on the last `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionName {
    host_and_port: String,
    id: TxnId,
}

impl TransactionName {
    pub fn build(host_and_port: impl Into<String>, id: TxnId) -> Self {
        Self {
            host_and_port: host_and_port.into(),
            id,
        }
    }

    pub fn host_and_port(&self) -> &str {
        &self.host_and_port
    }

    pub fn id(&self) -> TxnId {
        self.id
    }
}

impl fmt::Display for TransactionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_and_port, self.id)
    }
}

impl FromStr for TransactionName {
    type Err = NameError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (host, id) = raw
            .rsplit_once(':')
            .ok_or_else(|| NameError::MissingSeparator(raw.to_string()))?;
        if host.is_empty() {
            return Err(NameError::EmptyHost(raw.to_string()));
        }
        let id = id
            .parse::<TxnId>()
            .map_err(|_| NameError::InvalidId(raw.to_string()))?;
        Ok(Self::build(host, id))
    }
}

impl TryFrom<String> for TransactionName {
    type Error = NameError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<TransactionName> for String {
    fn from(name: TransactionName) -> Self {
        name.to_string()
    }
}
