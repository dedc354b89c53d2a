use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{NameError, Timestamp, TransactionName};

/// Current on-disk layout of a status record value.
pub const RECORD_FORMAT_VERSION: u32 = 1;

const PARTICIPANT_DELIMITER: char = ',';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("unsupported status record format version {0}")]
    UnsupportedVersion(u32),
    #[error("participant name `{0}` contains the list delimiter")]
    DelimiterInName(String),
    #[error("status record has no participants")]
    NoParticipants,
    #[error(transparent)]
    Name(#[from] NameError),
}

/// Status record value exactly as persisted: participants comma-joined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedRecord {
    pub version: u32,
    pub participants: String,
    pub commit_ts: Timestamp,
}

/// Commit record of a (possibly distributed) transaction.
///
/// Written once at commit time and never mutated. The participant list names
/// every node-local piece, including the transaction itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub participants: Vec<TransactionName>,
    pub commit_timestamp: Timestamp,
}

impl StatusRecord {
    pub fn new(participants: Vec<TransactionName>, commit_timestamp: Timestamp) -> Self {
        Self {
            participants,
            commit_timestamp,
        }
    }

    /// Participants that must be confirmed remotely before `owner` is trusted.
    pub fn others<'a>(
        &'a self,
        owner: &'a TransactionName,
    ) -> impl Iterator<Item = &'a TransactionName> + 'a {
        self.participants.iter().filter(move |name| *name != owner)
    }

    pub fn encode(&self) -> Result<PersistedRecord, RecordError> {
        let mut joined = String::new();
        for (idx, name) in self.participants.iter().enumerate() {
            let rendered = name.to_string();
            if rendered.contains(PARTICIPANT_DELIMITER) {
                return Err(RecordError::DelimiterInName(rendered));
            }
            if idx > 0 {
                joined.push(PARTICIPANT_DELIMITER);
            }
            joined.push_str(&rendered);
        }

        Ok(PersistedRecord {
            version: RECORD_FORMAT_VERSION,
            participants: joined,
            commit_ts: self.commit_timestamp,
        })
    }

    pub fn decode(persisted: &PersistedRecord) -> Result<Self, RecordError> {
        if persisted.version != RECORD_FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(persisted.version));
        }
        if persisted.participants.is_empty() {
            return Err(RecordError::NoParticipants);
        }

        let participants = persisted
            .participants
            .split(PARTICIPANT_DELIMITER)
            .map(str::parse)
            .collect::<Result<Vec<TransactionName>, _>>()?;

        Ok(Self::new(participants, persisted.commit_ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> TransactionName {
        raw.parse().unwrap()
    }

    #[test]
    fn participants_are_comma_joined() {
        let record = StatusRecord::new(vec![name("h1:100"), name("h2:7001:100")], 50);
        let persisted = record.encode().unwrap();
        assert_eq!(persisted.participants, "h1:100,h2:7001:100");
        assert_eq!(persisted.commit_ts, 50);
        assert_eq!(persisted.version, RECORD_FORMAT_VERSION);
        assert_eq!(StatusRecord::decode(&persisted).unwrap(), record);
    }

    #[test]
    fn others_skips_owner() {
        let owner = name("h1:100");
        let record = StatusRecord::new(vec![owner.clone(), name("h2:100"), name("h3:9")], 5);
        let others: Vec<String> = record.others(&owner).map(|n| n.to_string()).collect();
        assert_eq!(others, vec!["h2:100", "h3:9"]);
    }

    #[test]
    fn delimiter_in_host_cannot_be_encoded() {
        let record = StatusRecord::new(vec![TransactionName::build("a,b", 1)], 1);
        assert_eq!(
            record.encode(),
            Err(RecordError::DelimiterInName("a,b:1".into()))
        );
    }

    #[test]
    fn decode_rejects_unknown_version_and_garbage() {
        let future = PersistedRecord {
            version: 9,
            participants: "h1:1".into(),
            commit_ts: 1,
        };
        assert_eq!(
            StatusRecord::decode(&future),
            Err(RecordError::UnsupportedVersion(9))
        );

        let empty = PersistedRecord {
            version: RECORD_FORMAT_VERSION,
            participants: String::new(),
            commit_ts: 1,
        };
        assert_eq!(StatusRecord::decode(&empty), Err(RecordError::NoParticipants));

        let garbage = PersistedRecord {
            version: RECORD_FORMAT_VERSION,
            participants: "h1:1,nonsense".into(),
            commit_ts: 1,
        };
        assert!(matches!(
            StatusRecord::decode(&garbage),
            Err(RecordError::Name(_))
        ));
    }
}
