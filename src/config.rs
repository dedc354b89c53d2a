use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the persisted map holding commit records.
pub const DEFAULT_MAP_NAME: &str = "transactionStatusTable";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Node-level configuration for the transaction status table.
///
/// Every field has a default, so a config file only needs to name what it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusConfig {
    /// Origin identity of this node, embedded in every transaction name it issues.
    pub host_and_port: String,
    /// Name of the persisted status map.
    pub map_name: String,
    /// Storage backend for the status map.
    pub storage: StorageConfig,
    /// How participant confirmations are bounded and retried.
    pub validation: ValidationConfig,
}

impl StatusConfig {
    pub fn new(host_and_port: impl Into<String>) -> Self {
        Self {
            host_and_port: host_and_port.into(),
            ..Self::default()
        }
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            host_and_port: "127.0.0.1:9210".into(),
            map_name: DEFAULT_MAP_NAME.into(),
            storage: StorageConfig::memory(),
            validation: ValidationConfig::default(),
        }
    }
}

/// Supported storage backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Disk,
}

/// Storage configuration specifying the backend and optional directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
        }
    }

    pub fn disk(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Disk,
            path: Some(path.into()),
        }
    }
}

/// Bounds on remote participant confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Upper bound on a single validator call.
    pub timeout_ms: u64,
    /// Extra attempts after an undetermined outcome.
    pub retries: u32,
    /// Pause between attempts.
    pub retry_backoff_ms: u64,
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retries: 2,
            retry_backoff_ms: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        fs::write(
            &path,
            br#"{"host_and_port":"db2:9210","storage":{"backend":"disk","path":"/var/lib/txn"},"validation":{"retries":0}}"#,
        )
        .unwrap();

        let config = StatusConfig::from_json_file(&path).unwrap();
        assert_eq!(config.host_and_port, "db2:9210");
        assert_eq!(config.map_name, DEFAULT_MAP_NAME);
        assert_eq!(config.storage, StorageConfig::disk("/var/lib/txn"));
        assert_eq!(config.validation.retries, 0);
        assert_eq!(config.validation.attempts(), 1);
        assert_eq!(config.validation.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StatusConfig::from_json_file(dir.path().join("absent.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
