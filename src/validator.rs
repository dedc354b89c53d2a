use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::storage::StatusStoreError;
use crate::types::TransactionName;

/// Reasons a participant's commit could not be determined.
///
/// None of these say the participant failed; the check may succeed later.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no route to participant host {0}")]
    Unreachable(String),
    #[error("participant {0} has not finished yet")]
    Pending(TransactionName),
    #[error("remote validation failed: {0}")]
    Remote(String),
    #[error("validation timed out")]
    TimedOut,
}

/// Confirms whether one node-local piece of a distributed transaction committed.
///
/// `Ok(false)` is a definite answer: the piece did not commit.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, participant: &TransactionName) -> Result<bool, ValidationError>;
}

#[async_trait]
impl<V: Validator + ?Sized> Validator for Arc<V> {
    async fn validate(&self, participant: &TransactionName) -> Result<bool, ValidationError> {
        (**self).validate(participant).await
    }
}

/// What a node knows about one of its own transaction pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceState {
    Committed,
    Aborted,
    /// No commit record yet and no abort known; the piece may still commit.
    InFlight,
}

/// The side of a node that answers for its own pieces.
#[async_trait]
pub trait PeerEndpoint: Send + Sync {
    async fn piece_state(&self, piece: &TransactionName) -> Result<PieceState, StatusStoreError>;
}

/// Routing table from host:port to the endpoint of the node owning it.
#[derive(Default)]
pub struct PeerRegistry {
    nodes: RwLock<HashMap<String, Arc<dyn PeerEndpoint>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, host_and_port: impl Into<String>, peer: Arc<dyn PeerEndpoint>) {
        self.nodes.write().await.insert(host_and_port.into(), peer);
    }

    pub async fn unregister(&self, host_and_port: &str) {
        self.nodes.write().await.remove(host_and_port);
    }

    pub(crate) async fn get(&self, host_and_port: &str) -> Option<Arc<dyn PeerEndpoint>> {
        self.nodes.read().await.get(host_and_port).cloned()
    }
}

/// Validator that asks the participant's own node what became of its piece.
#[derive(Clone)]
pub struct RegistryValidator {
    registry: Arc<PeerRegistry>,
}

impl RegistryValidator {
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Validator for RegistryValidator {
    async fn validate(&self, participant: &TransactionName) -> Result<bool, ValidationError> {
        let host = participant.host_and_port();
        let peer = self
            .registry
            .get(host)
            .await
            .ok_or_else(|| ValidationError::Unreachable(host.to_string()))?;

        let state = peer
            .piece_state(participant)
            .await
            .map_err(|err| ValidationError::Remote(err.to_string()))?;
        match state {
            PieceState::Committed => Ok(true),
            PieceState::Aborted => Ok(false),
            PieceState::InFlight => Err(ValidationError::Pending(participant.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPeer(HashMap<String, PieceState>);

    #[async_trait]
    impl PeerEndpoint for FixedPeer {
        async fn piece_state(
            &self,
            piece: &TransactionName,
        ) -> Result<PieceState, StatusStoreError> {
            match self.0.get(&piece.to_string()) {
                Some(state) => Ok(*state),
                None => Err(StatusStoreError::Misconfigured("store closed".into())),
            }
        }
    }

    #[tokio::test]
    async fn routes_by_origin_host() {
        let registry = Arc::new(PeerRegistry::new());
        let h2 = FixedPeer(HashMap::from([
            ("h2:100".to_string(), PieceState::Committed),
            ("h2:101".to_string(), PieceState::Aborted),
            ("h2:102".to_string(), PieceState::InFlight),
        ]));
        registry.register("h2", Arc::new(h2)).await;

        let validator = RegistryValidator::new(registry.clone());
        assert_eq!(
            validator.validate(&TransactionName::build("h2", 100)).await,
            Ok(true)
        );
        assert_eq!(
            validator.validate(&TransactionName::build("h2", 101)).await,
            Ok(false)
        );
        assert_eq!(
            validator.validate(&TransactionName::build("h2", 102)).await,
            Err(ValidationError::Pending(TransactionName::build("h2", 102)))
        );
        assert!(matches!(
            validator.validate(&TransactionName::build("h2", 103)).await,
            Err(ValidationError::Remote(_))
        ));
        assert_eq!(
            validator.validate(&TransactionName::build("h3", 100)).await,
            Err(ValidationError::Unreachable("h3".into()))
        );

        registry.unregister("h2").await;
        assert_eq!(
            validator.validate(&TransactionName::build("h2", 100)).await,
            Err(ValidationError::Unreachable("h2".into()))
        );
    }
}
