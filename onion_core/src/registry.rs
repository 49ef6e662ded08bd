/*! The node registry: a process-wide directory of relay identities.
*/

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;

use onion_crypto::import_public_key;
use onion_packet::{NodeEntry, NodeId};

/// Error that can happen when registering a node.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RegisterError {
    /// Public key is not the text encoding of a full-size key.
    #[error("Invalid request: malformed public key")]
    InvalidRequest,
}

/** Directory mapping relay identity to its long-lived public key.

In-memory only: no eviction, no persistence, no authentication of the
caller. A single registration is atomic; there is no transactionality
across registrations.
*/
#[derive(Debug, Default)]
pub struct Registry {
    /// Registered nodes keyed by id, so an id can never appear twice.
    nodes: RwLock<HashMap<NodeId, NodeEntry>>,
}

impl Registry {
    /// Create an empty `Registry`.
    pub fn new() -> Registry {
        Registry::default()
    }

    /** Insert or replace the entry for `node_id`.

    Idempotent: re-registering an id updates its key in place instead of
    duplicating the entry. Fails with `RegisterError::InvalidRequest`
    when `pub_key` does not decode to a full-size public key.
    */
    pub async fn register(&self, node_id: NodeId, pub_key: String) -> Result<(), RegisterError> {
        import_public_key(&pub_key).map_err(|_| RegisterError::InvalidRequest)?;
        let mut nodes = self.nodes.write().await;
        debug!("Registering node {}", node_id);
        nodes.insert(node_id, NodeEntry { node_id, pub_key });
        Ok(())
    }

    /// Full copy of the current directory. Order is not meaningful.
    pub async fn snapshot(&self) -> Vec<NodeEntry> {
        self.nodes.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onion_crypto::{export_public_key, SecretKey};
    use rand::thread_rng;

    fn exported_key() -> String {
        export_public_key(&SecretKey::generate(&mut thread_rng()).public_key())
    }

    #[tokio::test]
    async fn register_and_snapshot() {
        let registry = Registry::new();
        let key_1 = exported_key();
        let key_2 = exported_key();
        registry.register(1, key_1.clone()).await.unwrap();
        registry.register(2, key_2.clone()).await.unwrap();

        let mut snapshot = registry.snapshot().await;
        snapshot.sort_by_key(|node| node.node_id);
        assert_eq!(
            snapshot,
            vec![
                NodeEntry { node_id: 1, pub_key: key_1 },
                NodeEntry { node_id: 2, pub_key: key_2 },
            ]
        );
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = Registry::new();
        let first_key = exported_key();
        let second_key = exported_key();
        registry.register(1, first_key).await.unwrap();
        registry.register(1, second_key.clone()).await.unwrap();

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].pub_key, second_key);
    }

    #[tokio::test]
    async fn register_invalid_key() {
        let registry = Registry::new();
        assert_eq!(
            registry.register(1, "not a key".to_owned()).await,
            Err(RegisterError::InvalidRequest)
        );
        assert_eq!(
            registry.register(1, "c2hvcnQ=".to_owned()).await,
            Err(RegisterError::InvalidRequest)
        );
        assert!(registry.snapshot().await.is_empty());
    }
}
