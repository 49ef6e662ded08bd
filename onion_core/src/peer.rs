/*! Sender and destination peers.

A peer both sends messages through the overlay and receives whatever
payload reaches its message endpoint. By the time an envelope's layers
are fully peeled, the exit relay hands the destination plain text, so
receiving does no decryption at all.
*/

use rand::{CryptoRng, Rng};
use thiserror::Error;
use tokio::sync::RwLock;

use onion_crypto::import_public_key;
use onion_packet::{HopAddr, NodeEntry, NodeId};

use crate::circuit::{pick_circuit, PickCircuitError};
use crate::forward::{ForwardError, Forwarder};
use crate::onion::{build_onion, BuildError, OnionHop};

/// Maps a node id to the network address its relay listens on. Address
/// derivation is configuration; the core only handles opaque `HopAddr`s.
pub trait AddrBook: Sync {
    /// Resolved address of the relay with the given id.
    fn relay_addr(&self, node_id: NodeId) -> HopAddr;
}

/// Error that can happen when sending a message through the overlay.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SendError {
    /// Circuit selection cannot proceed; the message was not sent.
    #[error("Cannot pick a circuit: {0}")]
    PickCircuit(PickCircuitError),
    /// Directory entry holds a key that does not import.
    #[error("Directory entry for node {0} holds a malformed public key")]
    BadDirectoryKey(NodeId),
    /// Envelope construction failed.
    #[error("Cannot build the envelope: {0}")]
    Build(BuildError),
    /// The first relay could not be reached. Failures at later hops are
    /// invisible to the sender: the first-hop delivery is the only call
    /// it makes synchronously.
    #[error("Cannot reach the first relay: {0}")]
    Forward(ForwardError),
}

/// Last-observed fields of a peer, exposed for external inspection.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PeerDiagnostics {
    /// Last plaintext that reached the message endpoint.
    pub last_received_message: Option<String>,
    /// Last plaintext successfully handed to a first relay.
    pub last_sent_message: Option<String>,
    /// Node ids of the last circuit a message was sent along.
    pub last_circuit: Option<Vec<NodeId>>,
}

/// A destination/sender peer. One instance per peer process.
#[derive(Debug, Default)]
pub struct Peer {
    diagnostics: RwLock<PeerDiagnostics>,
}

impl Peer {
    /// Create a new `Peer`.
    pub fn new() -> Peer {
        Peer::default()
    }

    /// Record a payload that reached the message endpoint. No
    /// decryption: whatever arrives here is treated as plaintext.
    pub async fn receive(&self, message: &str) {
        self.diagnostics.write().await.last_received_message = Some(message.to_owned());
    }

    /// Snapshot of the last-observed diagnostic fields.
    pub async fn diagnostics(&self) -> PeerDiagnostics {
        self.diagnostics.read().await.clone()
    }

    /** Send `message` to `destination` through a fresh 3-hop circuit.

    Picks the circuit from `directory`, resolves each relay's address
    through `addrs`, builds the layered envelope and delivers it to the
    first relay. The last-sent diagnostics are recorded only when the
    first-hop delivery succeeds.
    */
    pub async fn send_message<R, F, A>(
        &self,
        rng: &mut R,
        forwarder: &F,
        addrs: &A,
        directory: &[NodeEntry],
        destination: HopAddr,
        message: &str,
    ) -> Result<(), SendError>
    where
        R: Rng + CryptoRng + Send,
        F: Forwarder,
        A: AddrBook,
    {
        let circuit = pick_circuit(rng, directory).map_err(SendError::PickCircuit)?;
        let [node_1, node_2, node_3] = &circuit;
        let hops = [
            onion_hop(addrs, node_1)?,
            onion_hop(addrs, node_2)?,
            onion_hop(addrs, node_3)?,
        ];
        let first_hop = hops[0].addr;

        let envelope = build_onion(rng, message, destination, &hops).map_err(SendError::Build)?;
        debug!("Sending envelope to first relay at {}", first_hop);
        forwarder
            .forward(first_hop, envelope.to_text())
            .await
            .map_err(SendError::Forward)?;

        let mut diagnostics = self.diagnostics.write().await;
        diagnostics.last_sent_message = Some(message.to_owned());
        diagnostics.last_circuit = Some(circuit.iter().map(|node| node.node_id).collect());
        Ok(())
    }
}

fn onion_hop<A: AddrBook>(addrs: &A, node: &NodeEntry) -> Result<OnionHop, SendError> {
    let public_key =
        import_public_key(&node.pub_key).map_err(|_| SendError::BadDirectoryKey(node.node_id))?;
    Ok(OnionHop {
        public_key,
        addr: addrs.relay_addr(node.node_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::test_forwarders::{ChannelForwarder, FailingForwarder};
    use crate::onion::Relay;
    use crate::registry::Registry;
    use futures::channel::mpsc;
    use futures::StreamExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RELAY_BASE: u32 = 4000;

    struct TestAddrBook;

    impl AddrBook for TestAddrBook {
        fn relay_addr(&self, node_id: NodeId) -> HopAddr {
            HopAddr(RELAY_BASE + node_id)
        }
    }

    async fn registered_relays(registry: &Registry) -> Vec<(NodeId, Relay)> {
        let mut rng = StdRng::from_entropy();
        let mut relays = Vec::new();
        for node_id in 1..=3 {
            let relay = Relay::new(&mut rng);
            registry
                .register(node_id, relay.exported_public_key())
                .await
                .unwrap();
            relays.push((node_id, relay));
        }
        relays
    }

    #[tokio::test]
    async fn send_message_end_to_end() {
        let mut rng = StdRng::from_entropy();
        let registry = Registry::new();
        let relays = registered_relays(&registry).await;
        let directory = registry.snapshot().await;

        let sender = Peer::new();
        let destination = Peer::new();
        let destination_addr = HopAddr(3001);
        let (tx, mut rx) = mpsc::unbounded();
        let forwarder = ChannelForwarder { tx };

        sender
            .send_message(&mut rng, &forwarder, &TestAddrBook, &directory, destination_addr, "hello")
            .await
            .unwrap();

        // pump the overlay: each relay peels one layer and forwards
        let (mut addr, mut message) = rx.next().await.unwrap();
        for _ in 0..3 {
            let (_, relay) = relays
                .iter()
                .find(|(node_id, _)| TestAddrBook.relay_addr(*node_id) == addr)
                .unwrap();
            relay.handle_message(&forwarder, &message).await.unwrap();
            let forwarded = rx.next().await.unwrap();
            addr = forwarded.0;
            message = forwarded.1;
        }

        assert_eq!(addr, destination_addr);
        destination.receive(&message).await;
        assert_eq!(
            destination.diagnostics().await.last_received_message,
            Some("hello".to_owned())
        );

        let diagnostics = sender.diagnostics().await;
        assert_eq!(diagnostics.last_sent_message, Some("hello".to_owned()));
        let circuit = diagnostics.last_circuit.unwrap();
        assert_eq!(circuit.len(), 3);
        assert!(circuit.iter().all(|node_id| (1..=3).contains(node_id)));
    }

    #[tokio::test]
    async fn send_message_insufficient_nodes() {
        let mut rng = StdRng::from_entropy();
        let registry = Registry::new();
        let relay = Relay::new(&mut rng);
        registry.register(1, relay.exported_public_key()).await.unwrap();
        let directory = registry.snapshot().await;

        let sender = Peer::new();
        let (tx, _rx) = mpsc::unbounded();
        let forwarder = ChannelForwarder { tx };
        let result = sender
            .send_message(&mut rng, &forwarder, &TestAddrBook, &directory, HopAddr(3001), "hello")
            .await;
        assert_eq!(
            result,
            Err(SendError::PickCircuit(PickCircuitError::InsufficientNodes {
                required: 3,
                available: 1,
            }))
        );
        assert_eq!(sender.diagnostics().await.last_sent_message, None);
    }

    #[tokio::test]
    async fn send_message_first_hop_unreachable() {
        let mut rng = StdRng::from_entropy();
        let registry = Registry::new();
        registered_relays(&registry).await;
        let directory = registry.snapshot().await;

        let sender = Peer::new();
        let result = sender
            .send_message(&mut rng, &FailingForwarder, &TestAddrBook, &directory, HopAddr(3001), "hello")
            .await;
        assert!(matches!(result, Err(SendError::Forward(ForwardError::Unreachable(_)))));

        // nothing was sent, so nothing is recorded
        let diagnostics = sender.diagnostics().await;
        assert_eq!(diagnostics.last_sent_message, None);
        assert_eq!(diagnostics.last_circuit, None);
    }

    #[tokio::test]
    async fn receive_overwrites_last_message() {
        let peer = Peer::new();
        peer.receive("first").await;
        peer.receive("second").await;
        assert_eq!(
            peer.diagnostics().await.last_received_message,
            Some("second".to_owned())
        );
    }
}
