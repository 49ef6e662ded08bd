/*! The per-relay peel-and-forward pipeline.
*/

use rand::{CryptoRng, Rng};
use thiserror::Error;
use tokio::sync::RwLock;

use onion_crypto::{
    decode_text, decrypt_symmetric, encode_text, export_public_key, symmetric_key_from_bytes,
    unseal, CryptoError, PublicKey, SecretKey,
};
use onion_packet::{Envelope, HopAddr, ParseEnvelopeError, ParseLayerError, PeeledLayer};

use crate::forward::{ForwardError, Forwarder};

/// Error that can happen when processing an inbound envelope.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PeelError {
    /// Envelope cannot be sliced into its fixed fields.
    #[error("Malformed envelope: {0}")]
    Envelope(ParseEnvelopeError),
    /// Key field or payload cannot be decrypted: wrong key, tampered
    /// ciphertext, or an envelope not intended for this relay.
    #[error("Decryption error: {0}")]
    Decrypt(CryptoError),
    /// Decrypted layer has no valid trailing hop field.
    #[error("Malformed decrypted layer: {0}")]
    Layer(ParseLayerError),
    /// Next-hop delivery failed. The layer itself was peeled
    /// successfully and the diagnostics reflect it.
    #[error("Forward error: {0}")]
    Forward(ForwardError),
}

/// Last-observed fields of a relay, exposed for external inspection.
/// Overwritten without synchronization across requests beyond the lock
/// itself: last writer wins, which is acceptable for inspection-only
/// state.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RelayDiagnostics {
    /// Last envelope received, as transmitted.
    pub last_received_encrypted: Option<String>,
    /// Last decrypted layer, remaining payload plus hop field.
    pub last_received_decrypted: Option<String>,
    /// Last resolved next-hop address.
    pub last_destination: Option<HopAddr>,
}

/** One relay of the overlay.

Owns the relay's long-lived key pair and its diagnostic fields, nothing
else: each inbound envelope is processed independently, there is no
circuit or session table. One `Relay` instance per relay process, so
multiple relays can run in one test process without cross-contamination.
*/
pub struct Relay {
    /// Secret half of the long-lived identity, never shared.
    secret_key: SecretKey,
    /// Public half, shared with the registry.
    public_key: PublicKey,
    /// Last-observed diagnostic fields.
    diagnostics: RwLock<RelayDiagnostics>,
}

impl Relay {
    /// Create a new `Relay` with a freshly generated key pair.
    pub fn new<R: Rng + CryptoRng>(rng: &mut R) -> Relay {
        Relay::from_secret_key(SecretKey::generate(rng))
    }

    /// Create a `Relay` from an existing secret key.
    pub fn from_secret_key(secret_key: SecretKey) -> Relay {
        let public_key = secret_key.public_key();
        Relay {
            secret_key,
            public_key,
            diagnostics: RwLock::default(),
        }
    }

    /// Long-lived `PublicKey` of this relay.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Public key in the form the registry stores.
    pub fn exported_public_key(&self) -> String {
        export_public_key(&self.public_key)
    }

    /// Secret key in exported text form.
    pub fn exported_secret_key(&self) -> String {
        encode_text(&self.secret_key.to_bytes())
    }

    /// Snapshot of the last-observed diagnostic fields.
    pub async fn diagnostics(&self) -> RelayDiagnostics {
        self.diagnostics.read().await.clone()
    }

    /** Strip exactly one layer from an envelope.

    Recovers the per-hop symmetric key from the sealed key field using
    this relay's secret key, decrypts the payload with it and splits off
    the trailing hop field. Pure with respect to relay state.
    */
    pub fn peel(&self, envelope_text: &str) -> Result<PeeledLayer, PeelError> {
        let envelope = Envelope::from_text(envelope_text).map_err(PeelError::Envelope)?;
        let sealed = decode_text(&envelope.key_field).map_err(PeelError::Decrypt)?;
        let key_material = unseal(&sealed, &self.secret_key).map_err(PeelError::Decrypt)?;
        let key = symmetric_key_from_bytes(&key_material).map_err(PeelError::Decrypt)?;
        let payload = decode_text(&envelope.payload).map_err(PeelError::Decrypt)?;
        let plain = decrypt_symmetric(&key, &payload).map_err(PeelError::Decrypt)?;
        PeeledLayer::from_plain(&plain).map_err(PeelError::Layer)
    }

    /** Process one inbound envelope: peel, record, forward.

    The remaining payload is forwarded as-is to the resolved address;
    the relay cannot tell whether it is another envelope or final
    plaintext. Forwarding is attempted exactly once; on failure the
    diagnostics still reflect the successfully peeled layer.
    */
    pub async fn handle_message<F: Forwarder>(
        &self,
        forwarder: &F,
        message: &str,
    ) -> Result<(), PeelError> {
        self.diagnostics.write().await.last_received_encrypted = Some(message.to_owned());

        let layer = self.peel(message)?;
        debug!("Peeled one layer, forwarding to {}", layer.next_hop);
        {
            let mut diagnostics = self.diagnostics.write().await;
            diagnostics.last_received_decrypted = Some(layer.to_plain());
            diagnostics.last_destination = Some(layer.next_hop);
        }
        forwarder
            .forward(layer.next_hop, layer.inner)
            .await
            .map_err(PeelError::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CIRCUIT_LENGTH;
    use crate::forward::test_forwarders::{ChannelForwarder, FailingForwarder};
    use crate::onion::{build_onion, OnionHop};
    use futures::channel::mpsc;
    use futures::StreamExt;
    use rand::thread_rng;

    fn test_circuit() -> ([Relay; CIRCUIT_LENGTH], [OnionHop; CIRCUIT_LENGTH]) {
        let mut rng = thread_rng();
        let relays = [
            Relay::new(&mut rng),
            Relay::new(&mut rng),
            Relay::new(&mut rng),
        ];
        let hops = [
            OnionHop { public_key: relays[0].public_key().clone(), addr: HopAddr(4001) },
            OnionHop { public_key: relays[1].public_key().clone(), addr: HopAddr(4002) },
            OnionHop { public_key: relays[2].public_key().clone(), addr: HopAddr(4003) },
        ];
        (relays, hops)
    }

    #[test]
    fn peel_round_trip() {
        let mut rng = thread_rng();
        let (relays, hops) = test_circuit();
        let destination = HopAddr(3001);
        let envelope = build_onion(&mut rng, "hello", destination, &hops).unwrap();

        let layer = relays[0].peel(&envelope.to_text()).unwrap();
        assert_eq!(layer.next_hop, HopAddr(4002));
        let layer = relays[1].peel(&layer.inner).unwrap();
        assert_eq!(layer.next_hop, HopAddr(4003));
        let layer = relays[2].peel(&layer.inner).unwrap();
        assert_eq!(layer.next_hop, destination);
        assert_eq!(layer.inner, "hello");
    }

    #[test]
    fn peel_wrong_key() {
        let mut rng = thread_rng();
        let (_, hops) = test_circuit();
        let envelope = build_onion(&mut rng, "hello", HopAddr(3001), &hops).unwrap();

        // a relay that is not part of the circuit
        let stranger = Relay::new(&mut rng);
        assert_eq!(
            stranger.peel(&envelope.to_text()),
            Err(PeelError::Decrypt(CryptoError::Decrypt))
        );
    }

    #[test]
    fn peel_out_of_order() {
        // the second relay cannot open the outer layer built for the first
        let mut rng = thread_rng();
        let (relays, hops) = test_circuit();
        let envelope = build_onion(&mut rng, "hello", HopAddr(3001), &hops).unwrap();
        assert_eq!(
            relays[1].peel(&envelope.to_text()),
            Err(PeelError::Decrypt(CryptoError::Decrypt))
        );
    }

    #[test]
    fn peel_malformed_envelope() {
        let relay = Relay::new(&mut thread_rng());
        assert_eq!(
            relay.peel("too short"),
            Err(PeelError::Envelope(ParseEnvelopeError::Truncated))
        );
    }

    #[tokio::test]
    async fn handle_message_forwards_inner() {
        let mut rng = thread_rng();
        let (relays, hops) = test_circuit();
        let envelope = build_onion(&mut rng, "hello", HopAddr(3001), &hops).unwrap();

        let (tx, mut rx) = mpsc::unbounded();
        let forwarder = ChannelForwarder { tx };
        relays[0]
            .handle_message(&forwarder, &envelope.to_text())
            .await
            .unwrap();

        let (addr, message) = rx.next().await.unwrap();
        assert_eq!(addr, HopAddr(4002));
        let layer = relays[1].peel(&message).unwrap();
        assert_eq!(layer.next_hop, HopAddr(4003));

        let diagnostics = relays[0].diagnostics().await;
        assert_eq!(diagnostics.last_received_encrypted, Some(envelope.to_text()));
        assert_eq!(diagnostics.last_destination, Some(HopAddr(4002)));
    }

    #[tokio::test]
    async fn handle_message_forward_failure_keeps_diagnostics() {
        let mut rng = thread_rng();
        let (relays, hops) = test_circuit();
        let envelope = build_onion(&mut rng, "hello", HopAddr(3001), &hops).unwrap();

        let result = relays[0]
            .handle_message(&FailingForwarder, &envelope.to_text())
            .await;
        assert_eq!(
            result,
            Err(PeelError::Forward(ForwardError::Unreachable(HopAddr(4002))))
        );

        // peeling succeeded, only forwarding failed
        let diagnostics = relays[0].diagnostics().await;
        assert!(diagnostics.last_received_decrypted.is_some());
        assert_eq!(diagnostics.last_destination, Some(HopAddr(4002)));
    }

    #[tokio::test]
    async fn handle_message_decrypt_failure_records_received() {
        let mut rng = thread_rng();
        let (relays, hops) = test_circuit();
        let envelope = build_onion(&mut rng, "hello", HopAddr(3001), &hops).unwrap();

        let (tx, _rx) = mpsc::unbounded();
        let forwarder = ChannelForwarder { tx };
        let result = relays[1]
            .handle_message(&forwarder, &envelope.to_text())
            .await;
        assert_eq!(result, Err(PeelError::Decrypt(CryptoError::Decrypt)));

        let diagnostics = relays[1].diagnostics().await;
        assert_eq!(diagnostics.last_received_encrypted, Some(envelope.to_text()));
        assert_eq!(diagnostics.last_received_decrypted, None);
        assert_eq!(diagnostics.last_destination, None);
    }
}
