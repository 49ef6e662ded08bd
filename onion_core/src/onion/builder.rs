/*! Envelope construction at the sender.
*/

use rand::{CryptoRng, Rng};
use thiserror::Error;

use onion_crypto::{encode_text, encrypt_symmetric, generate_symmetric_key, seal, CryptoError, PublicKey};
use onion_packet::{Envelope, HopAddr, PeeledLayer};

use crate::circuit::CIRCUIT_LENGTH;

/// One hop of a circuit as the builder needs it: the relay's long-lived
/// public key and its resolved network address.
#[derive(Clone, Debug)]
pub struct OnionHop {
    /// The relay's long-lived `PublicKey` from the directory.
    pub public_key: PublicKey,
    /// The relay's resolved network address.
    pub addr: HopAddr,
}

/// Error that can happen when building an envelope.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BuildError {
    /// Sealing a per-hop symmetric key failed.
    #[error("Failed to seal a layer key: {0}")]
    Seal(CryptoError),
}

/** Build the wire envelope for `plaintext` along the given circuit.

Layers are built in reverse circuit order, exit relay first, so the
outermost layer is encrypted for the first relay. The layer built for
the relay at position `i` embeds the address of the relay at `i + 1`;
the exit layer embeds `destination`. The returned envelope is the one to
deliver to the first relay's address.
*/
pub fn build_onion<R: Rng + CryptoRng>(
    rng: &mut R,
    plaintext: &str,
    destination: HopAddr,
    hops: &[OnionHop; CIRCUIT_LENGTH],
) -> Result<Envelope, BuildError> {
    let envelope = wrap_layer(rng, plaintext, destination, &hops[2])?;
    let envelope = wrap_layer(rng, &envelope.to_text(), hops[2].addr, &hops[1])?;
    wrap_layer(rng, &envelope.to_text(), hops[1].addr, &hops[0])
}

/// Wrap `inner` in one layer encrypted for `hop`, embedding the address
/// the relay must forward the remainder to.
fn wrap_layer<R: Rng + CryptoRng>(
    rng: &mut R,
    inner: &str,
    forward_to: HopAddr,
    hop: &OnionHop,
) -> Result<Envelope, BuildError> {
    let key = generate_symmetric_key(rng);
    let layer = PeeledLayer {
        inner: inner.to_owned(),
        next_hop: forward_to,
    };
    let payload = encrypt_symmetric(rng, &key, layer.to_plain().as_bytes());
    let sealed = seal(rng, key.as_slice(), &hop.public_key).map_err(BuildError::Seal)?;
    Ok(Envelope {
        key_field: encode_text(&sealed),
        payload: encode_text(&payload),
    })
}
