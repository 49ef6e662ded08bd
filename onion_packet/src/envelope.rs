/*! The onion envelope and its positional framing.
*/

use nom::bytes::complete::take;
use nom::combinator::{rest, verify};
use nom::IResult;
use thiserror::Error;

use onion_crypto::SEALED_BLOCK_SIZE;

use crate::hop_addr::{HopAddr, ParseHopAddrError, HOP_FIELD_WIDTH};

/// Length in characters of the text-encoded sealed key field. Derived
/// from `SEALED_BLOCK_SIZE` through the base64 expansion, so builder and
/// peeler agree on it byte for byte.
pub const ENCRYPTED_KEY_LENGTH: usize = (SEALED_BLOCK_SIZE + 2) / 3 * 4; // 140

/// Error that can happen when slicing an envelope.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ParseEnvelopeError {
    /// Input ends before the sealed key field and a non-empty payload.
    #[error("Envelope is shorter than {} characters", ENCRYPTED_KEY_LENGTH + 1)]
    Truncated,
    /// A field contains characters outside the text codec alphabet.
    #[error("Envelope field is not base64 text")]
    BadField,
}

fn is_base64_text(text: &str) -> bool {
    text.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

/** One layer of the onion envelope, as transmitted hop to hop.

Serialized form (text):

Length     | Content
--------   | ------
`140`      | base64 sealed symmetric key for the receiving relay
variable   | base64 of nonce ‖ symmetric ciphertext of the inner layer

There are no delimiters; the receiving relay slices the opaque string at
`ENCRYPTED_KEY_LENGTH`. Decrypting the payload yields a [`PeeledLayer`].
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Envelope {
    /// Per-hop symmetric key sealed under the relay's public key,
    /// text-encoded to the fixed protocol length.
    pub key_field: String,
    /// Symmetric ciphertext of the inner layer, text-encoded.
    pub payload: String,
}

impl Envelope {
    fn parse(input: &str) -> IResult<&str, Envelope> {
        let (input, key_field) = verify(take(ENCRYPTED_KEY_LENGTH), is_base64_text)(input)?;
        let (input, payload) = verify(rest, |payload: &str| is_base64_text(payload))(input)?;
        Ok((
            input,
            Envelope {
                key_field: key_field.to_owned(),
                payload: payload.to_owned(),
            },
        ))
    }

    /// Slice an opaque transmitted string into its fields.
    pub fn from_text(text: &str) -> Result<Envelope, ParseEnvelopeError> {
        if text.len() <= ENCRYPTED_KEY_LENGTH {
            return Err(ParseEnvelopeError::Truncated);
        }
        match Envelope::parse(text) {
            Ok((_, envelope)) => Ok(envelope),
            Err(_) => Err(ParseEnvelopeError::BadField),
        }
    }

    /// The opaque string transmitted to the next hop.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.key_field.len() + self.payload.len());
        text.push_str(&self.key_field);
        text.push_str(&self.payload);
        text
    }
}

/// Error that can happen when splitting a decrypted layer.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ParseLayerError {
    /// Decrypted layer is shorter than the hop field.
    #[error("Decrypted layer is shorter than {HOP_FIELD_WIDTH} bytes")]
    Truncated,
    /// Trailing hop field does not decode to an address.
    #[error("Invalid hop field: {0}")]
    HopField(ParseHopAddrError),
    /// Remaining payload is not valid text.
    #[error("Remaining payload is not valid UTF-8")]
    Utf8,
}

/** One decrypted envelope layer: the payload to forward and where to.

Serialized form (the plaintext a relay recovers, and the builder
encrypts):

Length     | Content
--------   | ------
variable   | Remaining payload: the next envelope, or final plaintext
`10`       | Fixed-width address of the next hop

The relay cannot structurally tell an inner envelope from final
plaintext; it always forwards the remaining payload as-is.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeeledLayer {
    /// Remaining payload after this layer is removed.
    pub inner: String,
    /// Address this relay must forward the remaining payload to.
    pub next_hop: HopAddr,
}

impl PeeledLayer {
    /// Split a decrypted layer into remaining payload and next hop.
    pub fn from_plain(plain: &[u8]) -> Result<PeeledLayer, ParseLayerError> {
        if plain.len() < HOP_FIELD_WIDTH {
            return Err(ParseLayerError::Truncated);
        }
        let (inner, hop_field) = plain.split_at(plain.len() - HOP_FIELD_WIDTH);
        let hop_field = std::str::from_utf8(hop_field).map_err(|_| ParseLayerError::Utf8)?;
        let next_hop = HopAddr::from_field(hop_field).map_err(ParseLayerError::HopField)?;
        let inner = std::str::from_utf8(inner).map_err(|_| ParseLayerError::Utf8)?;
        Ok(PeeledLayer {
            inner: inner.to_owned(),
            next_hop,
        })
    }

    /// The plaintext form a builder encrypts into a layer.
    pub fn to_plain(&self) -> String {
        let mut plain = String::with_capacity(self.inner.len() + HOP_FIELD_WIDTH);
        plain.push_str(&self.inner);
        plain.push_str(&self.next_hop.encode());
        plain
    }
}
