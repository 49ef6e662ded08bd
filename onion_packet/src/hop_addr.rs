/*! Fixed-width hop address encoding.
*/

use std::fmt;

use thiserror::Error;

/// Width in characters of the hop address field embedded in every
/// decrypted envelope layer. Zero-padded decimal, wide enough for the
/// full `u32` range.
pub const HOP_FIELD_WIDTH: usize = 10;

/// Error that can happen when decoding a hop address field.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ParseHopAddrError {
    /// Field is not `HOP_FIELD_WIDTH` decimal digits.
    #[error("Hop field is not {HOP_FIELD_WIDTH} decimal digits")]
    NotDecimal,
    /// Field decodes to a number outside the address range.
    #[error("Hop field is out of the address range")]
    OutOfRange,
}

/** Opaque network address of an overlay participant.

How a participant id maps to an address is configuration; the protocol
only ever encodes and decodes addresses through the fixed-width field.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct HopAddr(pub u32);

impl HopAddr {
    /// Encode as the fixed-width field embedded in an envelope layer.
    pub fn encode(self) -> String {
        format!("{:0width$}", self.0, width = HOP_FIELD_WIDTH)
    }

    /// Decode a fixed-width field produced by [`HopAddr::encode`].
    pub fn from_field(field: &str) -> Result<HopAddr, ParseHopAddrError> {
        if field.len() != HOP_FIELD_WIDTH || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseHopAddrError::NotDecimal);
        }
        field
            .parse::<u32>()
            .map(HopAddr)
            .map_err(|_| ParseHopAddrError::OutOfRange)
    }
}

impl fmt::Display for HopAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
