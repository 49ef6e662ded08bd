/*! Wire formats of the onion overlay.

Two kinds of format live here:

- the envelope transmitted hop to hop: an opaque text string with
  positional field boundaries, sliced using the protocol constants
  `ENCRYPTED_KEY_LENGTH` and `HOP_FIELD_WIDTH`;
- the JSON bodies of the HTTP boundary (registration, directory,
  message delivery, diagnostics).
*/

#![forbid(unsafe_code)]

mod envelope;
mod hop_addr;
mod wire;

pub use self::envelope::*;
pub use self::hop_addr::*;
pub use self::wire::*;
