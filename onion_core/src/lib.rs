/*! The core of the onion overlay.

A sender picks a circuit of 3 distinct relays from the registry
directory, wraps its message in one encryption layer per relay and hands
the envelope to the first relay. Each relay strips exactly one layer,
learns only the next hop's address and forwards the remainder; the exit
relay delivers plaintext to the destination peer.
*/

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

pub mod circuit;
pub mod forward;
pub mod onion;
pub mod peer;
pub mod registry;
