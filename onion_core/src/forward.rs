/*! The forwarding seam between protocol logic and the transport.
*/

use futures::future::BoxFuture;
use thiserror::Error;

use onion_packet::HopAddr;

/// Error that can happen when delivering a payload to the next hop.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ForwardError {
    /// Next hop could not be reached.
    #[error("Next hop {0} is unreachable")]
    Unreachable(HopAddr),
    /// Next hop answered with a failure status.
    #[error("Next hop {addr} rejected the payload with status {status}")]
    Rejected {
        /// Address of the rejecting hop.
        addr: HopAddr,
        /// Status it answered with.
        status: u16,
    },
}

/** Delivers a payload to a named next hop.

Delivery is attempted exactly once per payload: no retry, no queueing,
no dead-letter. A failure is terminal for that message and is reported
to the caller of the hop that observed it.
*/
pub trait Forwarder: Sync {
    /// Deliver `message` to the participant at `addr`.
    fn forward(&self, addr: HopAddr, message: String) -> BoxFuture<'_, Result<(), ForwardError>>;
}
