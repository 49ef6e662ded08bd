//! HTTP delivery to the next hop.

use futures::future::BoxFuture;

use onion_core::forward::{ForwardError, Forwarder};
use onion_packet::{HopAddr, MessageBody};

/// Forwards payloads to the next hop with a `POST /message`. One attempt
/// per payload; the HTTP client's defaults are the only timeout policy.
#[derive(Clone, Debug, Default)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    /// Create a new `HttpForwarder` with its own connection pool.
    pub fn new() -> HttpForwarder {
        HttpForwarder::default()
    }
}

impl Forwarder for HttpForwarder {
    fn forward(&self, addr: HopAddr, message: String) -> BoxFuture<'_, Result<(), ForwardError>> {
        Box::pin(async move {
            let url = format!("http://127.0.0.1:{}/message", addr);
            let response = self
                .client
                .post(&url)
                .json(&MessageBody { message })
                .send()
                .await
                .map_err(|_| ForwardError::Unreachable(addr))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(ForwardError::Rejected {
                    addr,
                    status: response.status().as_u16(),
                })
            }
        })
    }
}
