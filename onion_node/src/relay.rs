//! HTTP surface of an onion relay.

use std::sync::Arc;

use anyhow::{Context, Error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use onion_core::onion::Relay;
use onion_packet::{MessageBody, NodeEntry, NodeId, ResultBody};

use crate::config::NodeConfig;
use crate::forward::HttpForwarder;

struct RelayState {
    relay: Relay,
    forwarder: HttpForwarder,
}

pub async fn run(config: NodeConfig, id: NodeId) -> Result<(), Error> {
    let relay = Relay::new(&mut StdRng::from_entropy());
    register_with_registry(&config, id, &relay).await?;

    let state = Arc::new(RelayState {
        relay,
        forwarder: HttpForwarder::new(),
    });
    let addr = format!("127.0.0.1:{}", config.relay_addr(id));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Onion relay {} is listening on {}", id, addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Share the public half of the relay identity with the registry.
async fn register_with_registry(
    config: &NodeConfig,
    id: NodeId,
    relay: &Relay,
) -> Result<(), Error> {
    let body = NodeEntry {
        node_id: id,
        pub_key: relay.exported_public_key(),
    };
    let url = format!("{}/registerNode", config.registry_url());
    let response = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to reach the registry at {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("Registry rejected registration with status {}", response.status());
    }
    info!("Relay {} registered with the registry", id);
    Ok(())
}

fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/message", post(message))
        .route("/getLastReceivedEncryptedMessage", get(last_received_encrypted))
        .route("/getLastReceivedDecryptedMessage", get(last_received_decrypted))
        .route("/getLastMessageDestination", get(last_message_destination))
        .route("/getPrivateKey", get(private_key))
        .with_state(state)
}

async fn status() -> &'static str {
    "live"
}

async fn message(
    State(state): State<Arc<RelayState>>,
    Json(body): Json<MessageBody>,
) -> impl IntoResponse {
    match state.relay.handle_message(&state.forwarder, &body.message).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Message forwarded successfully" })),
        ),
        Err(e) => {
            warn!("Failed to process an envelope: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn last_received_encrypted(
    State(state): State<Arc<RelayState>>,
) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: state.relay.diagnostics().await.last_received_encrypted,
    })
}

async fn last_received_decrypted(
    State(state): State<Arc<RelayState>>,
) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: state.relay.diagnostics().await.last_received_decrypted,
    })
}

async fn last_message_destination(
    State(state): State<Arc<RelayState>>,
) -> Json<ResultBody<Option<u32>>> {
    Json(ResultBody {
        result: state
            .relay
            .diagnostics()
            .await
            .last_destination
            .map(|addr| addr.0),
    })
}

async fn private_key(State(state): State<Arc<RelayState>>) -> Json<ResultBody<String>> {
    Json(ResultBody {
        result: state.relay.exported_secret_key(),
    })
}
