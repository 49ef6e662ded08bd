//! HTTP surface of a destination/sender peer.

use std::sync::Arc;

use anyhow::Error;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};

use onion_core::peer::Peer;
use onion_packet::{DirectoryBody, MessageBody, NodeId, ResultBody, SendMessageBody};

use crate::config::NodeConfig;
use crate::forward::HttpForwarder;

struct PeerState {
    peer: Peer,
    forwarder: HttpForwarder,
    config: NodeConfig,
    client: reqwest::Client,
}

pub async fn run(config: NodeConfig, id: NodeId) -> Result<(), Error> {
    let addr = format!("127.0.0.1:{}", config.peer_addr(id));
    let state = Arc::new(PeerState {
        peer: Peer::new(),
        forwarder: HttpForwarder::new(),
        config,
        client: reqwest::Client::new(),
    });
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Peer {} is listening on {}", id, addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: Arc<PeerState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/message", post(message))
        .route("/sendMessage", post(send_message))
        .route("/getLastReceivedMessage", get(last_received_message))
        .route("/getLastSentMessage", get(last_sent_message))
        .route("/getLastCircuit", get(last_circuit))
        .with_state(state)
}

async fn status() -> &'static str {
    "live"
}

async fn message(
    State(state): State<Arc<PeerState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let body: MessageBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Message is required" })),
            )
        }
    };
    state.peer.receive(&body.message).await;
    (
        StatusCode::OK,
        Json(json!({ "message": "Message received successfully" })),
    )
}

async fn send_message(
    State(state): State<Arc<PeerState>>,
    Json(body): Json<SendMessageBody>,
) -> impl IntoResponse {
    let directory = match fetch_directory(&state).await {
        Ok(directory) => directory,
        Err(e) => {
            warn!("Failed to fetch the node directory: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch the node directory" })),
            );
        }
    };

    let destination = state.config.peer_addr(body.destination_user_id);
    let mut rng = StdRng::from_entropy();
    let result = state
        .peer
        .send_message(
            &mut rng,
            &state.forwarder,
            &state.config,
            &directory.nodes,
            destination,
            &body.message,
        )
        .await;
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Message sent successfully" })),
        ),
        Err(e) => {
            warn!("Failed to send a message: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn fetch_directory(state: &PeerState) -> Result<DirectoryBody, reqwest::Error> {
    let url = format!("{}/getNodeRegistry", state.config.registry_url());
    state
        .client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

async fn last_received_message(
    State(state): State<Arc<PeerState>>,
) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: state.peer.diagnostics().await.last_received_message,
    })
}

async fn last_sent_message(
    State(state): State<Arc<PeerState>>,
) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody {
        result: state.peer.diagnostics().await.last_sent_message,
    })
}

async fn last_circuit(
    State(state): State<Arc<PeerState>>,
) -> Json<ResultBody<Option<Vec<NodeId>>>> {
    Json(ResultBody {
        result: state.peer.diagnostics().await.last_circuit,
    })
}
