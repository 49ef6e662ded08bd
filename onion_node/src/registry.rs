//! HTTP surface of the node registry.

use std::sync::Arc;

use anyhow::Error;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use onion_core::registry::Registry;
use onion_packet::{DirectoryBody, NodeEntry};

use crate::config::NodeConfig;

pub async fn run(config: NodeConfig) -> Result<(), Error> {
    let registry = Arc::new(Registry::new());
    let addr = format!("127.0.0.1:{}", config.registry_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Registry is listening on {}", addr);
    axum::serve(listener, router(registry)).await?;
    Ok(())
}

fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/registerNode", post(register_node))
        .route("/getNodeRegistry", get(get_node_registry))
        .with_state(registry)
}

async fn status() -> &'static str {
    "live"
}

async fn register_node(
    State(registry): State<Arc<Registry>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    // validated by hand so a missing field is a 400, not an extractor
    // rejection
    let entry: NodeEntry = match serde_json::from_value(body) {
        Ok(entry) => entry,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request: nodeId and pubKey are required" })),
            )
        }
    };
    match registry.register(entry.node_id, entry.pub_key).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Node registered successfully" })),
        ),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))),
    }
}

async fn get_node_registry(State(registry): State<Arc<Registry>>) -> Json<DirectoryBody> {
    Json(DirectoryBody {
        nodes: registry.snapshot().await,
    })
}
