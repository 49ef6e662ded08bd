/*! JSON bodies of the HTTP boundary.

Field names are part of the boundary contract (`nodeId`, `pubKey`,
`message`, `result`), hence the camelCase renames.
*/

use serde::{Deserialize, Serialize};

/// Stable integer identity of a participant.
pub type NodeId = u32;

/// A relay's registry entry. Also the body of a `POST /registerNode`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEntry {
    /// Stable integer identity of the relay.
    pub node_id: NodeId,
    /// Exported long-lived public key, text-encoded.
    pub pub_key: String,
}

/// Body of a `GET /getNodeRegistry` response: the current directory.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DirectoryBody {
    pub nodes: Vec<NodeEntry>,
}

/// Body of a `POST /message`: one envelope, or final plaintext at the
/// destination peer. The receiver cannot tell which.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Body of a `POST /sendMessage` at a sender peer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub message: String,
    pub destination_user_id: NodeId,
}

/// Body of every diagnostic getter response.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResultBody<T> {
    pub result: T,
}
