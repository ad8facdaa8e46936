use crate::state::Location;
use crate::supervisor::ConnectionStatus;
use serde::{Deserialize, Serialize};

/// Client → Server message types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Manual resync
    #[serde(rename = "refresh")]
    Refresh,
}

/// Server → Client message types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full current location set
    #[serde(rename = "snapshot")]
    Snapshot { locations: Vec<Location> },

    /// Connection status change ("Connected", "Reconnecting", "Disconnected")
    #[serde(rename = "status")]
    Status { status: ConnectionStatus },

    #[serde(rename = "error")]
    Error { error: String },
}
