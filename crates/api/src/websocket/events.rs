//! WebSocket event types and serialization
//!
//! Defines all client-to-server and server-to-client frames with type-safe
//! serde serialization. Routing is destination based: clients subscribe to
//! topics and send payloads to destinations, the server pushes messages
//! tagged with the topic they were published on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a topic
    Subscribe { destination: String },

    /// Unsubscribe from a topic
    Unsubscribe { destination: String },

    /// Send a message to a destination
    Send {
        destination: String,
        #[serde(default)]
        payload: serde_json::Value,
    },

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Message published on a topic the connection subscribed to
    Message {
        destination: String,
        payload: serde_json::Value,
    },

    /// Heartbeat response
    Pong,

    /// Error message
    Error { message: String },

    /// Connection acknowledged
    Connected { session_id: Uuid },
}
