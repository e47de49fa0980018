//! Live connection registry
//!
//! Maintains global state for all WebSocket connections and topic rooms.
//! This is the registry the team service queries for subscribers and the
//! transport it publishes through.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::room::{ActiveSubscription, TopicRooms};

/// Global WebSocket state shared across all connections
#[derive(Clone)]
pub struct WebSocketState {
    /// All active connections indexed by session_id
    pub connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    /// Topic rooms for publishing
    pub rooms: Arc<TopicRooms>,
}

impl WebSocketState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(TopicRooms::new()),
        }
    }

    /// Add a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.session_id, Arc::clone(&conn));

        tracing::info!(
            session_id = %conn.session_id,
            login = %conn.login,
            total_connections = connections.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Remove a connection
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.remove(session_id) {
            // Also remove from all rooms
            self.rooms.remove_connection(session_id).await;

            tracing::info!(
                session_id = %session_id,
                login = %conn.login,
                remaining_connections = connections.len(),
                "WebSocket connection removed"
            );
        }
    }

    /// Subscribe a connection to a topic
    pub async fn subscribe(&self, conn: &Arc<Connection>, topic: &str) {
        conn.subscribe(topic).await;
        self.rooms.join(topic, Arc::clone(conn)).await;
    }

    /// Unsubscribe a connection from a topic, returning false if it was not subscribed
    pub async fn unsubscribe(&self, conn: &Connection, topic: &str) -> bool {
        let was_subscribed = conn.unsubscribe(topic).await;
        self.rooms.leave(topic, &conn.session_id).await;
        was_subscribed
    }

    /// Publish a payload to every subscriber of `topic`
    pub async fn publish(&self, topic: &str, payload: serde_json::Value) -> usize {
        self.rooms.publish(topic, payload).await
    }

    /// Every live (session, topic, login) subscription
    pub async fn list_active_subscriptions(&self) -> Vec<ActiveSubscription> {
        self.rooms.list_active_subscriptions().await
    }

    /// Get total number of active connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Get statistics about the WebSocket state
    pub async fn get_stats(&self) -> WebSocketStats {
        let connection_count = self.connection_count().await;
        let room_count = self.rooms.get_room_count().await;

        WebSocketStats {
            active_connections: connection_count,
            active_topics: room_count,
        }
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about WebSocket connections
#[derive(Debug, Clone)]
pub struct WebSocketStats {
    /// Number of active connections
    pub active_connections: usize,
    /// Number of topics with at least one subscriber
    pub active_topics: usize,
}
