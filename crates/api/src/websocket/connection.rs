//! WebSocket connection management
//!
//! Represents an active WebSocket connection with subscription tracking.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::events::ServerEvent;

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID for this connection
    pub session_id: Uuid,

    /// Login of the authenticated user
    pub login: String,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// Topics this connection is subscribed to
    pub subscriptions: Arc<RwLock<HashSet<String>>>,
}

impl Connection {
    /// Create a new connection
    pub fn new(login: impl Into<String>, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            login: login.into(),
            sender,
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if sent successfully, Err if connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    /// Subscribe to a topic, returning false if already subscribed
    pub async fn subscribe(&self, topic: &str) -> bool {
        let mut subs = self.subscriptions.write().await;
        let added = subs.insert(topic.to_string());
        tracing::debug!(
            session_id = %self.session_id,
            topic = %topic,
            added,
            "Subscribed to topic"
        );
        added
    }

    /// Unsubscribe from a topic, returning false if not subscribed
    pub async fn unsubscribe(&self, topic: &str) -> bool {
        let mut subs = self.subscriptions.write().await;
        let removed = subs.remove(topic);
        tracing::debug!(
            session_id = %self.session_id,
            topic = %topic,
            removed,
            "Unsubscribed from topic"
        );
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "/topic/participations/1/team";
    const RELAY: &str = "/topic/participations/1/team/text-submissions";

    #[tokio::test]
    async fn test_connection_subscription() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Connection::new("alice", tx);

        assert!(conn.subscribe(TOPIC).await);

        // Duplicate subscribe is reported
        assert!(!conn.subscribe(TOPIC).await);

        assert!(conn.unsubscribe(TOPIC).await);
        assert!(!conn.unsubscribe(TOPIC).await);
    }

    #[tokio::test]
    async fn test_multiple_subscriptions() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Connection::new("alice", tx);

        conn.subscribe(TOPIC).await;
        conn.subscribe(RELAY).await;
        assert_eq!(conn.subscriptions.read().await.len(), 2);

        // Leaving one topic keeps the other
        assert!(conn.unsubscribe(TOPIC).await);
        assert!(conn.subscriptions.read().await.contains(RELAY));
    }
}
