//! Topic room management for pub/sub
//!
//! Every topic with at least one subscriber has a "room" holding the
//! subscribed connections. Publishing to a topic pushes to its room.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;

/// One live subscription as seen by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    pub session_id: Uuid,
    pub topic: String,
    pub login: String,
}

/// Manages topic "rooms" for broadcasting events
pub struct TopicRooms {
    /// Map of topic -> list of connections
    rooms: Arc<RwLock<HashMap<String, Vec<Arc<Connection>>>>>,
}

impl TopicRooms {
    /// Create a new room manager
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to a topic room; joining twice is a no-op
    pub async fn join(&self, topic: &str, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let conns = rooms.entry(topic.to_string()).or_default();
        if !conns.iter().any(|c| c.session_id == conn.session_id) {
            conns.push(Arc::clone(&conn));
        }

        tracing::debug!(
            topic = %topic,
            session_id = %conn.session_id,
            room_size = conns.len(),
            "Connection joined topic room"
        );
    }

    /// Remove a connection from a topic room
    pub async fn leave(&self, topic: &str, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(conns) = rooms.get_mut(topic) {
            conns.retain(|c| c.session_id != *session_id);

            // Clean up empty rooms
            if conns.is_empty() {
                rooms.remove(topic);
                tracing::debug!(topic = %topic, "Removed empty topic room");
            } else {
                tracing::debug!(
                    topic = %topic,
                    session_id = %session_id,
                    room_size = conns.len(),
                    "Connection left topic room"
                );
            }
        }
    }

    /// Publish a payload to all connections in a topic room
    ///
    /// Fire and forget: send errors are ignored (closed connections are
    /// cleaned up by their own socket task). Returns the number of
    /// connections the message was handed to.
    pub async fn publish(&self, topic: &str, payload: serde_json::Value) -> usize {
        let rooms = self.rooms.read().await;
        let Some(conns) = rooms.get(topic) else {
            tracing::debug!(topic = %topic, "No subscribers for topic");
            return 0;
        };

        let event = ServerEvent::Message {
            destination: topic.to_string(),
            payload,
        };
        let mut success_count = 0;
        let mut failed_count = 0;

        for conn in conns {
            match conn.send(event.clone()) {
                Ok(()) => success_count += 1,
                Err(_) => {
                    failed_count += 1;
                    tracing::warn!(
                        session_id = %conn.session_id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            topic = %topic,
            recipients = success_count,
            failed = failed_count,
            "Published message to topic room"
        );
        success_count
    }

    /// Remove a connection from all rooms
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        let mut removed_from = 0;

        for conns in rooms.values_mut() {
            let before_len = conns.len();
            conns.retain(|c| c.session_id != *session_id);
            if conns.len() < before_len {
                removed_from += 1;
            }
        }

        // Clean up empty rooms
        rooms.retain(|_, conns| !conns.is_empty());

        if removed_from > 0 {
            tracing::debug!(
                session_id = %session_id,
                topic_count = removed_from,
                "Removed connection from rooms"
            );
        }
    }

    /// Subscriptions to one topic
    pub async fn subscriptions_to(&self, topic: &str) -> Vec<ActiveSubscription> {
        let rooms = self.rooms.read().await;
        rooms
            .get(topic)
            .map(|conns| {
                conns
                    .iter()
                    .map(|c| ActiveSubscription {
                        session_id: c.session_id,
                        topic: topic.to_string(),
                        login: c.login.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every live subscription across all topics
    pub async fn list_active_subscriptions(&self) -> Vec<ActiveSubscription> {
        let rooms = self.rooms.read().await;
        rooms
            .iter()
            .flat_map(|(topic, conns)| {
                conns.iter().map(move |c| ActiveSubscription {
                    session_id: c.session_id,
                    topic: topic.clone(),
                    login: c.login.clone(),
                })
            })
            .collect()
    }

    /// Get total number of active rooms
    pub async fn get_room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for TopicRooms {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const TOPIC: &str = "/topic/participations/1/team";

    #[tokio::test]
    async fn test_room_join_and_leave() {
        let rooms = TopicRooms::new();

        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Connection::new("alice", tx));

        // Initially room doesn't exist
        assert!(rooms.subscriptions_to(TOPIC).await.is_empty());

        rooms.join(TOPIC, Arc::clone(&conn)).await;
        rooms.join(TOPIC, Arc::clone(&conn)).await;
        assert_eq!(rooms.subscriptions_to(TOPIC).await.len(), 1);

        rooms.leave(TOPIC, &conn.session_id).await;
        assert!(rooms.subscriptions_to(TOPIC).await.is_empty());
        assert_eq!(rooms.get_room_count().await, 0);
    }

    #[tokio::test]
    async fn test_publish_to_room() {
        let rooms = TopicRooms::new();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();

        rooms.join(TOPIC, Arc::new(Connection::new("alice", tx1))).await;
        rooms.join(TOPIC, Arc::new(Connection::new("bob", tx2))).await;
        rooms
            .join("/topic/participations/2/team", Arc::new(Connection::new("carol", tx3)))
            .await;

        let recipients = rooms.publish(TOPIC, serde_json::json!({"hello": 1})).await;
        assert_eq!(recipients, 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv() {
                Ok(ServerEvent::Message { destination, payload }) => {
                    assert_eq!(destination, TOPIC);
                    assert_eq!(payload["hello"], 1);
                }
                other => panic!("Expected message, got {:?}", other),
            }
        }
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_room() {
        let rooms = TopicRooms::new();
        assert_eq!(rooms.publish(TOPIC, serde_json::Value::Null).await, 0);
    }

    #[tokio::test]
    async fn test_remove_connection_from_all_rooms() {
        let rooms = TopicRooms::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Connection::new("alice", tx));

        rooms.join(TOPIC, Arc::clone(&conn)).await;
        rooms
            .join("/topic/participations/1/team/text-submissions", Arc::clone(&conn))
            .await;
        assert_eq!(rooms.get_room_count().await, 2);
        assert_eq!(rooms.list_active_subscriptions().await.len(), 2);

        rooms.remove_connection(&conn.session_id).await;

        assert_eq!(rooms.get_room_count().await, 0);
        assert!(rooms.list_active_subscriptions().await.is_empty());
    }
}
