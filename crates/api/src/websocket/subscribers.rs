//! Subscriber resolution
//!
//! Turns the live subscriptions of a topic into the set of distinct user
//! logins behind them.

use std::collections::BTreeSet;
use uuid::Uuid;

use super::state::WebSocketState;

/// Logins subscribed to `topic`, optionally ignoring one connection
///
/// A user with several connections on the same topic (e.g. two browser tabs)
/// appears once. The unsubscribe and disconnect paths pass the departing
/// connection as `except_session_id` because it is still registered while
/// the farewell broadcast is computed.
pub async fn resolve_subscribers(
    registry: &WebSocketState,
    topic: &str,
    except_session_id: Option<Uuid>,
) -> BTreeSet<String> {
    registry
        .rooms
        .subscriptions_to(topic)
        .await
        .into_iter()
        .filter(|s| Some(s.session_id) != except_session_id)
        .map(|s| s.login)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::Connection;
    use tokio::sync::mpsc;

    const TOPIC: &str = "/topic/participations/42/team";

    #[tokio::test]
    async fn test_no_subscribers() {
        let registry = WebSocketState::new();
        assert!(resolve_subscribers(&registry, TOPIC, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_same_user_twice_is_deduplicated() {
        let registry = WebSocketState::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let tab1 = registry.add_connection(Connection::new("alice", tx1)).await;
        let tab2 = registry.add_connection(Connection::new("alice", tx2)).await;
        registry.subscribe(&tab1, TOPIC).await;
        registry.subscribe(&tab2, TOPIC).await;

        let subscribers = resolve_subscribers(&registry, TOPIC, None).await;
        assert_eq!(subscribers.len(), 1);
        assert!(subscribers.contains("alice"));

        // Excluding one tab still leaves the user online through the other
        let subscribers = resolve_subscribers(&registry, TOPIC, Some(tab1.session_id)).await;
        assert_eq!(subscribers.len(), 1);
    }

    #[tokio::test]
    async fn test_exclude_connection_and_other_topics() {
        let registry = WebSocketState::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let (tx3, _rx3) = mpsc::unbounded_channel();

        let alice = registry.add_connection(Connection::new("alice", tx1)).await;
        let bob = registry.add_connection(Connection::new("bob", tx2)).await;
        let carol = registry.add_connection(Connection::new("carol", tx3)).await;
        registry.subscribe(&alice, TOPIC).await;
        registry.subscribe(&bob, TOPIC).await;
        registry.subscribe(&carol, "/topic/participations/42/team/text-submissions").await;

        let subscribers = resolve_subscribers(&registry, TOPIC, Some(bob.session_id)).await;
        assert_eq!(subscribers.into_iter().collect::<Vec<_>>(), vec!["alice".to_string()]);
    }
}
