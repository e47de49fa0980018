//! WebSocket handler for Axum
//!
//! Handles WebSocket connections, authentication, and event routing.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use teamsync_shared::{ModelingSubmission, TeamSyncError, TeamSyncResult, TextSubmission};

use crate::error::ApiError;
use crate::state::AppState;

use super::{
    connection::Connection,
    destination::{is_team_root, participation_id_from_destination, TeamRoute},
    events::{ClientEvent, ServerEvent},
};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: String,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
/// Authenticates via query parameter token
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> Result<Response, ApiError> {
    if params.token.is_empty() {
        return Err(ApiError::BadRequest("Missing token".to_string()));
    }

    let login = match app_state.jwt.validate_access_token(&params.token) {
        Ok(claims) => claims.sub,
        Err(e) => {
            tracing::warn!(error = ?e, "WebSocket auth failed: invalid token");
            return Err(ApiError::InvalidToken);
        }
    };

    tracing::info!(login = %login, "WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, login, app_state)))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, login: String, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let ws_state = app_state.ws_state.clone();
    let conn = ws_state.add_connection(Connection::new(login, tx)).await;
    let session_id = conn.session_id;

    let _ = conn.send(ServerEvent::Connected { session_id });

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let Ok(msg) = msg else {
            break;
        };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    handle_client_event(event, Arc::clone(&conn), &app_state).await;
                }
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        message = %text,
                        "Failed to parse client event"
                    );
                    let _ = conn.send(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            Message::Close(_) => {
                tracing::info!(session_id = %session_id, "WebSocket close frame received");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum handles ping/pong automatically
            }
            _ => {} // Ignore binary messages
        }
    }

    tracing::info!(session_id = %session_id, login = %conn.login, "WebSocket connection closing");
    close_connection(&app_state, session_id).await;

    send_task.abort();
}

/// Drop a closed connection and tell its teams it left
///
/// The connection leaves every topic before the farewell broadcast, so no
/// presence list computed afterwards can still contain it.
async fn close_connection(app_state: &AppState, session_id: Uuid) {
    app_state.ws_state.remove_connection(&session_id).await;
    app_state.team.teardown(session_id).await;
}

/// Handle client event
async fn handle_client_event(event: ClientEvent, conn: Arc<Connection>, app_state: &AppState) {
    use ClientEvent::*;

    match event {
        Subscribe { destination } => {
            let Some(participation_id) = participation_id_from_destination(&destination) else {
                let _ = conn.send(ServerEvent::Error {
                    message: format!("Unknown destination: {}", destination),
                });
                return;
            };

            match app_state
                .services
                .participations
                .may_subscribe(participation_id, &conn.login)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    let _ = conn.send(ServerEvent::Error {
                        message: "Access denied to participation".to_string(),
                    });
                    return;
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to verify participation access");
                    let _ = conn.send(ServerEvent::Error {
                        message: "Failed to verify access".to_string(),
                    });
                    return;
                }
            }

            app_state.ws_state.subscribe(&conn, &destination).await;
            if is_team_root(&destination) {
                app_state.team.subscribe(conn.session_id, participation_id).await;
            }
        }

        Unsubscribe { destination } => {
            if !app_state.ws_state.unsubscribe(&conn, &destination).await {
                tracing::debug!(
                    session_id = %conn.session_id,
                    destination = %destination,
                    "Unsubscribe from topic without subscription"
                );
                return;
            }
            if !is_team_root(&destination) {
                return;
            }
            if let Some(participation_id) = participation_id_from_destination(&destination) {
                app_state
                    .team
                    .unsubscribe(conn.session_id, participation_id)
                    .await;
            }
        }

        Send {
            destination,
            payload,
        } => handle_send(&destination, payload, &conn, app_state).await,

        Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

async fn handle_send(
    destination: &str,
    payload: serde_json::Value,
    conn: &Connection,
    app_state: &AppState,
) {
    let team = &app_state.team;

    let result = match TeamRoute::parse(destination) {
        Some(TeamRoute::Trigger(participation_id)) => {
            team.trigger_send_online_team_students(participation_id).await;
            Ok(())
        }
        Some(TeamRoute::Typing(participation_id)) => {
            team.start_typing(participation_id, &conn.login).await;
            Ok(())
        }
        Some(TeamRoute::ModelingUpdate(participation_id)) => {
            let Some(submission) = parse_payload::<ModelingSubmission>(payload, conn) else {
                return;
            };
            team.update_modeling_submission(participation_id, submission, &conn.login)
                .await
        }
        Some(TeamRoute::TextUpdate(participation_id)) => {
            let Some(submission) = parse_payload::<TextSubmission>(payload, conn) else {
                return;
            };
            team.update_text_submission(participation_id, submission, &conn.login)
                .await
        }
        None => {
            let _ = conn.send(ServerEvent::Error {
                message: format!("Unknown destination: {}", destination),
            });
            return;
        }
    };

    report(result, destination, conn);
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    payload: serde_json::Value,
    conn: &Connection,
) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(submission) => Some(submission),
        Err(e) => {
            tracing::warn!(
                error = ?e,
                session_id = %conn.session_id,
                "Invalid submission payload"
            );
            let _ = conn.send(ServerEvent::Error {
                message: "Invalid submission payload".to_string(),
            });
            None
        }
    }
}

/// Answer the sender according to the outcome of a team message
fn report(result: TeamSyncResult<()>, destination: &str, conn: &Connection) {
    match result {
        Ok(()) => {}
        // Membership is not disclosed over the socket
        Err(TeamSyncError::Unauthorized(login)) => {
            tracing::debug!(
                destination = %destination,
                login = %login,
                "Dropped submission update from non team member"
            );
        }
        Err(TeamSyncError::NotFound(what)) => {
            tracing::warn!(
                destination = %destination,
                missing = %what,
                "Submission update aborted"
            );
        }
        Err(e @ TeamSyncError::Unprocessable(_)) => {
            tracing::info!(destination = %destination, error = %e, "Rejected submission update");
            let _ = conn.send(ServerEvent::Error {
                message: e.to_string(),
            });
        }
        Err(e) => {
            tracing::error!(
                destination = %destination,
                session_id = %conn.session_id,
                error = %e,
                "Submission update failed"
            );
            let _ = conn.send(ServerEvent::Error {
                message: "Failed to update submission".to_string(),
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{Config, LogFormat};
    use crate::services::{InMemoryBackend, TeamServices};
    use crate::websocket::destination::team_destination;
    use teamsync_shared::{
        Exercise, ExerciseId, ExerciseType, Participation, ParticipationId, ParticipationOwner,
        Team, User,
    };
    use tokio::sync::mpsc::UnboundedReceiver;

    const FIRST: &str = "/topic/participations/7/team";
    const SECOND: &str = "/topic/participations/8/team";

    async fn test_state() -> AppState {
        let backend = InMemoryBackend::new();
        backend
            .insert_exercise(Exercise {
                id: ExerciseId(1),
                title: "Essay".to_string(),
                exercise_type: ExerciseType::Text,
            })
            .await;
        for id in [7, 8] {
            backend
                .insert_participation(Participation {
                    id: ParticipationId(id),
                    exercise_id: ExerciseId(1),
                    owner: ParticipationOwner::Team(Team {
                        id,
                        short_name: format!("team{}", id),
                        students: vec!["alice".to_string(), "carol".to_string()],
                    }),
                })
                .await;
        }
        for (id, login) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            backend.insert_user(User::new(id, login)).await;
        }

        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            jwt_secret: "test-jwt-secret-must-be-at-least-32-characters-long".to_string(),
            jwt_expiry_hours: 1,
            submission_save_timeout_ms: 1000,
            evict_idle_presence: true,
            fixtures_path: None,
            log_format: LogFormat::Pretty,
        };
        AppState::new(config, TeamServices::in_memory(backend))
    }

    async fn connect(
        state: &AppState,
        login: &str,
    ) -> (Arc<Connection>, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = state.ws_state.add_connection(Connection::new(login, tx)).await;
        (conn, rx)
    }

    async fn subscribe(state: &AppState, conn: &Arc<Connection>, destination: &str) {
        let event = ClientEvent::Subscribe {
            destination: destination.to_string(),
        };
        handle_client_event(event, Arc::clone(conn), state).await;
    }

    async fn unsubscribe(state: &AppState, conn: &Arc<Connection>, destination: &str) {
        let event = ClientEvent::Unsubscribe {
            destination: destination.to_string(),
        };
        handle_client_event(event, Arc::clone(conn), state).await;
    }

    /// Logins of every presence list received on `topic`, oldest first
    fn presence(rx: &mut UnboundedReceiver<ServerEvent>, topic: &str) -> Vec<Vec<String>> {
        let mut lists = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::Message {
                destination,
                payload,
            } = event
            {
                if destination == topic {
                    lists.push(
                        payload
                            .as_array()
                            .unwrap()
                            .iter()
                            .map(|e| e["login"].as_str().unwrap().to_string())
                            .collect(),
                    );
                }
            }
        }
        lists
    }

    async fn is_member(state: &AppState, conn: &Connection, topic: &str) -> bool {
        state
            .ws_state
            .rooms
            .subscriptions_to(topic)
            .await
            .iter()
            .any(|s| s.session_id == conn.session_id)
    }

    fn errors(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::Error { message } = event {
                messages.push(message);
            }
        }
        messages
    }

    #[tokio::test]
    async fn test_subscribe_to_team_root_registers_and_broadcasts() {
        let state = test_state().await;
        let (alice, mut rx) = connect(&state, "alice").await;

        subscribe(&state, &alice, FIRST).await;

        assert!(is_member(&state, &alice, FIRST).await);
        assert!(state
            .team
            .tracker()
            .is_tracked(&alice.session_id, ParticipationId(7))
            .await);
        assert_eq!(presence(&mut rx, FIRST), vec![vec!["alice".to_string()]]);
    }

    #[tokio::test]
    async fn test_subscribe_to_relay_topic_does_not_register() {
        let state = test_state().await;
        let (alice, mut rx) = connect(&state, "alice").await;
        let relay = "/topic/participations/7/team/text-submissions";

        subscribe(&state, &alice, relay).await;

        assert!(is_member(&state, &alice, relay).await);
        assert!(state.team.tracker().tracked_connections().await.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_denied_for_outsider() {
        let state = test_state().await;
        let (bob, mut rx) = connect(&state, "bob").await;

        subscribe(&state, &bob, FIRST).await;

        assert!(!is_member(&state, &bob, FIRST).await);
        assert!(state.team.tracker().tracked_connections().await.is_empty());
        assert_eq!(errors(&mut rx), vec!["Access denied to participation"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_from_one_of_two_teams() {
        let state = test_state().await;
        let (alice, mut rx_a) = connect(&state, "alice").await;
        let (carol, mut rx_c) = connect(&state, "carol").await;

        subscribe(&state, &carol, FIRST).await;
        subscribe(&state, &carol, SECOND).await;
        subscribe(&state, &alice, FIRST).await;
        subscribe(&state, &alice, SECOND).await;
        presence(&mut rx_a, FIRST);
        presence(&mut rx_c, FIRST);
        presence(&mut rx_c, SECOND);

        unsubscribe(&state, &alice, FIRST).await;

        // Carol sees alice leave the first team only
        let mut rx_c_lists = Vec::new();
        while let Ok(event) = rx_c.try_recv() {
            rx_c_lists.push(event);
        }
        assert_eq!(rx_c_lists.len(), 1);
        match &rx_c_lists[0] {
            ServerEvent::Message {
                destination,
                payload,
            } => {
                assert_eq!(destination, FIRST);
                assert_eq!(payload[0]["login"], "carol");
                assert_eq!(payload.as_array().unwrap().len(), 1);
            }
            other => panic!("Expected presence message, got {:?}", other),
        }

        let tracker = state.team.tracker();
        assert!(!tracker.is_tracked(&alice.session_id, ParticipationId(7)).await);
        assert!(tracker.is_tracked(&alice.session_id, ParticipationId(8)).await);
        assert!(is_member(&state, &alice, SECOND).await);

        // Disconnect later still says goodbye on the second team
        close_connection(&state, alice.session_id).await;
        assert_eq!(presence(&mut rx_c, SECOND), vec![vec!["carol".to_string()]]);
    }

    #[tokio::test]
    async fn test_unsubscribe_twice_broadcasts_once() {
        let state = test_state().await;
        let (alice, _rx_a) = connect(&state, "alice").await;
        let (carol, mut rx_c) = connect(&state, "carol").await;

        subscribe(&state, &carol, FIRST).await;
        subscribe(&state, &alice, FIRST).await;
        presence(&mut rx_c, FIRST);

        unsubscribe(&state, &alice, FIRST).await;
        unsubscribe(&state, &alice, FIRST).await;
        close_connection(&state, alice.session_id).await;

        assert_eq!(presence(&mut rx_c, FIRST), vec![vec!["carol".to_string()]]);
    }

    #[tokio::test]
    async fn test_closed_connection_stays_offline() {
        let state = test_state().await;
        let (alice, mut rx_a) = connect(&state, "alice").await;
        let (carol, _rx_c) = connect(&state, "carol").await;

        subscribe(&state, &alice, FIRST).await;
        subscribe(&state, &carol, FIRST).await;
        presence(&mut rx_a, FIRST);

        close_connection(&state, carol.session_id).await;
        let event = ClientEvent::Send {
            destination: format!("{}/trigger", FIRST),
            payload: serde_json::Value::Null,
        };
        handle_client_event(event, Arc::clone(&alice), &state).await;

        let alice_only = vec!["alice".to_string()];
        assert_eq!(presence(&mut rx_a, FIRST), vec![alice_only.clone(), alice_only]);
        assert_eq!(state.ws_state.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_typing_is_routed_to_team() {
        let state = test_state().await;
        let (alice, mut rx) = connect(&state, "alice").await;
        subscribe(&state, &alice, FIRST).await;
        presence(&mut rx, FIRST);

        let event = ClientEvent::Send {
            destination: format!("{}/typing", FIRST),
            payload: serde_json::Value::Null,
        };
        handle_client_event(event, Arc::clone(&alice), &state).await;

        match rx.try_recv() {
            Ok(ServerEvent::Message {
                destination,
                payload,
            }) => {
                assert_eq!(destination, team_destination(ParticipationId(7)));
                assert!(payload[0]["lastTypingDate"].is_string());
            }
            other => panic!("Expected presence message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_to_unknown_destination() {
        let state = test_state().await;
        let (alice, mut rx) = connect(&state, "alice").await;

        let event = ClientEvent::Send {
            destination: "/topic/other".to_string(),
            payload: serde_json::Value::Null,
        };
        handle_client_event(event, Arc::clone(&alice), &state).await;

        assert_eq!(errors(&mut rx), vec!["Unknown destination: /topic/other"]);
    }

    #[test]
    fn test_unauthorized_and_not_found_are_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new("bob", tx);

        report(
            Err(TeamSyncError::Unauthorized("bob".to_string())),
            "/topic/participations/7/team/text-submissions/update",
            &conn,
        );
        report(
            Err(TeamSyncError::NotFound("participation 7".to_string())),
            "/topic/participations/7/team/text-submissions/update",
            &conn,
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unprocessable_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new("alice", tx);

        report(
            Err(TeamSyncError::Unprocessable("text".to_string())),
            "/topic/participations/8/team/text-submissions/update",
            &conn,
        );
        match rx.try_recv() {
            Ok(ServerEvent::Error { message }) => {
                assert_eq!(message, "Submission type 'text' not allowed.");
            }
            other => panic!("Expected error event, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_payload_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new("alice", tx);

        let parsed = parse_payload::<TextSubmission>(serde_json::json!({"text": 42}), &conn);
        assert!(parsed.is_none());
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Error { .. })));
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new("alice", tx);

        report(
            Err(TeamSyncError::Internal("db exploded".to_string())),
            "/topic/participations/8/team/text-submissions/update",
            &conn,
        );
        match rx.try_recv() {
            Ok(ServerEvent::Error { message }) => {
                assert_eq!(message, "Failed to update submission");
            }
            other => panic!("Expected error event, got {:?}", other),
        }
    }
}
