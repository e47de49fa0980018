//! WebSocket support for participation team collaboration
//!
//! Provides the real-time layer for team exercises:
//! - Online team members list per participation (who is online)
//! - Typing indicators and last-saved times per team member
//! - Relay of saved modeling and text submissions to the whole team
//!
//! # Architecture
//!
//! - **Destination**: Team topic naming, parsing and inbound route classification
//! - **Connection**: An authenticated WebSocket connection
//! - **Room**: Topic-based pub/sub for publishing to subscribers
//! - **State**: Global registry of connections and rooms
//! - **Presence**: In-memory typing/action/subscription tracking
//! - **Subscribers**: Distinct logins subscribed to a topic
//! - **Team**: The participation team service tying the above together
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: Type-safe frame definitions for client/server communication

pub mod connection;
pub mod destination;
pub mod events;
pub mod handler;
pub mod presence;
pub mod room;
pub mod state;
pub mod subscribers;
pub mod team;

pub use handler::ws_handler;
pub use state::WebSocketState;
pub use team::ParticipationTeamService;
