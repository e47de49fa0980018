//! TeamSync API Library
//!
//! Real-time presence and submission relay for participation teams.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use error::ApiError;
pub use state::AppState;
