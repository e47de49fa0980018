//! Shared application state

use std::sync::Arc;

use crate::auth::JwtManager;
use crate::config::Config;
use crate::services::TeamServices;
use crate::websocket::{ParticipationTeamService, WebSocketState};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt: JwtManager,
    pub ws_state: WebSocketState,
    pub services: TeamServices,
    pub team: ParticipationTeamService,
}

impl AppState {
    pub fn new(config: Config, services: TeamServices) -> Self {
        let ws_state = WebSocketState::new();
        let team = ParticipationTeamService::new(ws_state.clone(), services.clone())
            .with_save_timeout(config.submission_save_timeout())
            .with_idle_eviction(config.evict_idle_presence);

        Self {
            jwt: JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours),
            config: Arc::new(config),
            ws_state,
            services,
            team,
        }
    }
}
