//! Team presence tracking
//!
//! Keeps, per participation, when each user last typed and last saved, plus
//! which participations each connection holds a team subscription for. The
//! subscription map is needed on unsubscribe and disconnect, where only the
//! connection id is known.
//!
//! All three maps sit behind one lock so a presence snapshot always joins a
//! consistent view of typing and action times.

use std::collections::{BTreeSet, HashMap};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use time::OffsetDateTime;

use teamsync_shared::{OnlineTeamStudent, ParticipationId};

#[derive(Debug, Default)]
struct TrackerMaps {
    /// connection -> participations of its team topic subscriptions
    destinations: HashMap<Uuid, BTreeSet<ParticipationId>>,
    last_typing: HashMap<ParticipationId, HashMap<String, OffsetDateTime>>,
    last_action: HashMap<ParticipationId, HashMap<String, OffsetDateTime>>,
}

impl TrackerMaps {
    fn is_watched(&self, participation_id: ParticipationId) -> bool {
        self.destinations
            .values()
            .any(|participations| participations.contains(&participation_id))
    }
}

/// In-memory presence state for all participation teams
#[derive(Debug, Default)]
pub struct PresenceTracker {
    maps: RwLock<TrackerMaps>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that a connection subscribed to a team topic (idempotent)
    pub async fn record_subscription(&self, session_id: Uuid, participation_id: ParticipationId) {
        let mut maps = self.maps.write().await;
        maps.destinations
            .entry(session_id)
            .or_default()
            .insert(participation_id);
    }

    pub async fn record_typing(
        &self,
        participation_id: ParticipationId,
        login: &str,
        now: OffsetDateTime,
    ) {
        let mut maps = self.maps.write().await;
        maps.last_typing
            .entry(participation_id)
            .or_default()
            .insert(login.to_string(), now);
    }

    pub async fn record_action(
        &self,
        participation_id: ParticipationId,
        login: &str,
        now: OffsetDateTime,
    ) {
        let mut maps = self.maps.write().await;
        maps.last_action
            .entry(participation_id)
            .or_default()
            .insert(login.to_string(), now);
    }

    /// Drop one team subscription of a connection
    ///
    /// Returns false if the connection did not hold it.
    pub async fn forget_subscription(
        &self,
        session_id: &Uuid,
        participation_id: ParticipationId,
    ) -> bool {
        let mut maps = self.maps.write().await;
        let Some(participations) = maps.destinations.get_mut(session_id) else {
            return false;
        };
        let removed = participations.remove(&participation_id);
        if participations.is_empty() {
            maps.destinations.remove(session_id);
        }
        removed
    }

    /// Drop every team subscription of a connection, returning the participations it held
    ///
    /// Empty for connections that never subscribed to a team topic or were
    /// already forgotten.
    pub async fn forget_connection(&self, session_id: &Uuid) -> Vec<ParticipationId> {
        let mut maps = self.maps.write().await;
        maps.destinations
            .remove(session_id)
            .map(|participations| participations.into_iter().collect())
            .unwrap_or_default()
    }

    /// Whether `session_id` currently holds the team subscription of `participation_id`
    pub async fn is_tracked(&self, session_id: &Uuid, participation_id: ParticipationId) -> bool {
        let maps = self.maps.read().await;
        maps.destinations
            .get(session_id)
            .is_some_and(|participations| participations.contains(&participation_id))
    }

    /// Drop typing and action times of a participation nobody is subscribed to
    ///
    /// Returns true if the participation had no tracked connection left and
    /// its entries were removed.
    pub async fn evict_if_idle(&self, participation_id: ParticipationId) -> bool {
        self.write().await.evict_if_idle(participation_id)
    }

    /// Copy of the connection -> participations map
    pub async fn tracked_connections(&self) -> HashMap<Uuid, BTreeSet<ParticipationId>> {
        let maps = self.maps.read().await;
        maps.destinations.clone()
    }

    pub async fn clear_connections(&self) {
        let mut maps = self.maps.write().await;
        maps.destinations.clear();
    }

    /// Number of participations with typing or action entries
    pub async fn tracked_participations(&self) -> usize {
        let maps = self.maps.read().await;
        maps.last_typing
            .keys()
            .chain(maps.last_action.keys())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Hold a read view of the tracker
    ///
    /// No write can happen while the view is alive, which lets a broadcast
    /// publish a snapshot before any later update is applied.
    pub async fn read(&self) -> PresenceView<'_> {
        PresenceView {
            maps: self.maps.read().await,
        }
    }

    /// Hold the tracker exclusively
    ///
    /// Lets a caller check outside state, such as topic membership, and evict
    /// without a subscription being recorded in between.
    pub async fn write(&self) -> PresenceWriter<'_> {
        PresenceWriter {
            maps: self.maps.write().await,
        }
    }
}

/// Write-locked handle on the tracker
pub struct PresenceWriter<'a> {
    maps: RwLockWriteGuard<'a, TrackerMaps>,
}

impl PresenceWriter<'_> {
    /// See [`PresenceTracker::evict_if_idle`]
    pub fn evict_if_idle(&mut self, participation_id: ParticipationId) -> bool {
        if self.maps.is_watched(participation_id) {
            return false;
        }
        let had_typing = self.maps.last_typing.remove(&participation_id).is_some();
        let had_action = self.maps.last_action.remove(&participation_id).is_some();
        if had_typing || had_action {
            tracing::debug!(participation_id = %participation_id, "Evicted idle team presence");
        }
        true
    }
}

/// Read-locked view of the tracker
pub struct PresenceView<'a> {
    maps: RwLockReadGuard<'a, TrackerMaps>,
}

impl PresenceView<'_> {
    /// Join subscriber logins with their typing and action times
    pub fn online_team_students(
        &self,
        participation_id: ParticipationId,
        logins: BTreeSet<String>,
    ) -> Vec<OnlineTeamStudent> {
        let typing = self.maps.last_typing.get(&participation_id);
        let action = self.maps.last_action.get(&participation_id);

        logins
            .into_iter()
            .map(|login| OnlineTeamStudent {
                last_typing_date: typing.and_then(|m| m.get(&login)).copied(),
                last_action_date: action.and_then(|m| m.get(&login)).copied(),
                login,
            })
            .collect()
    }
}
