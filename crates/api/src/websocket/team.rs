//! Participation team collaboration
//!
//! Members of a team participation work on one shared submission. This
//! service keeps every subscriber of a team topic informed about who is
//! online, who is typing and who saved last, and relays saved submissions to
//! the rest of the team.
//!
//! Presence is pushed as a full list of [`OnlineTeamStudent`] entries on the
//! team root topic whenever something changes: a subscribe, an explicit
//! trigger, a typing notification, a relayed submission, or a connection
//! leaving the topic.

use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use uuid::Uuid;

use teamsync_shared::{
    ModelingSubmission, OnlineTeamStudent, ParticipationId, Submission, SubmissionSyncPayload,
    TeamSubmission, TeamSyncError, TeamSyncResult, TextSubmission,
};

use super::destination::{
    team_destination, team_destination_with_path, MODELING_SUBMISSIONS, TEXT_SUBMISSIONS,
};
use super::presence::PresenceTracker;
use super::state::WebSocketState;
use super::subscribers::resolve_subscribers;
use crate::services::TeamServices;

/// Presence and submission relay for participation teams
#[derive(Clone)]
pub struct ParticipationTeamService {
    ws_state: WebSocketState,
    tracker: Arc<PresenceTracker>,
    services: TeamServices,
    save_timeout: Duration,
    evict_idle_presence: bool,
}

impl ParticipationTeamService {
    pub fn new(ws_state: WebSocketState, services: TeamServices) -> Self {
        Self {
            ws_state,
            tracker: Arc::new(PresenceTracker::new()),
            services,
            save_timeout: Duration::from_secs(10),
            evict_idle_presence: true,
        }
    }

    pub fn with_save_timeout(mut self, save_timeout: Duration) -> Self {
        self.save_timeout = save_timeout;
        self
    }

    pub fn with_idle_eviction(mut self, evict_idle_presence: bool) -> Self {
        self.evict_idle_presence = evict_idle_presence;
        self
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    /// A connection subscribed to the team root topic of a participation
    pub async fn subscribe(&self, session_id: Uuid, participation_id: ParticipationId) {
        self.tracker
            .record_subscription(session_id, participation_id)
            .await;
        self.send_online_team_students(participation_id, None).await;
    }

    /// Re-send the online team members list to all subscribers
    pub async fn trigger_send_online_team_students(&self, participation_id: ParticipationId) {
        self.send_online_team_students(participation_id, None).await;
    }

    /// `login` started typing in the shared submission
    pub async fn start_typing(&self, participation_id: ParticipationId, login: &str) {
        self.tracker
            .record_typing(participation_id, login, OffsetDateTime::now_utc())
            .await;
        self.send_online_team_students(participation_id, None).await;
        self.evict_if_idle(participation_id).await;
    }

    pub async fn update_modeling_submission(
        &self,
        participation_id: ParticipationId,
        submission: ModelingSubmission,
        login: &str,
    ) -> TeamSyncResult<()> {
        let start = Instant::now();
        let submission_id = submission.id;
        let result = self
            .update_submission(participation_id, submission.into(), login, MODELING_SUBMISSIONS)
            .await;
        tracing::info!(
            submission_id = ?submission_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Websocket endpoint updateModelingSubmission finished"
        );
        result
    }

    pub async fn update_text_submission(
        &self,
        participation_id: ParticipationId,
        submission: TextSubmission,
        login: &str,
    ) -> TeamSyncResult<()> {
        let start = Instant::now();
        let submission_id = submission.id;
        let result = self
            .update_submission(participation_id, submission.into(), login, TEXT_SUBMISSIONS)
            .await;
        tracing::info!(
            submission_id = ?submission_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Websocket endpoint updateTextSubmission finished"
        );
        result
    }

    /// Save a team member's submission and relay it to the team
    ///
    /// Fails with `Unauthorized` if `login` is not part of the owning team.
    /// Callers must not answer that error on the socket.
    pub async fn update_submission(
        &self,
        participation_id: ParticipationId,
        submission: Submission,
        login: &str,
        topic_path: &str,
    ) -> TeamSyncResult<()> {
        self.services.authorization.set_authorization_object();

        let participation = self
            .services
            .participations
            .find_student_participation(participation_id)
            .await?;

        if !participation.is_owned_by(login) {
            return Err(TeamSyncError::Unauthorized(login.to_string()));
        }

        let user = self
            .services
            .users
            .get_user_with_groups_and_authorities(login)
            .await?;
        let exercise = self
            .services
            .exercises
            .find_one(participation.exercise_id)
            .await?;

        let paired = TeamSubmission::pair(submission, exercise)?;
        let mut saved = tokio::time::timeout(self.save_timeout, self.save(paired, login))
            .await
            .map_err(|_| TeamSyncError::Timeout(self.save_timeout))??;
        self.services.submissions.hide_details(&mut saved, &user);
        tracing::debug!(
            participation_id = %participation_id,
            submission_id = ?saved.id(),
            login = %login,
            "Saved team submission"
        );

        self.tracker
            .record_action(participation_id, login, OffsetDateTime::now_utc())
            .await;
        self.send_online_team_students(participation_id, None).await;

        let payload = SubmissionSyncPayload {
            submission: saved,
            sender: user,
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|e| TeamSyncError::Internal(e.to_string()))?;
        self.ws_state
            .publish(&team_destination_with_path(participation_id, topic_path), payload)
            .await;
        self.evict_if_idle(participation_id).await;

        Ok(())
    }

    async fn save(&self, paired: TeamSubmission, login: &str) -> TeamSyncResult<Submission> {
        let submissions = &self.services.submissions;
        match paired {
            TeamSubmission::Modeling { submission, exercise } => submissions
                .save_modeling(submission, &exercise, login)
                .await
                .map(Submission::Modeling),
            TeamSubmission::Text { submission, exercise } => submissions
                .save_text(submission, &exercise, login)
                .await
                .map(Submission::Text),
        }
    }

    /// A connection unsubscribed from the team root topic of a participation
    ///
    /// Its other team subscriptions are left alone. Ignored if the connection
    /// did not hold this one.
    pub async fn unsubscribe(&self, session_id: Uuid, participation_id: ParticipationId) {
        if !self
            .tracker
            .forget_subscription(&session_id, participation_id)
            .await
        {
            return;
        }
        self.leave(session_id, participation_id).await;
    }

    /// A connection disconnected: leave every team it was subscribed to
    ///
    /// Connections that never subscribed to a team topic, or were already
    /// torn down, are ignored.
    pub async fn teardown(&self, session_id: Uuid) {
        for participation_id in self.tracker.forget_connection(&session_id).await {
            self.leave(session_id, participation_id).await;
        }
    }

    async fn leave(&self, session_id: Uuid, participation_id: ParticipationId) {
        self.send_online_team_students(participation_id, Some(session_id))
            .await;
        self.evict_if_idle(participation_id).await;
    }

    /// Drop typing and action times of a team nobody watches anymore
    ///
    /// Checked against topic membership while the tracker is held, so a
    /// concurrent subscribe either keeps the entries or records after them.
    async fn evict_if_idle(&self, participation_id: ParticipationId) -> bool {
        if !self.evict_idle_presence {
            return false;
        }
        let mut presence = self.tracker.write().await;
        let watchers =
            resolve_subscribers(&self.ws_state, &team_destination(participation_id), None).await;
        watchers.is_empty() && presence.evict_if_idle(participation_id)
    }

    /// Publish the online team members list of a participation
    ///
    /// The tracker stays read-locked until the list has been handed to the
    /// subscribers, so lists of one team go out in the order of the updates
    /// they reflect.
    pub async fn send_online_team_students(
        &self,
        participation_id: ParticipationId,
        except_session_id: Option<Uuid>,
    ) -> Vec<OnlineTeamStudent> {
        let destination = team_destination(participation_id);

        let view = self.tracker.read().await;
        let logins = resolve_subscribers(&self.ws_state, &destination, except_session_id).await;
        let online_team_students = view.online_team_students(participation_id, logins);

        match serde_json::to_value(&online_team_students) {
            Ok(payload) => {
                self.ws_state.publish(&destination, payload).await;
            }
            Err(e) => {
                tracing::error!(
                    error = ?e,
                    participation_id = %participation_id,
                    "Failed to serialize online team students"
                );
            }
        }
        drop(view);

        online_team_students
    }
}
