//! In-memory collaborator backend
//!
//! Holds participations, users, exercises and saved submissions in process
//! memory. Used by the standalone binary and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use teamsync_shared::{
    Exercise, ExerciseId, ModelingSubmission, Participation, ParticipationId, Submission,
    TeamSyncError, TeamSyncResult, TextSubmission, User,
};

use super::{
    AuthorizationContext, ExerciseService, ParticipationService, SubmissionService, UserService,
};

/// Authorities that may see assessment internals and watch any team
const PRIVILEGED_AUTHORITIES: &[&str] = &["ROLE_ADMIN", "ROLE_INSTRUCTOR", "ROLE_TA"];

/// Seed data for the in-memory backend, usually read from a JSON file
#[derive(Debug, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub participations: Vec<Participation>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    participations: RwLock<HashMap<ParticipationId, Participation>>,
    users: RwLock<HashMap<String, User>>,
    exercises: RwLock<HashMap<ExerciseId, Exercise>>,
    submissions: RwLock<HashMap<u64, Submission>>,
    next_submission_id: AtomicU64,
    authorization_calls: AtomicU64,
    /// Artificial latency added to every save, for exercising timeouts
    save_delay: RwLock<Option<Duration>>,
}

impl InMemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_submission_id: AtomicU64::new(1),
            ..Default::default()
        })
    }

    pub async fn seed(&self, fixtures: Fixtures) {
        tracing::info!(
            participations = fixtures.participations.len(),
            users = fixtures.users.len(),
            exercises = fixtures.exercises.len(),
            "Seeding in-memory backend"
        );
        for participation in fixtures.participations {
            self.insert_participation(participation).await;
        }
        for user in fixtures.users {
            self.insert_user(user).await;
        }
        for exercise in fixtures.exercises {
            self.insert_exercise(exercise).await;
        }
    }

    pub async fn insert_participation(&self, participation: Participation) {
        self.participations
            .write()
            .await
            .insert(participation.id, participation);
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.login.clone(), user);
    }

    pub async fn insert_exercise(&self, exercise: Exercise) {
        self.exercises.write().await.insert(exercise.id, exercise);
    }

    pub async fn set_save_delay(&self, delay: Option<Duration>) {
        *self.save_delay.write().await = delay;
    }

    /// Number of submissions stored so far
    pub async fn saved_count(&self) -> usize {
        self.submissions.read().await.len()
    }

    pub fn authorization_calls(&self) -> u64 {
        self.authorization_calls.load(Ordering::SeqCst)
    }

    async fn store(&self, id: Option<u64>, build: impl FnOnce(u64) -> Submission) -> Submission {
        let delay = *self.save_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let id = id.unwrap_or_else(|| self.next_submission_id.fetch_add(1, Ordering::SeqCst));
        let submission = build(id);
        self.submissions.write().await.insert(id, submission.clone());
        submission
    }
}

fn is_privileged(user: &User) -> bool {
    PRIVILEGED_AUTHORITIES.iter().any(|a| user.has_authority(a))
}

impl AuthorizationContext for InMemoryBackend {
    fn set_authorization_object(&self) {
        self.authorization_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ParticipationService for InMemoryBackend {
    async fn find_student_participation(
        &self,
        id: ParticipationId,
    ) -> TeamSyncResult<Participation> {
        self.participations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| TeamSyncError::NotFound(format!("participation {}", id)))
    }

    async fn may_subscribe(&self, id: ParticipationId, login: &str) -> TeamSyncResult<bool> {
        let participation = match self.participations.read().await.get(&id) {
            Some(participation) => participation.clone(),
            None => return Ok(false),
        };
        if participation.is_owned_by(login) {
            return Ok(true);
        }

        Ok(self
            .users
            .read()
            .await
            .get(login)
            .map(is_privileged)
            .unwrap_or(false))
    }
}

#[async_trait]
impl UserService for InMemoryBackend {
    async fn get_user_with_groups_and_authorities(&self, login: &str) -> TeamSyncResult<User> {
        self.users
            .read()
            .await
            .get(login)
            .cloned()
            .ok_or_else(|| TeamSyncError::NotFound(format!("user {}", login)))
    }
}

#[async_trait]
impl ExerciseService for InMemoryBackend {
    async fn find_one(&self, id: ExerciseId) -> TeamSyncResult<Exercise> {
        self.exercises
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| TeamSyncError::NotFound(format!("exercise {}", id)))
    }
}

#[async_trait]
impl SubmissionService for InMemoryBackend {
    async fn save_modeling(
        &self,
        submission: ModelingSubmission,
        exercise: &Exercise,
        login: &str,
    ) -> TeamSyncResult<ModelingSubmission> {
        let saved = self
            .store(submission.id, |id| {
                Submission::Modeling(ModelingSubmission {
                    id: Some(id),
                    ..submission
                })
            })
            .await;

        tracing::debug!(exercise_id = %exercise.id, login = %login, "Saved modeling submission");
        match saved {
            Submission::Modeling(saved) => Ok(saved),
            Submission::Text(_) => Err(TeamSyncError::Internal(
                "stored submission changed kind".to_string(),
            )),
        }
    }

    async fn save_text(
        &self,
        submission: TextSubmission,
        exercise: &Exercise,
        login: &str,
    ) -> TeamSyncResult<TextSubmission> {
        let saved = self
            .store(submission.id, |id| {
                Submission::Text(TextSubmission {
                    id: Some(id),
                    ..submission
                })
            })
            .await;

        tracing::debug!(exercise_id = %exercise.id, login = %login, "Saved text submission");
        match saved {
            Submission::Text(saved) => Ok(saved),
            Submission::Modeling(_) => Err(TeamSyncError::Internal(
                "stored submission changed kind".to_string(),
            )),
        }
    }

    fn hide_details(&self, submission: &mut Submission, viewer: &User) {
        if is_privileged(viewer) {
            return;
        }
        let result = match submission {
            Submission::Modeling(s) => s.result.as_mut(),
            Submission::Text(s) => s.result.as_mut(),
        };
        if let Some(result) = result {
            result.assessor = None;
            result.assessment_note = None;
        }
    }
}
