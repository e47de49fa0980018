//! Collaborator interfaces consumed by the team websocket service
//!
//! Persistence, user management and exercise configuration live outside this
//! service. They are reached through the traits below so that the socket
//! layer can be wired to a database-backed implementation or to the
//! in-memory [`InMemoryBackend`] used by the standalone binary and tests.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use teamsync_shared::{
    Exercise, ExerciseId, ModelingSubmission, Participation, ParticipationId, Submission,
    TeamSyncResult, TextSubmission, User,
};

pub use memory::{Fixtures, InMemoryBackend};

/// Marks the current call chain as authorized for data access
///
/// Socket callbacks run outside of any HTTP request, so data-layer calls made
/// while relaying a submission need an explicit authorization context.
pub trait AuthorizationContext: Send + Sync {
    fn set_authorization_object(&self);
}

#[async_trait]
pub trait ParticipationService: Send + Sync {
    /// Load a participation, failing with `NotFound` if it does not exist
    async fn find_student_participation(
        &self,
        id: ParticipationId,
    ) -> TeamSyncResult<Participation>;

    /// Outcome of the subscription policy for the team topic of `id`
    async fn may_subscribe(&self, id: ParticipationId, login: &str) -> TeamSyncResult<bool>;
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user_with_groups_and_authorities(&self, login: &str) -> TeamSyncResult<User>;
}

#[async_trait]
pub trait ExerciseService: Send + Sync {
    async fn find_one(&self, id: ExerciseId) -> TeamSyncResult<Exercise>;
}

#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn save_modeling(
        &self,
        submission: ModelingSubmission,
        exercise: &Exercise,
        login: &str,
    ) -> TeamSyncResult<ModelingSubmission>;

    async fn save_text(
        &self,
        submission: TextSubmission,
        exercise: &Exercise,
        login: &str,
    ) -> TeamSyncResult<TextSubmission>;

    /// Strip everything `viewer` is not allowed to see, in place
    fn hide_details(&self, submission: &mut Submission, viewer: &User);
}

/// All collaborators the team service needs, bundled for injection
#[derive(Clone)]
pub struct TeamServices {
    pub authorization: Arc<dyn AuthorizationContext>,
    pub participations: Arc<dyn ParticipationService>,
    pub users: Arc<dyn UserService>,
    pub exercises: Arc<dyn ExerciseService>,
    pub submissions: Arc<dyn SubmissionService>,
}

impl TeamServices {
    /// Wire every collaborator to the same in-memory backend
    pub fn in_memory(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            authorization: backend.clone(),
            participations: backend.clone(),
            users: backend.clone(),
            exercises: backend.clone(),
            submissions: backend,
        }
    }
}
