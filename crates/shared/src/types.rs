//! Common types used across TeamSync

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::TeamSyncError;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Participation ID wrapper
///
/// A team participation is the shared editing session all presence state is
/// keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipationId(pub u64);

impl From<u64> for ParticipationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ParticipationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exercise ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExerciseId(pub u64);

impl From<u64> for ExerciseId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Users and Participations
// =============================================================================

/// A user as returned by the user lookup, including group memberships
///
/// Groups and authorities never leave the server; only the public fields are
/// serialized when a user is attached to a relayed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing, default)]
    pub groups: Vec<String>,
    #[serde(skip_serializing, default)]
    pub authorities: Vec<String>,
}

impl User {
    pub fn new(id: u64, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            name: None,
            groups: Vec::new(),
            authorities: Vec::new(),
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: u64,
    pub short_name: String,
    /// Logins of the team's students
    pub students: Vec<String>,
}

impl Team {
    pub fn has_student_with_login(&self, login: &str) -> bool {
        self.students.iter().any(|s| s == login)
    }
}

/// Who a participation belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationOwner {
    Student(String),
    Team(Team),
}

/// A student or team participation in an exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub id: ParticipationId,
    pub exercise_id: ExerciseId,
    pub owner: ParticipationOwner,
}

impl Participation {
    /// Whether `login` is the owning student or a member of the owning team
    pub fn is_owned_by(&self, login: &str) -> bool {
        match &self.owner {
            ParticipationOwner::Student(student) => student == login,
            ParticipationOwner::Team(team) => team.has_student_with_login(login),
        }
    }
}

// =============================================================================
// Exercises and Submissions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExerciseType {
    Modeling,
    Text,
    Programming,
    FileUpload,
    Quiz,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: ExerciseId,
    pub title: String,
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
}

/// Assessment attached to a submission
///
/// Assessor identity and internal notes are instructor-only and are stripped
/// before the submission is shown to students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelingSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_text: Option<String>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AssessmentResult>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AssessmentResult>,
}

/// A submission as it travels over the socket, tagged by exercise type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "submissionExerciseType", rename_all = "kebab-case")]
pub enum Submission {
    Modeling(ModelingSubmission),
    Text(TextSubmission),
}

impl Submission {
    pub fn id(&self) -> Option<u64> {
        match self {
            Submission::Modeling(s) => s.id,
            Submission::Text(s) => s.id,
        }
    }

    pub fn submission_type(&self) -> &'static str {
        match self {
            Submission::Modeling(_) => "modeling",
            Submission::Text(_) => "text",
        }
    }
}

impl From<ModelingSubmission> for Submission {
    fn from(s: ModelingSubmission) -> Self {
        Submission::Modeling(s)
    }
}

impl From<TextSubmission> for Submission {
    fn from(s: TextSubmission) -> Self {
        Submission::Text(s)
    }
}

/// A submission matched with an exercise of the same kind
///
/// Can only be built through [`TeamSubmission::pair`], so the save path for a
/// value of this type never has to re-check the pairing.
#[derive(Debug, Clone, PartialEq)]
pub enum TeamSubmission {
    Modeling {
        submission: ModelingSubmission,
        exercise: Exercise,
    },
    Text {
        submission: TextSubmission,
        exercise: Exercise,
    },
}

impl TeamSubmission {
    pub fn pair(submission: Submission, exercise: Exercise) -> Result<Self, TeamSyncError> {
        match (submission, exercise.exercise_type) {
            (Submission::Modeling(submission), ExerciseType::Modeling) => {
                Ok(TeamSubmission::Modeling { submission, exercise })
            }
            (Submission::Text(submission), ExerciseType::Text) => {
                Ok(TeamSubmission::Text { submission, exercise })
            }
            (submission, _) => Err(TeamSyncError::Unprocessable(
                submission.submission_type().to_string(),
            )),
        }
    }
}

// =============================================================================
// Broadcast Payloads
// =============================================================================

/// One entry of the online team members list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineTeamStudent {
    pub login: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_typing_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_action_date: Option<OffsetDateTime>,
}

/// A saved submission relayed to the rest of the team
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionSyncPayload {
    pub submission: Submission,
    pub sender: User,
}
