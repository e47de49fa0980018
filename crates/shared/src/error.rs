//! Error types for TeamSync

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TeamSyncError {
    /// The acting user is not a member of the team owning the participation.
    ///
    /// Never reported back over the socket: answering would tell the caller
    /// whether the participation exists and who owns it.
    #[error("User {0} does not belong to the owning team")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Submission type '{0}' not allowed.")]
    Unprocessable(String),

    #[error("Submission save timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type TeamSyncResult<T> = Result<T, TeamSyncError>;
