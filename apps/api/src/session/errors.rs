use thiserror::Error;
use uuid::Uuid;

use crate::session::store::StoreError;

/// Errors raised by the session orchestrator. Translated to HTTP once, in `AppError`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found with id: {0}")]
    SessionNotFound(Uuid),

    #[error("An active interview session already exists for user: {0}")]
    SessionConflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Answer has already been submitted for the current question in session: {0}")]
    AnswerAlreadySubmitted(Uuid),

    #[error("Interview session time not completed yet. Remaining time: {remaining_minutes} minutes")]
    SessionTimeNotCompleted { remaining_minutes: i64 },

    #[error("Session {0} was modified by another request. Reload and try again.")]
    ConcurrentModification(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Interview agent failed: {0}")]
    Agent(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SessionError::SessionNotFound(id),
            StoreError::VersionConflict { id, .. } => SessionError::ConcurrentModification(id),
            StoreError::ActiveSessionExists(user_id) => SessionError::SessionConflict(user_id),
            other => SessionError::Store(other),
        }
    }
}
