use thiserror::Error;
use uuid::Uuid;

/// Failures raised by a [`crate::store::SessionStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("answer index {index} is out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// The error taxonomy crossing the core boundary.
///
/// Only `GenerationFailure` and `SessionNotFound` are surfaced to callers
/// as failures. Provider and parse failures are absorbed inside the
/// orchestrator's fallback ladder, and a duplicate submission is an
/// expected outcome (`FinalizeOutcome::InFlight`), not an error.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("question generation failed")]
    GenerationFailure(#[source] anyhow::Error),
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    #[error("invalid answer submission")]
    InvalidAnswer,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Maps a store-level miss for a known session id to the public
    /// not-found variant; everything else stays a store failure.
    pub(crate) fn from_store(session_id: Uuid, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => CoreError::SessionNotFound(session_id),
            StoreError::IndexOutOfRange { .. } => CoreError::InvalidAnswer,
            other => CoreError::Store(other),
        }
    }
}
