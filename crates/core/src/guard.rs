//! Idempotent finalization guard.
//!
//! Grading must run at most once per (user, session) pair even under
//! concurrent retries. The guard leans entirely on the store's unique
//! claim constraint: whoever inserts the claim is cleared to grade,
//! everyone else is told what already happened.

use crate::error::CoreError;
use crate::model::{Feedback, SessionStatus};
use crate::store::SessionStore;
use uuid::Uuid;

/// What a finalize attempt resolved to. `InFlight` is an expected
/// concurrency outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// The claim was inserted; the caller runs grading exactly once.
    Cleared,
    /// Grading already completed; the persisted feedback is replayed
    /// verbatim, identical on every retry.
    Replay(Feedback),
    /// The claim exists but grading has not persisted yet.
    InFlight,
}

pub async fn finalize<S: SessionStore + ?Sized>(
    store: &S,
    user_id: &str,
    session_id: Uuid,
) -> Result<FinalizeOutcome, CoreError> {
    let claimed = store
        .try_claim(user_id, session_id)
        .await
        .map_err(|e| CoreError::from_store(session_id, e))?;

    // The session's own status is consulted on both claim outcomes: a
    // fresh claim may follow an expired one, and a session graded under
    // that earlier claim must replay, never grade twice.
    let record = store
        .fetch_session(session_id)
        .await
        .map_err(|e| CoreError::from_store(session_id, e))?
        .ok_or(CoreError::SessionNotFound(session_id))?;

    match (record.status, record.feedback) {
        (SessionStatus::Completed, Some(feedback)) => Ok(FinalizeOutcome::Replay(feedback)),
        _ if claimed => Ok(FinalizeOutcome::Cleared),
        // Completed without persisted feedback cannot be replayed; report
        // in-flight so the caller retries once the write lands.
        _ => Ok(FinalizeOutcome::InFlight),
    }
}
