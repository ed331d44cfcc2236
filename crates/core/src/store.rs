//! Keyed document store for session records plus the idempotency-claim
//! table. The store's uniqueness constraint on (user, session) claims is
//! the only synchronization primitive on the finalization path, so the
//! guard stays correct across multiple server processes sharing a real
//! backend.

use crate::error::StoreError;
use crate::model::{Feedback, SessionRecord, SessionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
#[cfg(test)]
use mockall::automock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;
use uuid::Uuid;

/// Claims older than this many hours are expired and may be re-taken.
pub const CLAIM_RETENTION_HOURS: i64 = 24;

fn claim_retention() -> Duration {
    Duration::hours(CLAIM_RETENTION_HOURS)
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, record: SessionRecord) -> Result<(), StoreError>;

    async fn fetch_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError>;

    /// Writes one answer slot, growing the answer list if needed so a
    /// later slot can be written before an earlier skipped one. Slots
    /// past the question list are rejected.
    async fn append_answer(&self, id: Uuid, index: usize, answer: String)
    -> Result<(), StoreError>;

    /// Persists feedback and flips status to `Completed` as one logical
    /// unit.
    async fn complete_session(&self, id: Uuid, feedback: Feedback) -> Result<(), StoreError>;

    /// Attempts to insert the unique (user, session) finalization claim.
    /// `Ok(false)` means the pair already exists: the uniqueness
    /// violation is deterministic, never a silent overwrite.
    async fn try_claim(&self, user_id: &str, session_id: Uuid) -> Result<bool, StoreError>;
}

/// In-process store. Sessions and claims live behind separate locks; no
/// lock is held across an await point.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<Uuid, SessionRecord>>,
    claims: Mutex<HashMap<(String, Uuid), DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_sessions(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, SessionRecord>>, StoreError> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::Backend("session lock poisoned".to_string()))
    }

    /// Backdates an existing claim, standing in for clock advancement in
    /// retention tests.
    #[cfg(test)]
    pub(crate) fn backdate_claim(&self, user_id: &str, session_id: Uuid, age: Duration) {
        let mut claims = self.claims.lock().unwrap();
        if let Some(taken_at) = claims.get_mut(&(user_id.to_string(), session_id)) {
            *taken_at = *taken_at - age;
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, record: SessionRecord) -> Result<(), StoreError> {
        let mut sessions = self.lock_sessions()?;
        match sessions.entry(record.id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(record.id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn fetch_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.lock_sessions()?.get(&id).cloned())
    }

    async fn append_answer(
        &self,
        id: Uuid,
        index: usize,
        answer: String,
    ) -> Result<(), StoreError> {
        let mut sessions = self.lock_sessions()?;
        let record = sessions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if index >= record.questions.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: record.questions.len(),
            });
        }
        if record.answers.len() <= index {
            record.answers.resize(index + 1, String::new());
        }
        record.answers[index] = answer;
        Ok(())
    }

    async fn complete_session(&self, id: Uuid, feedback: Feedback) -> Result<(), StoreError> {
        let mut sessions = self.lock_sessions()?;
        let record = sessions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.feedback = Some(feedback);
        record.status = SessionStatus::Completed;
        Ok(())
    }

    async fn try_claim(&self, user_id: &str, session_id: Uuid) -> Result<bool, StoreError> {
        let mut claims = self
            .claims
            .lock()
            .map_err(|_| StoreError::Backend("claim lock poisoned".to_string()))?;

        let now = Utc::now();
        claims.retain(|_, taken_at| now - *taken_at < claim_retention());

        match claims.entry((user_id.to_string(), session_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(now);
                Ok(true)
            }
        }
    }
}
