//! # Session Store
//!
//! Process-wide mapping from call identifier to [`CallSession`].
//!
//! Every mutation goes through an explicit store operation instead of a shared
//! mutable reference, so the orchestrator never holds a session across an AI call.
//! Each operation is atomic on its own; sequences of operations are not. Two
//! transcript posts for the same call race freely and land in whatever order
//! their write locks are granted.
//!
//! Sessions are never evicted: they live until the process exits.

use super::session::{AnalysisResult, CallSession};
use super::transcript;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("call {0} not found")]
    NotFound(String),
    #[error("call {0} already exists")]
    AlreadyExists(String),
}

/// Storage seam for call sessions.
///
/// Production uses [`InMemorySessionStore`]; a persistent implementation only has
/// to honour the same per-operation atomicity.
pub trait SessionStore: Send + Sync {
    /// Create an active session. Generates a UUID v4 when `requested_id` is `None`.
    fn create(&self, requested_id: Option<String>) -> Result<String, StoreError>;

    /// Copy of the session as it is right now.
    fn get(&self, call_id: &str) -> Result<CallSession, StoreError>;

    /// Flattened transcript of the session.
    fn transcript(&self, call_id: &str) -> Result<String, StoreError>;

    /// Append one fragment, returning the new fragment count.
    fn append_fragment(&self, call_id: &str, fragment: String) -> Result<usize, StoreError>;

    /// Append one analysis to the session's history.
    fn record_analysis(&self, call_id: &str, analysis: AnalysisResult) -> Result<(), StoreError>;

    /// Mark the session ended. `Ok(false)` means it had already ended.
    fn mark_ended(
        &self,
        call_id: &str,
        disposition: String,
        notes: Option<String>,
    ) -> Result<bool, StoreError>;

    /// Number of sessions still active.
    fn count_active(&self) -> usize;

    /// Number of sessions ever created.
    fn total_count(&self) -> usize;
}

/// `RwLock<HashMap>` backed store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, CallSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a session half-written: every
    // critical section below is a single push or field assignment.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CallSession>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CallSession>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_session<T>(
        &self,
        call_id: &str,
        mutate: impl FnOnce(&mut CallSession) -> T,
    ) -> Result<T, StoreError> {
        let mut sessions = self.write();
        sessions
            .get_mut(call_id)
            .map(mutate)
            .ok_or_else(|| StoreError::NotFound(call_id.to_string()))
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, requested_id: Option<String>) -> Result<String, StoreError> {
        let mut sessions = self.write();

        let call_id = requested_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if sessions.contains_key(&call_id) {
            return Err(StoreError::AlreadyExists(call_id));
        }

        sessions.insert(call_id.clone(), CallSession::new(call_id.clone()));
        Ok(call_id)
    }

    fn get(&self, call_id: &str) -> Result<CallSession, StoreError> {
        self.read()
            .get(call_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(call_id.to_string()))
    }

    fn transcript(&self, call_id: &str) -> Result<String, StoreError> {
        self.read()
            .get(call_id)
            .map(transcript::flatten)
            .ok_or_else(|| StoreError::NotFound(call_id.to_string()))
    }

    fn append_fragment(&self, call_id: &str, fragment: String) -> Result<usize, StoreError> {
        self.with_session(call_id, |session| {
            transcript::append(session, fragment);
            session.transcripts.len()
        })
    }

    fn record_analysis(&self, call_id: &str, analysis: AnalysisResult) -> Result<(), StoreError> {
        self.with_session(call_id, |session| session.analysis_history.push(analysis))
    }

    fn mark_ended(
        &self,
        call_id: &str,
        disposition: String,
        notes: Option<String>,
    ) -> Result<bool, StoreError> {
        self.with_session(call_id, |session| session.end(disposition, notes))
    }

    fn count_active(&self) -> usize {
        self.read().values().filter(|s| s.is_active()).count()
    }

    fn total_count(&self) -> usize {
        self.read().len()
    }
}
