//! Session Store is the durable source of truth for interview sessions.
//!
//! `SessionStore` is the seam between the orchestrator and storage. Backends:
//! - `PgSessionStore` (production, see `pg_store.rs`)
//! - `InMemorySessionStore` (tests and local runs without `DATABASE_URL`)
//!
//! Both backends enforce the same two rules:
//! 1. `update` succeeds only if the caller's `version` matches the stored one.
//! 2. A user never has two ACTIVE sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::model::{InterviewSession, NewSession, SessionStatus};
use crate::session::ledger::TurnLedger;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    #[error("session {id} was modified concurrently (expected version {expected})")]
    VersionConflict { id: Uuid, expected: i64 },

    #[error("user {0} already has an active session")]
    ActiveSessionExists(String),

    #[error("stored session is corrupt: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Zero-based page window applied by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new ACTIVE session with an empty ledger and returns it with its assigned id.
    async fn insert(&self, new: NewSession) -> Result<InterviewSession, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<InterviewSession>, StoreError>;

    /// Writes the whole session if `session.version` is still current. Returns the new version.
    async fn update(&self, session: &InterviewSession) -> Result<i64, StoreError>;

    async fn find_active_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<InterviewSession>, StoreError>;

    /// Sessions of a user, newest `start_time` first, optionally windowed.
    async fn list_by_user(
        &self,
        user_id: &str,
        page: Option<PageRequest>,
    ) -> Result<Vec<InterviewSession>, StoreError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, InterviewSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, new: NewSession) -> Result<InterviewSession, StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions
            .values()
            .any(|s| s.user_id == new.user_id && s.is_active())
        {
            return Err(StoreError::ActiveSessionExists(new.user_id));
        }

        let session = InterviewSession {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            experience_level: new.experience_level,
            language: new.language,
            status: SessionStatus::Active,
            start_time: new.start_time,
            end_time: None,
            ledger: TurnLedger::new(),
            version: 1,
        };
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<InterviewSession>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn update(&self, session: &InterviewSession) -> Result<i64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get(&session.id)
            .ok_or(StoreError::NotFound(session.id))?;

        if stored.version != session.version {
            return Err(StoreError::VersionConflict {
                id: session.id,
                expected: session.version,
            });
        }
        if session.is_active()
            && sessions
                .values()
                .any(|s| s.id != session.id && s.user_id == session.user_id && s.is_active())
        {
            return Err(StoreError::ActiveSessionExists(session.user_id.clone()));
        }

        let mut next = session.clone();
        next.version += 1;
        let version = next.version;
        sessions.insert(next.id, next);
        Ok(version)
    }

    async fn find_active_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<InterviewSession>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.user_id == user_id && s.is_active())
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        page: Option<PageRequest>,
    ) -> Result<Vec<InterviewSession>, StoreError> {
        let mut matching: Vec<InterviewSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        Ok(match page {
            Some(p) => matching
                .into_iter()
                .skip(p.offset() as usize)
                .take(p.size as usize)
                .collect(),
            None => matching,
        })
    }
}
