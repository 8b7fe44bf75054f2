use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::ledger::{Turn, TurnLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(SessionStatus::Active),
            "COMPLETED" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// A timed interview conversation. Root aggregate; every write goes through
/// `SessionOrchestrator`.
///
/// `version` is bumped by the store on each successful update and is the basis of
/// optimistic concurrency: a write carrying a stale version is rejected. It stays server-side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    pub id: Uuid,
    pub user_id: String,
    pub experience_level: String,
    pub language: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "questionAnswers")]
    pub ledger: TurnLedger,
    #[serde(skip)]
    pub version: i64,
}

impl InterviewSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Marks the session COMPLETED. `end_time` and status always change together.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = SessionStatus::Completed;
        self.end_time = Some(at);
    }
}

/// Everything the store needs to create a session; the store assigns `id` and `version`.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub experience_level: String,
    pub language: String,
    pub start_time: DateTime<Utc>,
}

/// Full read-only projection of a session for post-interview review.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    pub session_id: Uuid,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub experience_level: String,
    pub language: String,
    pub question_answers: Vec<Turn>,
}

impl From<&InterviewSession> for SessionDetails {
    fn from(session: &InterviewSession) -> Self {
        Self {
            session_id: session.id,
            user_id: session.user_id.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            status: session.status,
            experience_level: session.experience_level.clone(),
            language: session.language.clone(),
            question_answers: session.ledger.turns().to_vec(),
        }
    }
}
