use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::session::ledger::TurnLedger;
use crate::session::model::{InterviewSession, NewSession, SessionStatus};
use crate::session::store::{PageRequest, SessionStore, StoreError};

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub user_id: String,
    pub experience_level: String,
    pub language: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub turns: Value,
    pub version: i64,
}

impl TryFrom<SessionRow> for InterviewSession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status: SessionStatus = row.status.parse().map_err(StoreError::Corrupt)?;
        if (status == SessionStatus::Completed) != row.end_time.is_some() {
            return Err(StoreError::Corrupt(format!(
                "session {} is {status} but end_time is {:?}",
                row.id, row.end_time
            )));
        }
        let ledger: TurnLedger = serde_json::from_value(row.turns)
            .map_err(|e| StoreError::Corrupt(format!("session {}: {e}", row.id)))?;

        Ok(InterviewSession {
            id: row.id,
            user_id: row.user_id,
            experience_level: row.experience_level,
            language: row.language,
            status,
            start_time: row.start_time,
            end_time: row.end_time,
            ledger,
            version: row.version,
        })
    }
}

/// PostgreSQL-backed session store. The one-active-session rule is enforced by the
/// partial unique index `interview_sessions_one_active_per_user`.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn ledger_json(ledger: &TurnLedger) -> Result<Value, StoreError> {
    serde_json::to_value(ledger).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn map_unique_violation(err: sqlx::Error, user_id: &str) -> StoreError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::ActiveSessionExists(user_id.to_string())
        }
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, new: NewSession) -> Result<InterviewSession, StoreError> {
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

        sqlx::query(
            r#"
            INSERT INTO interview_sessions
                (id, user_id, experience_level, language, status, start_time, end_time, turns, version)
            VALUES ($1, $2, $3, $4, $5, $6, NULL, $7, $8)
            "#,
        )
        .bind(session.id)
        .bind(&session.user_id)
        .bind(&session.experience_level)
        .bind(&session.language)
        .bind(session.status.as_str())
        .bind(session.start_time)
        .bind(ledger_json(&session.ledger)?)
        .bind(session.version)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &session.user_id))?;

        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<InterviewSession>, StoreError> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM interview_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(InterviewSession::try_from)
            .transpose()
    }

    async fn update(&self, session: &InterviewSession) -> Result<i64, StoreError> {
        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE interview_sessions
            SET status = $1, end_time = $2, turns = $3, version = version + 1
            WHERE id = $4 AND version = $5
            RETURNING version
            "#,
        )
        .bind(session.status.as_str())
        .bind(session.end_time)
        .bind(ledger_json(&session.ledger)?)
        .bind(session.id)
        .bind(session.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &session.user_id))?;

        if let Some(version) = new_version {
            debug!("Session {} written at version {version}", session.id);
            return Ok(version);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM interview_sessions WHERE id = $1)")
                .bind(session.id)
                .fetch_one(&self.pool)
                .await?;

        Err(if exists {
            StoreError::VersionConflict {
                id: session.id,
                expected: session.version,
            }
        } else {
            StoreError::NotFound(session.id)
        })
    }

    async fn find_active_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<InterviewSession>, StoreError> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM interview_sessions WHERE user_id = $1 AND status = 'ACTIVE' LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(InterviewSession::try_from)
        .transpose()
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        page: Option<PageRequest>,
    ) -> Result<Vec<InterviewSession>, StoreError> {
        let rows = match page {
            Some(p) => {
                sqlx::query_as::<_, SessionRow>(
                    r#"
                    SELECT * FROM interview_sessions
                    WHERE user_id = $1
                    ORDER BY start_time DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(user_id)
                .bind(p.size as i64)
                .bind(p.offset() as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SessionRow>(
                    "SELECT * FROM interview_sessions WHERE user_id = $1 ORDER BY start_time DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(InterviewSession::try_from).collect()
    }
}
