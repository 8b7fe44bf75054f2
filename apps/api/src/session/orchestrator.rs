//! Session Orchestrator: drives the ACTIVE → COMPLETED lifecycle and every turn transition.
//!
//! Each operation is read → validate → (collaborator calls) → mutate in memory → one
//! version-checked write. Nothing reaches the store until every collaborator call for the
//! request has succeeded, so a failed transcription or agent call leaves the ledger as it was.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai_client::{ConversationConfig, ConversationalAgent, Transcriber};
use crate::session::clock::Clock;
use crate::session::errors::SessionError;
use crate::session::ledger::{AnsweredTurn, Feedback};
use crate::session::listing::{list_sessions, ListQuery, SessionSummary};
use crate::session::model::{InterviewSession, NewSession, SessionDetails, SessionStatus};
use crate::session::store::SessionStore;

/// Minimum interview length before a non-forced end is accepted: 30 minutes plus a
/// 30 second grace for clock and network skew.
pub const DEFAULT_MIN_SESSION_SECS: i64 = 30 * 60 + 30;

/// Longest configurable minimum session length.
pub const MAX_MIN_SESSION_SECS: i64 = 24 * 60 * 60;

/// Result of one answer submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_index: u32,
    pub question: String,
    pub answer: String,
    pub total_questions_answered: usize,
    pub session_status: SessionStatus,
    pub feedback: Option<Feedback>,
    pub next_question: Option<String>,
}

#[derive(Clone)]
pub struct SessionOrchestrator {
    store: Arc<dyn SessionStore>,
    transcriber: Arc<dyn Transcriber>,
    agent: Arc<dyn ConversationalAgent>,
    clock: Arc<dyn Clock>,
    min_duration: Duration,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        transcriber: Arc<dyn Transcriber>,
        agent: Arc<dyn ConversationalAgent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            transcriber,
            agent,
            clock,
            min_duration: Duration::seconds(DEFAULT_MIN_SESSION_SECS),
        }
    }

    /// Negative durations are treated as zero.
    pub fn with_min_duration(mut self, min_duration: Duration) -> Self {
        self.min_duration = min_duration.max(Duration::zero());
        self
    }

    async fn load(&self, session_id: Uuid) -> Result<InterviewSession, SessionError> {
        self.store
            .get(session_id)
            .await?
            .ok_or(SessionError::SessionNotFound(session_id))
    }

    async fn persist(&self, session: &mut InterviewSession) -> Result<(), SessionError> {
        session.version = self.store.update(session).await?;
        Ok(())
    }

    fn ensure_active(session: &InterviewSession) -> Result<(), SessionError> {
        if session.is_active() {
            Ok(())
        } else {
            Err(SessionError::InvalidState(format!(
                "Session {} is in {} state. Expected state: ACTIVE",
                session.id, session.status
            )))
        }
    }

    pub async fn start_session(
        &self,
        user_id: &str,
        experience_level: &str,
        language: &str,
    ) -> Result<InterviewSession, SessionError> {
        for (name, value) in [
            ("userId", user_id),
            ("experienceLevel", experience_level),
            ("language", language),
        ] {
            if value.trim().is_empty() {
                return Err(SessionError::Validation(format!("{name} must not be blank")));
            }
        }

        if self.store.find_active_by_user(user_id).await?.is_some() {
            warn!("User {user_id} tried to start a second active session");
            return Err(SessionError::SessionConflict(user_id.to_string()));
        }

        let session = self
            .store
            .insert(NewSession {
                user_id: user_id.to_string(),
                experience_level: experience_level.trim().to_string(),
                language: language.trim().to_string(),
                start_time: self.clock.now(),
            })
            .await?;

        info!(
            "Started session {} for user {} ({} / {})",
            session.id, session.user_id, session.experience_level, session.language
        );
        Ok(session)
    }

    /// Returns the opening question, asking the agent for it on first call only.
    pub async fn get_first_question(&self, session_id: Uuid) -> Result<String, SessionError> {
        let mut session = self.load(session_id).await?;
        Self::ensure_active(&session)?;

        if let Some(first) = session.ledger.first() {
            return Ok(first.question.clone());
        }

        let question = self
            .agent
            .begin(
                session.id,
                ConversationConfig {
                    experience_level: &session.experience_level,
                    language: &session.language,
                },
            )
            .await
            .map_err(|e| SessionError::Agent(e.to_string()))?;

        let asked_at = self.clock.now();
        session
            .ledger
            .ask(question.clone(), asked_at)
            .map_err(|e| SessionError::InvalidState(e.to_string()))?;
        self.persist(&mut session).await?;

        info!("Session {session_id}: asked question 1");
        Ok(question)
    }

    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        audio_ref: &str,
    ) -> Result<AnswerSubmission, SessionError> {
        let mut session = self.load(session_id).await?;
        Self::ensure_active(&session)?;

        if session.ledger.is_empty() {
            return Err(SessionError::InvalidState(
                "No question found to answer. Get a question first.".to_string(),
            ));
        }
        if session.ledger.pending().is_none() {
            return Err(SessionError::AnswerAlreadySubmitted(session_id));
        }

        let answer = self
            .transcriber
            .transcribe(audio_ref)
            .await
            .map_err(|e| SessionError::Transcription(e.to_string()))?;
        let answered_at = self.clock.now();

        let reply = self
            .agent
            .reply(session.id, &answer)
            .await
            .map_err(|e| SessionError::Agent(e.to_string()))?;
        let next_question = reply.next_question().map(str::to_string);

        let answered = session
            .ledger
            .answer(AnsweredTurn {
                answer: answer.clone(),
                audio_ref: Some(audio_ref.to_string()),
                answered_at,
                feedback: reply.feedback.clone(),
            })
            .map_err(|e| SessionError::InvalidState(e.to_string()))?;
        let question_index = answered.index;
        let question = answered.question.clone();

        if let Some(next) = &next_question {
            let asked_at = self.clock.now();
            session
                .ledger
                .ask(next.clone(), asked_at)
                .map_err(|e| SessionError::InvalidState(e.to_string()))?;
        }

        self.persist(&mut session).await?;

        info!(
            "Session {session_id}: recorded answer to question {question_index}{}",
            if next_question.is_some() {
                ""
            } else {
                " (agent ended the conversation)"
            }
        );

        Ok(AnswerSubmission {
            question_index,
            question,
            answer,
            total_questions_answered: session.ledger.answered_count(),
            session_status: session.status,
            feedback: reply.feedback,
            next_question,
        })
    }

    /// Ends the session. Ending an already COMPLETED session returns it unchanged.
    /// Without `force`, the session must have run for at least the minimum duration.
    pub async fn end_session(
        &self,
        session_id: Uuid,
        force: bool,
    ) -> Result<InterviewSession, SessionError> {
        let mut session = self.load(session_id).await?;

        if session.status == SessionStatus::Completed {
            return Ok(session);
        }

        let now = self.clock.now();
        if !force {
            let elapsed = now.signed_duration_since(session.start_time);
            if elapsed < self.min_duration {
                let remaining = self
                    .min_duration
                    .checked_sub(&elapsed)
                    .unwrap_or(self.min_duration);
                return Err(SessionError::SessionTimeNotCompleted {
                    remaining_minutes: remaining.num_minutes(),
                });
            }
        }

        session.complete(now);
        self.persist(&mut session).await?;

        info!(
            "Ended session {} for user {} after {} answered questions (force={force})",
            session.id,
            session.user_id,
            session.ledger.answered_count()
        );
        Ok(session)
    }

    pub async fn get_session_details(
        &self,
        session_id: Uuid,
    ) -> Result<SessionDetails, SessionError> {
        let session = self.load(session_id).await?;
        Ok(SessionDetails::from(&session))
    }

    pub async fn list_sessions(
        &self,
        user_id: &str,
        query: ListQuery,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        list_sessions(self.store.as_ref(), user_id, query).await
    }
}
