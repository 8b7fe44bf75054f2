/// AI service client is the single point of entry for transcription and interview-agent calls.
///
/// The orchestrator never talks HTTP directly; it depends on the `Transcriber` and
/// `ConversationalAgent` traits below. `AiServiceClient` implements both against the AI
/// service's `/api/v1/ai` endpoints.
///
/// The agent keeps its own conversation memory keyed by the conversation id, which is
/// always the interview session id.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::session::ledger::Feedback;

const API_PREFIX: &str = "/api/v1/ai";
const MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("AI service unavailable after {retries} attempts")]
    Unavailable { retries: u32 },

    #[error("AI service returned an empty reply")]
    EmptyReply,
}

/// Conversation settings passed to the agent when an interview begins.
#[derive(Debug, Clone, Copy)]
pub struct ConversationConfig<'a> {
    pub experience_level: &'a str,
    pub language: &'a str,
}

/// The agent's response to a candidate answer.
/// A missing or blank `question` means the agent has ended the conversation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentReply {
    #[serde(default)]
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub question: Option<String>,
}

impl AgentReply {
    pub fn next_question(&self) -> Option<&str> {
        self.question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct StartReply {
    question: Option<String>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_ref: &str) -> Result<String, AiError>;
}

#[async_trait]
pub trait ConversationalAgent: Send + Sync {
    /// Opens the conversation and returns the first question.
    async fn begin(
        &self,
        conversation_id: Uuid,
        config: ConversationConfig<'_>,
    ) -> Result<String, AiError>;

    /// Sends the candidate's answer; returns feedback on it and the next question.
    async fn reply(&self, conversation_id: Uuid, answer: &str) -> Result<AgentReply, AiError>;
}

#[derive(Clone)]
pub struct AiServiceClient {
    client: Client,
    base_url: String,
    retry_base: Duration,
}

impl AiServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build AI service HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// Overrides the first backoff delay (doubled on each further attempt).
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    /// Sends a request built by `build`, retrying transport errors, 429 and 5xx responses
    /// with exponential backoff. Other non-success statuses fail immediately.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, AiError> {
        let mut last_error: Option<AiError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_base * (1 << (attempt - 1));
                warn!(
                    "AI service call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AiError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("AI service returned {}: {}", status, body);
                last_error = Some(AiError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(AiError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(AiError::Unavailable {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl Transcriber for AiServiceClient {
    async fn transcribe(&self, audio_ref: &str) -> Result<String, AiError> {
        let url = self.endpoint("/transcribe");
        let response = self
            .send(|| self.client.get(&url).query(&[("filePath", audio_ref)]))
            .await?;

        let text = response.text().await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AiError::EmptyReply);
        }
        debug!("Transcribed {audio_ref}: {} chars", text.len());
        Ok(text.to_string())
    }
}

#[async_trait]
impl ConversationalAgent for AiServiceClient {
    async fn begin(
        &self,
        conversation_id: Uuid,
        config: ConversationConfig<'_>,
    ) -> Result<String, AiError> {
        let url = self.endpoint("/interview/start");
        let conversation_id = conversation_id.to_string();
        let response = self
            .send(|| {
                self.client.post(&url).query(&[
                    ("conversationId", conversation_id.as_str()),
                    ("experienceLevel", config.experience_level),
                    ("language", config.language),
                ])
            })
            .await?;

        let reply: StartReply = response.json().await?;
        reply
            .question
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or(AiError::EmptyReply)
    }

    async fn reply(&self, conversation_id: Uuid, answer: &str) -> Result<AgentReply, AiError> {
        let url = self.endpoint("/interview/answer");
        let conversation_id = conversation_id.to_string();
        let response = self
            .send(|| {
                self.client.post(&url).query(&[
                    ("conversationId", conversation_id.as_str()),
                    ("answer", answer),
                ])
            })
            .await?;

        Ok(response.json().await?)
    }
}
