//! In-process collaborator fakes shared by unit and router tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::ai_client::{AgentReply, AiError, ConversationConfig, ConversationalAgent, Transcriber};
use crate::intake::{AudioStore, IntakeError};
use crate::session::clock::Clock;

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl Default for ManualClock {
    fn default() -> Self {
        Self(Mutex::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 14, 0, 0).unwrap(),
        ))
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub struct FakeTranscriber {
    text: String,
    fail_next: AtomicBool,
    calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail_next: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio_ref: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AiError::Api {
                status: 500,
                message: "whisper timeout".to_string(),
            });
        }
        Ok(self.text.clone())
    }
}

/// Agent that opens with a fixed question and then plays back queued replies.
/// With an empty queue it ends the conversation.
pub struct ScriptedAgent {
    first_question: String,
    replies: Mutex<VecDeque<Result<AgentReply, String>>>,
    began_with: Mutex<Vec<(Uuid, String, String)>>,
    answers: Mutex<Vec<(Uuid, String)>>,
}

impl ScriptedAgent {
    pub fn new(first_question: &str) -> Self {
        Self {
            first_question: first_question.to_string(),
            replies: Mutex::new(VecDeque::new()),
            began_with: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: Result<AgentReply, String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn begin_calls(&self) -> usize {
        self.began_with.lock().unwrap().len()
    }

    pub fn began_with(&self) -> Vec<(Uuid, String, String)> {
        self.began_with.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<(Uuid, String)> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationalAgent for ScriptedAgent {
    async fn begin(
        &self,
        conversation_id: Uuid,
        config: ConversationConfig<'_>,
    ) -> Result<String, AiError> {
        self.began_with.lock().unwrap().push((
            conversation_id,
            config.experience_level.to_string(),
            config.language.to_string(),
        ));
        Ok(self.first_question.clone())
    }

    async fn reply(&self, conversation_id: Uuid, answer: &str) -> Result<AgentReply, AiError> {
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Err(message)) => Err(AiError::Api {
                status: 503,
                message,
            }),
            Some(Ok(reply)) => {
                self.answers
                    .lock()
                    .unwrap()
                    .push((conversation_id, answer.to_string()));
                Ok(reply)
            }
            None => {
                self.answers
                    .lock()
                    .unwrap()
                    .push((conversation_id, answer.to_string()));
                Ok(AgentReply::default())
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryAudioStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryAudioStore {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl AudioStore for MemoryAudioStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<String, IntakeError> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(format!("memory://{key}"))
    }
}
