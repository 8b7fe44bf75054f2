//! Turn Ledger is the ordered question/answer record embedded in every session.
//!
//! Invariants held by every `TurnLedger` value:
//! - `turns[i].index == i + 1` (no gaps, no reordering)
//! - at most one turn is `Pending`, and it is always the last one
//! - `current` is `Some(index)` exactly when that pending turn exists
//!
//! Ledgers loaded from storage go through `TurnLedger::from_turns`, which re-checks all three.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("question {index} is still awaiting an answer")]
    PendingTurn { index: u32 },

    #[error("no question is awaiting an answer")]
    NoPendingTurn,

    #[error("corrupt ledger: {0}")]
    Corrupt(String),
}

/// Evaluation of an answer as returned by the conversational agent.
/// The agent may send a score without text, or text without a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredTurn {
    pub answer: String,
    pub audio_ref: Option<String>,
    pub answered_at: DateTime<Utc>,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    Pending,
    Answered(AnsweredTurn),
}

/// One question and, once given, its answer.
///
/// Serialized through `TurnRecord`, the flat shape used both on the wire and in the
/// `turns` JSONB column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TurnRecord", try_from = "TurnRecord")]
pub struct Turn {
    pub index: u32,
    pub question: String,
    pub asked_at: DateTime<Utc>,
    pub state: TurnState,
}

impl Turn {
    pub fn is_pending(&self) -> bool {
        matches!(self.state, TurnState::Pending)
    }

    pub fn answered(&self) -> Option<&AnsweredTurn> {
        match &self.state {
            TurnState::Answered(a) => Some(a),
            TurnState::Pending => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub question_index: u32,
    pub question: String,
    pub answer: Option<String>,
    pub audio_file_url: Option<String>,
    pub question_timestamp: DateTime<Utc>,
    pub answer_timestamp: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub score: Option<i32>,
}

impl From<Turn> for TurnRecord {
    fn from(turn: Turn) -> Self {
        let mut record = TurnRecord {
            question_index: turn.index,
            question: turn.question,
            answer: None,
            audio_file_url: None,
            question_timestamp: turn.asked_at,
            answer_timestamp: None,
            feedback: None,
            score: None,
        };
        if let TurnState::Answered(a) = turn.state {
            record.answer = Some(a.answer);
            record.audio_file_url = a.audio_ref;
            record.answer_timestamp = Some(a.answered_at);
            if let Some(fb) = a.feedback {
                record.feedback = fb.feedback;
                record.score = fb.score;
            }
        }
        record
    }
}

impl TryFrom<TurnRecord> for Turn {
    type Error = LedgerError;

    fn try_from(record: TurnRecord) -> Result<Self, Self::Error> {
        let index = record.question_index;
        let state = match record.answer {
            None => {
                if record.answer_timestamp.is_some() || record.feedback.is_some() {
                    return Err(LedgerError::Corrupt(format!(
                        "turn {index} has answer details but no answer"
                    )));
                }
                TurnState::Pending
            }
            Some(answer) => {
                let answered_at = record.answer_timestamp.ok_or_else(|| {
                    LedgerError::Corrupt(format!("turn {index} is answered without a timestamp"))
                })?;
                let feedback = match (record.feedback, record.score) {
                    (None, None) => None,
                    (feedback, score) => Some(Feedback { feedback, score }),
                };
                TurnState::Answered(AnsweredTurn {
                    answer,
                    audio_ref: record.audio_file_url,
                    answered_at,
                    feedback,
                })
            }
        };
        Ok(Turn {
            index,
            question: record.question,
            asked_at: record.question_timestamp,
            state,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Turn>", try_from = "Vec<Turn>")]
pub struct TurnLedger {
    turns: Vec<Turn>,
    /// Index of the pending turn, if any.
    current: Option<u32>,
}

impl TurnLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from stored turns, rejecting any sequence that breaks the invariants.
    pub fn from_turns(turns: Vec<Turn>) -> Result<Self, LedgerError> {
        let mut current = None;
        for (pos, turn) in turns.iter().enumerate() {
            let expected = pos as u32 + 1;
            if turn.index != expected {
                return Err(LedgerError::Corrupt(format!(
                    "turn at position {pos} has index {}, expected {expected}",
                    turn.index
                )));
            }
            if turn.is_pending() {
                if pos + 1 != turns.len() {
                    return Err(LedgerError::Corrupt(format!(
                        "pending turn {expected} is not the last turn"
                    )));
                }
                current = Some(expected);
            }
        }
        Ok(Self { turns, current })
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn first(&self) -> Option<&Turn> {
        self.turns.first()
    }

    pub fn current(&self) -> Option<u32> {
        self.current
    }

    pub fn pending(&self) -> Option<&Turn> {
        self.current
            .and_then(|index| self.turns.get(index as usize - 1))
    }

    pub fn answered_count(&self) -> usize {
        self.turns.iter().filter(|t| !t.is_pending()).count()
    }

    /// Appends a new pending question. Fails while another question is still open.
    pub fn ask(&mut self, question: String, asked_at: DateTime<Utc>) -> Result<&Turn, LedgerError> {
        if let Some(index) = self.current {
            return Err(LedgerError::PendingTurn { index });
        }
        let index = self.turns.len() as u32 + 1;
        self.turns.push(Turn {
            index,
            question,
            asked_at,
            state: TurnState::Pending,
        });
        self.current = Some(index);
        Ok(&self.turns[index as usize - 1])
    }

    /// Closes the pending turn with the given answer.
    pub fn answer(&mut self, answer: AnsweredTurn) -> Result<&Turn, LedgerError> {
        let index = self.current.ok_or(LedgerError::NoPendingTurn)?;
        let turn = &mut self.turns[index as usize - 1];
        turn.state = TurnState::Answered(answer);
        self.current = None;
        Ok(&self.turns[index as usize - 1])
    }
}

impl TryFrom<Vec<Turn>> for TurnLedger {
    type Error = LedgerError;

    fn try_from(turns: Vec<Turn>) -> Result<Self, Self::Error> {
        Self::from_turns(turns)
    }
}

impl From<TurnLedger> for Vec<Turn> {
    fn from(ledger: TurnLedger) -> Self {
        ledger.turns
    }
}
