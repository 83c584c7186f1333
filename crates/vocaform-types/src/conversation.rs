//! Persisted per-conversation state.
//!
//! A `ConversationState` is created when a conversation starts, mutated only
//! by the state machine in `vocaform-conversation`, and archived when the
//! conversation completes or is abandoned.

use crate::{AnswerRecord, Message, Question, Role, SkipReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State machine phase.
///
/// Between turns a live conversation sits in one of the awaiting-input
/// phases (`Questioning`, `Rephrasing`, `FollowingUp`). `Validating`,
/// `Advancing` and `Closing` only exist while a turn is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Opening,
    Questioning,
    Validating,
    Rephrasing,
    FollowingUp,
    Advancing,
    Closing,
    Complete,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Questioning => "questioning",
            Self::Validating => "validating",
            Self::Rephrasing => "rephrasing",
            Self::FollowingUp => "following_up",
            Self::Advancing => "advancing",
            Self::Closing => "closing",
            Self::Complete => "complete",
        }
    }

    /// Returns `true` if the conversation is waiting for a user turn.
    pub fn is_awaiting_input(self) -> bool {
        matches!(self, Self::Questioning | Self::Rephrasing | Self::FollowingUp)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the state machine knows about one in-progress form response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: String,
    pub form_id: String,
    pub response_id: String,
    /// Snapshot of the form's questions, ordered.
    pub questions: Vec<Question>,
    /// Never decreases; frozen once `is_complete` is set.
    pub current_question_index: usize,
    /// Keyed by question ID. Re-answering overwrites.
    pub answers: BTreeMap<String, AnswerRecord>,
    pub start_time: DateTime<Utc>,
    pub history: Vec<Message>,
    /// Reason behind the most recent follow-up on the current question.
    #[serde(default)]
    pub follow_up_context: Option<String>,
    /// The form's closing message, captured when the conversation opens.
    #[serde(default)]
    pub closing_message: Option<String>,
    pub phase: Phase,
    /// Rephrases and follow-ups spent on the current question.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between `start_time` and completion.
    #[serde(default)]
    pub completion_seconds: Option<i64>,
    pub last_activity: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(
        conversation_id: impl Into<String>,
        form_id: impl Into<String>,
        response_id: impl Into<String>,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            form_id: form_id.into(),
            response_id: response_id.into(),
            questions,
            current_question_index: 0,
            answers: BTreeMap::new(),
            start_time: now,
            history: Vec::new(),
            follow_up_context: None,
            closing_message: None,
            phase: Phase::Opening,
            attempts: 0,
            is_complete: false,
            completed_at: None,
            completion_seconds: None,
            last_activity: now,
        }
    }

    /// The question the pointer is on, if the index is in range.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    pub fn is_last_question(&self) -> bool {
        self.current_question_index + 1 >= self.questions.len()
    }

    /// Appends to the history and bumps `last_activity`.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>, now: DateTime<Utc>) {
        self.history.push(Message::new(role, content, now));
        self.last_activity = now;
    }

    /// Stores an answer, replacing any earlier record for the same question.
    pub fn record_answer(&mut self, record: AnswerRecord) {
        self.answers.insert(record.question_id.clone(), record);
    }

    /// IDs of required questions that still have no answer record.
    pub fn missing_required(&self) -> Vec<&str> {
        self.questions
            .iter()
            .filter(|q| q.required && !self.answers.contains_key(&q.id))
            .map(|q| q.id.as_str())
            .collect()
    }

    /// IDs of questions skipped because the retry cap was reached.
    pub fn skipped_questions(&self) -> Vec<&str> {
        self.answers
            .values()
            .filter(|a| {
                a.processed_value == crate::AnswerValue::Skipped(SkipReason::RetriesExhausted)
            })
            .map(|a| a.question_id.as_str())
            .collect()
    }
}
