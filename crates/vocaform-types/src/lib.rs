//! Shared types for the Vocaform platform.
//!
//! This crate provides the data model used across all Vocaform crates:
//! forms and their questions, conversation messages, answer records, the
//! persisted conversation state, and the conversation policy knobs.
//!
//! No crate in the workspace depends on anything *except* `vocaform-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod conversation;
mod policy;

pub use conversation::{ConversationState, Phase};
pub use policy::{ChoiceMatch, ConversationPolicy, NoMatchPolicy};

/// The kind of answer a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Free-form text.
    Text,
    /// One of a fixed list of options.
    MultipleChoice,
    /// An integer rating from 1 to 5.
    Rating,
    /// A calendar date.
    Date,
    /// A finite number.
    Number,
}

impl QuestionType {
    /// Returns the canonical string label for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::MultipleChoice => "multiple_choice",
            Self::Rating => "rating",
            Self::Date => "date",
            Self::Number => "number",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown question type label.
#[derive(Debug, Clone, Error)]
#[error("unknown question type: {0}")]
pub struct ParseQuestionTypeError(pub String);

impl std::str::FromStr for QuestionType {
    type Err = ParseQuestionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "multiple_choice" => Ok(Self::MultipleChoice),
            "rating" => Ok(Self::Rating),
            "date" => Ok(Self::Date),
            "number" => Ok(Self::Number),
            _ => Err(ParseQuestionTypeError(s.to_string())),
        }
    }
}

fn default_required() -> bool {
    true
}

/// A single form question.
///
/// Questions are immutable once a conversation references them; the
/// conversation state keeps its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier of the question within its form.
    pub id: String,
    /// The question as shown or spoken to the user.
    pub text: String,
    /// Expected answer type.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Ordered options for `multiple_choice` questions.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    /// Whether the form cannot complete without an answer.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Position of the question within the form.
    #[serde(default)]
    pub order: i64,
}

impl Question {
    /// Returns the option list, or an empty slice when none is configured.
    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }
}

/// A form definition as handed to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Unique public ID for the form.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Message spoken once when a conversation opens.
    #[serde(default)]
    pub opening_message: Option<String>,
    /// Message spoken once when a conversation closes.
    #[serde(default)]
    pub closing_message: Option<String>,
    /// Questions ordered by `order`.
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Creation timestamp (ISO 8601), when persisted.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
    User,
}

/// One entry of a conversation history. History is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::Assistant, content, timestamp)
    }
}

/// Why a question ended up without a real answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// An optional question was answered with nothing.
    Declined,
    /// The retry cap was reached without an acceptable answer.
    RetriesExhausted,
}

/// A validated, typed answer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Number(f64),
    Choice(String),
    Rating(u8),
    Date(NaiveDate),
    Skipped(SkipReason),
}

impl AnswerValue {
    /// Returns `true` for either kind of skip marker.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Choice(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Rating(r) => write!(f, "{r}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Skipped(SkipReason::Declined) => f.write_str("(declined)"),
            Self::Skipped(SkipReason::RetriesExhausted) => f.write_str("(skipped)"),
        }
    }
}

/// The durable answer for one question within one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    /// The utterance exactly as received (post-transcription).
    pub raw_value: String,
    pub processed_value: AnswerValue,
    /// Transcript of the audio turn that produced this answer, if any.
    #[serde(default)]
    pub transcription: Option<String>,
    /// Sentiment on a 0–100 scale, when enrichment succeeded.
    #[serde(default)]
    pub sentiment_score: Option<u8>,
    pub answered_at: DateTime<Utc>,
}
