//! Interpreter output and validator decisions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use vocaform_types::AnswerValue;

/// Typed value extracted from an utterance, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CandidateValue {
    Text(String),
    Number(f64),
    Choice(String),
    /// Already clamped by the rule interpreter; other interpreters may not.
    Rating(i64),
    Date(NaiveDate),
    /// Nothing usable could be extracted.
    Unrecognized,
}

/// Interpreter output for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub value: CandidateValue,
    /// 0.0 (pure guess) to 1.0 (exact).
    pub confidence: f32,
    pub raw_text: String,
}

impl Candidate {
    pub fn new(value: CandidateValue, confidence: f32, raw_text: impl Into<String>) -> Self {
        Self {
            value,
            confidence: confidence.clamp(0.0, 1.0),
            raw_text: raw_text.into(),
        }
    }

    pub fn unrecognized(raw_text: impl Into<String>) -> Self {
        Self::new(CandidateValue::Unrecognized, 0.0, raw_text)
    }
}

/// What the validator wants the state machine to do with a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accept(AnswerValue),
    Reject(String),
    NeedsFollowUp(String),
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Accept(_) => DecisionKind::Accept,
            Self::Reject(_) => DecisionKind::Reject,
            Self::NeedsFollowUp(_) => DecisionKind::FollowUp,
        }
    }
}

/// Payload-free view of a [`Decision`], for logging and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Accept,
    Reject,
    FollowUp,
}

impl DecisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::FollowUp => "follow_up",
        }
    }
}
