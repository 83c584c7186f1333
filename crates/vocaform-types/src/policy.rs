//! Conversation policy configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do when a `multiple_choice` utterance matches no option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchPolicy {
    /// Guess the first option with low confidence and accept it.
    FirstOption,
    /// Reject the answer and ask the user to rephrase.
    #[default]
    Reject,
    /// Ask a follow-up that lists the options, without counting a rephrase.
    FollowUp,
}

impl NoMatchPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstOption => "first_option",
            Self::Reject => "reject",
            Self::FollowUp => "follow_up",
        }
    }
}

/// Error returned when parsing an unknown no-match policy label.
#[derive(Debug, Clone, Error)]
#[error("unknown no-match policy: {0}")]
pub struct ParseNoMatchPolicyError(pub String);

impl std::str::FromStr for NoMatchPolicy {
    type Err = ParseNoMatchPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_option" => Ok(Self::FirstOption),
            "reject" => Ok(Self::Reject),
            "follow_up" => Ok(Self::FollowUp),
            _ => Err(ParseNoMatchPolicyError(s.to_string())),
        }
    }
}

/// How a `multiple_choice` utterance is searched for an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceMatch {
    /// Case-insensitive substring: "nope" selects "No".
    #[default]
    Substring,
    /// The option's words must appear as whole words: "I don't know" does
    /// not select "No".
    WholeWord,
}

impl ChoiceMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::WholeWord => "whole_word",
        }
    }
}

/// Error returned when parsing an unknown choice match mode.
#[derive(Debug, Clone, Error)]
#[error("unknown choice match mode: {0}")]
pub struct ParseChoiceMatchError(pub String);

impl std::str::FromStr for ChoiceMatch {
    type Err = ParseChoiceMatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "substring" => Ok(Self::Substring),
            "whole_word" => Ok(Self::WholeWord),
            _ => Err(ParseChoiceMatchError(s.to_string())),
        }
    }
}

/// Tunables for the conversation state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationPolicy {
    /// Rephrase/follow-up attempts allowed per question before it is skipped.
    pub max_retries: u32,
    /// Behaviour for unmatched multiple-choice answers.
    #[serde(default)]
    pub no_match: NoMatchPolicy,
    /// How options are located inside a `multiple_choice` utterance.
    #[serde(default)]
    pub choice_match: ChoiceMatch,
    /// Free-text answers shorter than this are not sentiment-scored.
    pub sentiment_min_chars: usize,
    /// Conversations idle for longer than this are archived as abandoned.
    pub inactivity_ttl_seconds: u64,
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            no_match: NoMatchPolicy::default(),
            choice_match: ChoiceMatch::default(),
            sentiment_min_chars: 10,
            inactivity_ttl_seconds: 30 * 60,
        }
    }
}
