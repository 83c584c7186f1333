//! Answer interpretation and validation for Vocaform conversations.
//!
//! Turns what a respondent said into a typed answer for the current
//! question, in two steps:
//!
//! 1. **Interpretation.** An [`AnswerInterpreter`] extracts a typed
//!    [`Candidate`] from the utterance. [`RuleInterpreter`] is the built-in
//!    implementation; it never fails on user input, only on a broken
//!    question (a multiple-choice question without options).
//! 2. **Validation.** The [`Validator`] applies the per-type acceptance rule
//!    and returns a [`Decision`]: accept, reject (ask to rephrase), or ask a
//!    clarifying follow-up.
//!
//! # Acceptance rules
//!
//! | Type | Accepted when |
//! |------|---------------|
//! | `text` | non-empty after trimming |
//! | `number` | parses as a finite number |
//! | `multiple_choice` | case-insensitively equal to a listed option |
//! | `rating` | always; clamped into 1..=5, default 3 |
//! | `date` | a calendar date was recognised |
//!
//! What happens when a choice answer matches no option is governed by
//! [`NoMatchPolicy`](vocaform_types::NoMatchPolicy).
//!
//! Free-text answers can additionally be scored by a [`SentimentScorer`].
//! Scoring never affects acceptance.

pub mod error;
pub mod interpret;
pub mod parse;
pub mod sentiment;
pub mod types;
pub mod validation;

pub use error::{AnswerError, SentimentError};
pub use interpret::{
    clamp_rating, AnswerInterpreter, RuleInterpreter, RATING_DEFAULT, RATING_MAX, RATING_MIN,
};
pub use sentiment::{LexiconScorer, Sentiment, SentimentLabel, SentimentScorer};
pub use types::{Candidate, CandidateValue, Decision, DecisionKind};
pub use validation::Validator;

#[cfg(test)]
mod tests;
