//! Sentiment enrichment for free-text answers.
//!
//! Scoring is best effort. Callers log a [`SentimentError`] and carry on
//! without a score; it never changes whether an answer is accepted.

use crate::error::SentimentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

/// A sentiment reading. `score` runs from 0.0 (most negative) to 1.0 (most
/// positive), 0.5 being neutral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f32,
}

impl Sentiment {
    /// Builds a reading from a score, deriving the label.
    pub fn from_score(score: f32) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let label = if score >= 0.6 {
            SentimentLabel::Positive
        } else if score <= 0.4 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };
        Self { label, score }
    }

    /// The score on the 0–100 scale stored on answer records.
    pub fn as_percent(&self) -> u8 {
        (self.score.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<Sentiment, SentimentError>;
}

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "awesome", "love", "loved", "like", "liked",
    "happy", "helpful", "friendly", "fast", "easy", "perfect", "fantastic", "wonderful",
    "nice", "pleased", "satisfied", "recommend", "best", "enjoyed", "smooth", "clean",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "horrible", "hate", "hated", "slow", "rude", "poor",
    "broken", "worst", "disappointed", "disappointing", "annoying", "angry", "unhappy",
    "difficult", "hard", "confusing", "dirty", "expensive", "late", "useless", "problem",
    "problems",
];

const NEGATORS: &[&str] = &["not", "never", "no", "hardly", "isn't", "wasn't", "don't", "didn't"];

/// Word-list scorer with simple one-word negation ("not good" counts as
/// negative).
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`SentimentScorer::score`].
    pub fn score_text(&self, text: &str) -> Result<Sentiment, SentimentError> {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !(c.is_alphanumeric() || c == '\''))
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(SentimentError::EmptyInput);
        }

        let mut positive = 0u32;
        let mut negative = 0u32;
        for (i, token) in tokens.iter().enumerate() {
            let negated = i > 0 && NEGATORS.contains(&tokens[i - 1].as_str());
            let polarity = if POSITIVE_WORDS.contains(&token.as_str()) {
                1
            } else if NEGATIVE_WORDS.contains(&token.as_str()) {
                -1
            } else {
                0
            };
            match (polarity, negated) {
                (1, false) | (-1, true) => positive += 1,
                (-1, false) | (1, true) => negative += 1,
                _ => {}
            }
        }

        let hits = positive + negative;
        if hits == 0 {
            return Ok(Sentiment::from_score(0.5));
        }
        let balance = (positive as f32 - negative as f32) / hits as f32;
        Ok(Sentiment::from_score(0.5 + 0.5 * balance))
    }
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    async fn score(&self, text: &str) -> Result<Sentiment, SentimentError> {
        self.score_text(text)
    }
}
