//! Answer interpretation: utterance + question → typed candidate.
//!
//! [`AnswerInterpreter`] is the seam for alternative backends (for example a
//! model-backed interpreter reached over the network). [`RuleInterpreter`]
//! is the built-in, deterministic implementation.

use crate::error::AnswerError;
use crate::parse::{contains_phrase, first_digit_run, first_number_word, parse_date};
use crate::types::{Candidate, CandidateValue};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use vocaform_types::{ChoiceMatch, NoMatchPolicy, Question, QuestionType};

/// Lowest and highest accepted rating.
pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;

/// Rating used when the utterance contains no number at all.
pub const RATING_DEFAULT: i64 = 3;

/// Clamps a rating into `[RATING_MIN, RATING_MAX]`.
pub fn clamp_rating(value: i64) -> i64 {
    value.clamp(RATING_MIN, RATING_MAX)
}

/// Turns an utterance into a typed candidate for a question.
#[async_trait]
pub trait AnswerInterpreter: Send + Sync {
    async fn interpret(&self, utterance: &str, question: &Question)
        -> Result<Candidate, AnswerError>;
}

/// Deterministic interpreter driven by per-type extraction rules.
#[derive(Debug, Clone, Default)]
pub struct RuleInterpreter {
    no_match: NoMatchPolicy,
    choice_match: ChoiceMatch,
    /// Fixed "today" for relative dates; the current UTC date when unset.
    reference_date: Option<NaiveDate>,
}

impl RuleInterpreter {
    pub fn new(no_match: NoMatchPolicy) -> Self {
        Self {
            no_match,
            choice_match: ChoiceMatch::default(),
            reference_date: None,
        }
    }

    pub fn with_choice_match(mut self, choice_match: ChoiceMatch) -> Self {
        self.choice_match = choice_match;
        self
    }

    /// Pins the date that `today`/`tomorrow`/`yesterday` resolve against.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Synchronous core of [`AnswerInterpreter::interpret`].
    pub fn interpret_utterance(
        &self,
        utterance: &str,
        question: &Question,
    ) -> Result<Candidate, AnswerError> {
        let trimmed = utterance.trim();
        match question.question_type {
            QuestionType::MultipleChoice => self.interpret_choice(trimmed, question),
            QuestionType::Rating => Ok(interpret_rating(trimmed)),
            QuestionType::Date => {
                let today = self
                    .reference_date
                    .unwrap_or_else(|| Utc::now().date_naive());
                Ok(match parse_date(trimmed, today) {
                    Some(date) => Candidate::new(CandidateValue::Date(date), 0.9, trimmed),
                    None => Candidate::unrecognized(trimmed),
                })
            }
            QuestionType::Number => Ok(interpret_number(trimmed)),
            QuestionType::Text => Ok(Candidate::new(
                CandidateValue::Text(trimmed.to_string()),
                1.0,
                trimmed,
            )),
        }
    }

    fn interpret_choice(&self, utterance: &str, question: &Question) -> Result<Candidate, AnswerError> {
        let options: Vec<&String> = question
            .options()
            .iter()
            .filter(|o| !o.trim().is_empty())
            .collect();
        if options.is_empty() {
            return Err(AnswerError::MalformedQuestion {
                question_id: question.id.clone(),
                reason: "multiple_choice question has no options".to_string(),
            });
        }

        // Options are tried in listed order; the first one found wins.
        let lowered = utterance.to_lowercase();
        for option in &options {
            let wanted = option.trim().to_lowercase();
            let found = match self.choice_match {
                ChoiceMatch::Substring => lowered.contains(&wanted),
                ChoiceMatch::WholeWord => contains_phrase(utterance, option),
            };
            if found {
                let confidence = if lowered == wanted {
                    1.0
                } else {
                    0.9
                };
                return Ok(Candidate::new(
                    CandidateValue::Choice((*option).clone()),
                    confidence,
                    utterance,
                ));
            }
        }

        // Prompts enumerate options, so "2" means the second one.
        if let Ok(n) = utterance.trim_end_matches('.').parse::<usize>() {
            if let Some(option) = n.checked_sub(1).and_then(|i| options.get(i)) {
                return Ok(Candidate::new(
                    CandidateValue::Choice((*option).clone()),
                    0.9,
                    utterance,
                ));
            }
        }

        match self.no_match {
            NoMatchPolicy::FirstOption => {
                tracing::debug!(
                    question_id = %question.id,
                    "no option matched, guessing the first option"
                );
                Ok(Candidate::new(
                    CandidateValue::Choice(options[0].clone()),
                    0.2,
                    utterance,
                ))
            }
            NoMatchPolicy::Reject | NoMatchPolicy::FollowUp => Ok(Candidate::unrecognized(utterance)),
        }
    }
}

#[async_trait]
impl AnswerInterpreter for RuleInterpreter {
    async fn interpret(
        &self,
        utterance: &str,
        question: &Question,
    ) -> Result<Candidate, AnswerError> {
        self.interpret_utterance(utterance, question)
    }
}

fn interpret_rating(utterance: &str) -> Candidate {
    if let Some(n) = first_digit_run(utterance) {
        return Candidate::new(CandidateValue::Rating(clamp_rating(n)), 0.9, utterance);
    }
    if let Some(n) = first_number_word(utterance) {
        return Candidate::new(CandidateValue::Rating(clamp_rating(n)), 0.7, utterance);
    }
    Candidate::new(CandidateValue::Rating(RATING_DEFAULT), 0.3, utterance)
}

/// The whole trimmed utterance must be a finite number. Thousands
/// separators are the only thing stripped.
fn interpret_number(utterance: &str) -> Candidate {
    let (parsed, confidence) = match utterance.parse::<f64>() {
        Ok(value) => (Some(value), 1.0),
        Err(_) if utterance.contains(',') => {
            (utterance.replace(',', "").parse::<f64>().ok(), 0.9)
        }
        Err(_) => (None, 0.0),
    };
    match parsed.filter(|v| v.is_finite()) {
        Some(value) => Candidate::new(CandidateValue::Number(value), confidence, utterance),
        None => Candidate::unrecognized(utterance),
    }
}
