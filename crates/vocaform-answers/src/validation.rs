//! Per-type acceptance rules.
//!
//! The validator turns a [`Candidate`] into a [`Decision`]. It is pure: no
//! I/O, no clock, so re-validating the same input always gives the same
//! decision.

use crate::interpret::{clamp_rating, RATING_DEFAULT};
use crate::parse::first_digit_run;
use crate::types::{Candidate, CandidateValue, Decision};
use vocaform_types::{AnswerValue, NoMatchPolicy, Question, QuestionType, SkipReason};

/// Applies the acceptance rule for a question's type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    no_match: NoMatchPolicy,
}

impl Validator {
    pub fn new(no_match: NoMatchPolicy) -> Self {
        Self { no_match }
    }

    /// Decides whether `candidate` answers `question`.
    ///
    /// A blank answer to an optional question is accepted as a skip for
    /// every type.
    pub fn validate(&self, candidate: &Candidate, question: &Question) -> Decision {
        if !question.required && candidate.raw_text.trim().is_empty() {
            return Decision::Accept(AnswerValue::Skipped(SkipReason::Declined));
        }

        match question.question_type {
            QuestionType::Text => validate_text(candidate),
            QuestionType::Number => validate_number(candidate),
            QuestionType::MultipleChoice => self.validate_choice(candidate, question),
            QuestionType::Rating => Decision::Accept(AnswerValue::Rating(rating_of(candidate))),
            QuestionType::Date => match candidate.value {
                CandidateValue::Date(date) => Decision::Accept(AnswerValue::Date(date)),
                _ => Decision::Reject("no date was recognised in the answer".to_string()),
            },
        }
    }

    fn validate_choice(&self, candidate: &Candidate, question: &Question) -> Decision {
        let value = match &candidate.value {
            CandidateValue::Choice(v) | CandidateValue::Text(v) => Some(v.as_str()),
            _ => None,
        };

        if let Some(value) = value {
            let wanted = value.trim().to_lowercase();
            if let Some(option) = question
                .options()
                .iter()
                .find(|o| !o.trim().is_empty() && o.trim().to_lowercase() == wanted)
            {
                return Decision::Accept(AnswerValue::Choice(option.clone()));
            }
        }

        let listed = question
            .options()
            .iter()
            .filter(|o| !o.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        match self.no_match {
            NoMatchPolicy::FollowUp => {
                Decision::NeedsFollowUp(format!("Please choose one of: {listed}."))
            }
            NoMatchPolicy::Reject | NoMatchPolicy::FirstOption => Decision::Reject(format!(
                "the answer did not match any of the options ({listed})"
            )),
        }
    }
}

fn validate_text(candidate: &Candidate) -> Decision {
    let text = match &candidate.value {
        CandidateValue::Text(s) | CandidateValue::Choice(s) => s.trim(),
        _ => candidate.raw_text.trim(),
    };
    if text.is_empty() {
        Decision::Reject("the answer was empty".to_string())
    } else {
        Decision::Accept(AnswerValue::Text(text.to_string()))
    }
}

fn validate_number(candidate: &Candidate) -> Decision {
    let value = match &candidate.value {
        CandidateValue::Number(n) => Some(*n),
        CandidateValue::Rating(n) => Some(*n as f64),
        CandidateValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value.filter(|v| v.is_finite()) {
        Some(n) => Decision::Accept(AnswerValue::Number(n)),
        None => Decision::Reject("the answer is not a number".to_string()),
    }
}

/// Rating is permissive: anything becomes an integer in range.
fn rating_of(candidate: &Candidate) -> u8 {
    let raw = match &candidate.value {
        CandidateValue::Rating(n) => *n,
        CandidateValue::Number(n) if n.is_finite() => n.round() as i64,
        CandidateValue::Text(s) | CandidateValue::Choice(s) => {
            first_digit_run(s).unwrap_or(RATING_DEFAULT)
        }
        _ => RATING_DEFAULT,
    };
    clamp_rating(raw) as u8
}
