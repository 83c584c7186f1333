//! Assistant message text.
//!
//! Prompts are read aloud by the client, so options are enumerated inline
//! rather than as a visual list.

use vocaform_types::{Form, Question, QuestionType};

/// Opening used when a form does not define one.
pub fn default_opening(form: &Form) -> String {
    let count = form.questions.len();
    let noun = if count == 1 { "question" } else { "questions" };
    format!(
        "Hi! Let's fill out \"{}\" together. There {} {} {}.",
        form.title,
        if count == 1 { "is" } else { "are" },
        count,
        noun
    )
}

pub const DEFAULT_CLOSING: &str = "Thank you! Your responses have been recorded.";

/// The prompt for question `index` (zero-based) of `total`.
pub fn question_prompt(question: &Question, index: usize, total: usize) -> String {
    let mut prompt = format!("Question {} of {}: {}", index + 1, total, question.text.trim());

    match question.question_type {
        QuestionType::MultipleChoice => {
            let options = question
                .options()
                .iter()
                .filter(|o| !o.trim().is_empty())
                .enumerate()
                .map(|(i, o)| format!("{}) {}", i + 1, o.trim()))
                .collect::<Vec<_>>();
            if !options.is_empty() {
                prompt.push_str(" Your options are: ");
                prompt.push_str(&options.join(", "));
                prompt.push('.');
            }
        }
        QuestionType::Rating => prompt.push_str(" Please answer on a scale from 1 to 5."),
        QuestionType::Date | QuestionType::Number | QuestionType::Text => {}
    }

    if !question.required {
        prompt.push_str(" This question is optional; send an empty answer to skip it.");
    }
    prompt
}

/// Asked after a rejected answer. `number` is one-based.
pub fn rephrase_prompt(number: usize) -> String {
    format!("I didn't understand that. Could you rephrase your answer to question {number}?")
}

pub fn follow_up_prompt(reason: &str) -> String {
    format!("Just to clarify: {}", reason.trim())
}

pub fn skipped_notice(number: usize) -> String {
    format!("Let's move on. I've skipped question {number} for now.")
}
