//! Interpreter and validator tests across question types.

use chrono::NaiveDate;
use vocaform_types::{AnswerValue, ChoiceMatch, NoMatchPolicy, Question, QuestionType, SkipReason};

use crate::error::AnswerError;
use crate::interpret::{AnswerInterpreter, RuleInterpreter};
use crate::types::{CandidateValue, Decision};
use crate::validation::Validator;

fn question(question_type: QuestionType, options: Option<&[&str]>) -> Question {
    Question {
        id: "q1".to_string(),
        text: "What do you think?".to_string(),
        question_type,
        options: options.map(|o| o.iter().map(|s| s.to_string()).collect()),
        required: true,
        order: 0,
    }
}

/// Interpret then validate, as the state machine does.
fn decide(policy: NoMatchPolicy, utterance: &str, question: &Question) -> Decision {
    let candidate = RuleInterpreter::new(policy)
        .with_reference_date(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
        .interpret_utterance(utterance, question)
        .expect("question is well formed");
    Validator::new(policy).validate(&candidate, question)
}

// ── multiple choice ──────────────────────────────────────────────────

#[test]
fn unmatched_choice_is_rejected_then_exact_answer_accepted() {
    let q = question(QuestionType::MultipleChoice, Some(&["Yes", "No"]));

    let first = decide(NoMatchPolicy::Reject, "nah man", &q);
    assert!(matches!(first, Decision::Reject(_)), "got {first:?}");

    let second = decide(NoMatchPolicy::Reject, "No", &q);
    assert_eq!(second, Decision::Accept(AnswerValue::Choice("No".to_string())));
}

#[test]
fn choice_match_is_case_insensitive_and_returns_listed_form() {
    let q = question(QuestionType::MultipleChoice, Some(&["Very likely", "Unlikely"]));
    assert_eq!(
        decide(NoMatchPolicy::Reject, "hmm, VERY LIKELY i guess", &q),
        Decision::Accept(AnswerValue::Choice("Very likely".to_string()))
    );
}

#[test]
fn choice_matches_inside_words_by_default() {
    let q = question(QuestionType::MultipleChoice, Some(&["Yes", "No"]));
    assert_eq!(
        decide(NoMatchPolicy::Reject, "nope", &q),
        Decision::Accept(AnswerValue::Choice("No".to_string()))
    );
    // Listed order decides when several options appear.
    assert_eq!(
        decide(NoMatchPolicy::Reject, "no wait, yes", &q),
        Decision::Accept(AnswerValue::Choice("Yes".to_string()))
    );
}

#[test]
fn whole_word_choice_matching_is_opt_in() {
    let q = question(QuestionType::MultipleChoice, Some(&["Yes", "No"]));
    let interpreter = RuleInterpreter::new(NoMatchPolicy::Reject);
    let validator = Validator::new(NoMatchPolicy::Reject);

    let substring = interpreter.interpret_utterance("I don't know", &q).unwrap();
    assert_eq!(substring.value, CandidateValue::Choice("No".to_string()));

    let whole_word = interpreter.with_choice_match(ChoiceMatch::WholeWord);
    let nope = whole_word.interpret_utterance("I don't know", &q).unwrap();
    assert!(matches!(validator.validate(&nope, &q), Decision::Reject(_)));
    let no = whole_word.interpret_utterance("no thanks", &q).unwrap();
    assert_eq!(
        validator.validate(&no, &q),
        Decision::Accept(AnswerValue::Choice("No".to_string()))
    );
}

#[test]
fn choice_by_position() {
    let q = question(QuestionType::MultipleChoice, Some(&["Red", "Green", "Blue"]));
    assert_eq!(
        decide(NoMatchPolicy::Reject, "2", &q),
        Decision::Accept(AnswerValue::Choice("Green".to_string()))
    );
    assert!(matches!(
        decide(NoMatchPolicy::Reject, "7", &q),
        Decision::Reject(_)
    ));
}

#[test]
fn accepted_choice_is_always_a_listed_option() {
    let options = ["Email", "Phone call", "Text message"];
    let q = question(QuestionType::MultipleChoice, Some(&options));
    let utterances = [
        "email",
        "a phone call please",
        "TEXT MESSAGE",
        "carrier pigeon",
        "",
        "3",
        "phone",
        "emails",
    ];
    for policy in [
        NoMatchPolicy::Reject,
        NoMatchPolicy::FollowUp,
        NoMatchPolicy::FirstOption,
    ] {
        for utterance in utterances {
            if let Decision::Accept(AnswerValue::Choice(value)) = decide(policy, utterance, &q) {
                assert!(
                    options.contains(&value.as_str()),
                    "{policy:?} accepted {value:?} for {utterance:?}"
                );
            }
        }
    }
}

#[test]
fn no_match_policies() {
    let q = question(QuestionType::MultipleChoice, Some(&["Yes", "No"]));

    assert_eq!(
        decide(NoMatchPolicy::FirstOption, "nah man", &q),
        Decision::Accept(AnswerValue::Choice("Yes".to_string()))
    );
    match decide(NoMatchPolicy::FollowUp, "nah man", &q) {
        Decision::NeedsFollowUp(prompt) => {
            assert!(prompt.contains("Yes"));
            assert!(prompt.contains("No"));
        }
        other => panic!("expected follow-up, got {other:?}"),
    }
}

#[test]
fn first_option_guess_has_low_confidence() {
    let q = question(QuestionType::MultipleChoice, Some(&["Yes", "No"]));
    let candidate = RuleInterpreter::new(NoMatchPolicy::FirstOption)
        .interpret_utterance("whatever", &q)
        .unwrap();
    assert_eq!(candidate.value, CandidateValue::Choice("Yes".to_string()));
    assert!(candidate.confidence < 0.5);
}

#[test]
fn choice_without_options_is_malformed() {
    let q = question(QuestionType::MultipleChoice, Some(&["", "  "]));
    let err = RuleInterpreter::default()
        .interpret_utterance("yes", &q)
        .unwrap_err();
    assert!(matches!(err, AnswerError::MalformedQuestion { ref question_id, .. } if question_id == "q1"));

    let q = question(QuestionType::MultipleChoice, None);
    assert!(RuleInterpreter::default().interpret_utterance("yes", &q).is_err());
}

// ── rating ───────────────────────────────────────────────────────────

#[test]
fn spelled_out_rating_is_clamped() {
    let q = question(QuestionType::Rating, None);
    assert_eq!(
        decide(NoMatchPolicy::Reject, "I'd give it like an eleven", &q),
        Decision::Accept(AnswerValue::Rating(5))
    );
}

#[test]
fn rating_digits_default_and_clamp() {
    let q = question(QuestionType::Rating, None);
    let cases = [
        ("4", 4),
        ("about 2 stars", 2),
        ("0", 1),
        ("10 out of 10", 5),
        ("it was fine", 3),
        ("a solid four", 4),
    ];
    for (utterance, expected) in cases {
        assert_eq!(
            decide(NoMatchPolicy::Reject, utterance, &q),
            Decision::Accept(AnswerValue::Rating(expected)),
            "utterance {utterance:?}"
        );
    }
}

#[test]
fn rating_clamp_is_idempotent() {
    let q = question(QuestionType::Rating, None);
    for n in -20i64..=20 {
        let first = match decide(NoMatchPolicy::Reject, &n.to_string(), &q) {
            Decision::Accept(AnswerValue::Rating(r)) => r,
            other => panic!("rating rejected: {other:?}"),
        };
        assert!((1..=5).contains(&first));
        let again = decide(NoMatchPolicy::Reject, &first.to_string(), &q);
        assert_eq!(again, Decision::Accept(AnswerValue::Rating(first)));
    }
}

// ── text, number, date ───────────────────────────────────────────────

#[test]
fn text_is_trimmed_and_must_be_non_empty() {
    let q = question(QuestionType::Text, None);
    assert_eq!(
        decide(NoMatchPolicy::Reject, "  Paris ", &q),
        Decision::Accept(AnswerValue::Text("Paris".to_string()))
    );
    assert!(matches!(
        decide(NoMatchPolicy::Reject, "   ", &q),
        Decision::Reject(_)
    ));
}

#[test]
fn numbers() {
    let q = question(QuestionType::Number, None);
    assert_eq!(
        decide(NoMatchPolicy::Reject, "42", &q),
        Decision::Accept(AnswerValue::Number(42.0))
    );
    assert_eq!(
        decide(NoMatchPolicy::Reject, " -3.5 ", &q),
        Decision::Accept(AnswerValue::Number(-3.5))
    );
    assert_eq!(
        decide(NoMatchPolicy::Reject, "1,200", &q),
        Decision::Accept(AnswerValue::Number(1200.0))
    );
    for bad in [
        "none of your business",
        "about 1,200 people",
        "twenty-five",
        "NaN",
        "inf",
        "lots",
    ] {
        assert!(
            matches!(decide(NoMatchPolicy::Reject, bad, &q), Decision::Reject(_)),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn dates() {
    let q = question(QuestionType::Date, None);
    assert_eq!(
        decide(NoMatchPolicy::Reject, "March 9, 2023", &q),
        Decision::Accept(AnswerValue::Date(NaiveDate::from_ymd_opt(2023, 3, 9).unwrap()))
    );
    assert_eq!(
        decide(NoMatchPolicy::Reject, "yesterday", &q),
        Decision::Accept(AnswerValue::Date(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()))
    );
    assert!(matches!(
        decide(NoMatchPolicy::Reject, "a while ago", &q),
        Decision::Reject(_)
    ));
}

#[test]
fn blank_answer_to_optional_question_is_declined() {
    for question_type in [
        QuestionType::Text,
        QuestionType::Number,
        QuestionType::Rating,
        QuestionType::Date,
        QuestionType::MultipleChoice,
    ] {
        let mut q = question(question_type, Some(&["A", "B"]));
        q.required = false;
        assert_eq!(
            decide(NoMatchPolicy::Reject, "  ", &q),
            Decision::Accept(AnswerValue::Skipped(SkipReason::Declined)),
            "{question_type}"
        );
    }
}

#[tokio::test]
async fn interpreter_trait_object() {
    let interpreter: Box<dyn AnswerInterpreter> = Box::new(RuleInterpreter::default());
    let q = question(QuestionType::Text, None);
    let candidate = interpreter.interpret("hello", &q).await.unwrap();
    assert_eq!(candidate.value, CandidateValue::Text("hello".to_string()));
    assert_eq!(candidate.confidence, 1.0);
}
