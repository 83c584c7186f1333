//! The conversation state machine.
//!
//! ```text
//! Opening → Questioning → Validating → Rephrasing  ┐
//!                ▲                   → FollowingUp ┤ (next turn → Validating)
//!                │                   → Advancing ──┴→ Closing → Complete
//!                └────────────────────────┘
//! ```
//!
//! Every function here is synchronous and deterministic: the caller runs
//! interpretation and validation beforehand, hands the resulting
//! [`Decision`] to [`apply`], and supplies the clock. Nothing is persisted;
//! the engine saves the mutated state once a turn has fully applied.
//!
//! A question receives at most `max_retries` rephrases or follow-ups. The
//! next failed answer after that records a
//! [`SkipReason::RetriesExhausted`] marker and advances, so every
//! conversation reaches `Complete` in a bounded number of turns.

use crate::error::ConversationError;
use crate::prompts;
use chrono::{DateTime, Utc};
use vocaform_answers::Decision;
use vocaform_types::{
    AnswerRecord, AnswerValue, ConversationPolicy, ConversationState, Form, Message, Phase, Role,
    SkipReason,
};

/// One validated user turn, ready to apply.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub decision: Decision,
    /// The utterance as received, after transcription.
    pub utterance: String,
    pub transcription: Option<String>,
    pub sentiment_score: Option<u8>,
}

impl TurnInput {
    pub fn text(decision: Decision, utterance: impl Into<String>) -> Self {
        Self {
            decision,
            utterance: utterance.into(),
            transcription: None,
            sentiment_score: None,
        }
    }
}

/// Runs the Opening phase: greets, then asks the first question.
///
/// A form without questions closes straight away.
pub fn open(
    state: &mut ConversationState,
    form: &Form,
    now: DateTime<Utc>,
) -> Result<Vec<Message>, ConversationError> {
    if state.phase != Phase::Opening {
        return Err(invalid_phase(state));
    }
    let mut out = Emitter::new(state.history.len());

    state.closing_message = form.closing_message.clone();
    let opening = form
        .opening_message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| prompts::default_opening(form));
    say(state, &mut out, opening, now);

    if state.questions.is_empty() {
        close(state, &mut out, now)?;
    } else {
        ask_current(state, &mut out, now);
    }
    Ok(out.collect(state))
}

/// Records the user's utterance and moves to Validating.
pub fn begin_turn(
    state: &mut ConversationState,
    utterance: &str,
    now: DateTime<Utc>,
) -> Result<(), ConversationError> {
    if state.is_complete {
        return Err(ConversationError::AlreadyComplete(
            state.conversation_id.clone(),
        ));
    }
    if !state.phase.is_awaiting_input() {
        return Err(invalid_phase(state));
    }
    if state.current_question().is_none() {
        return Err(ConversationError::UnknownQuestion(format!(
            "index {} of conversation {}",
            state.current_question_index, state.conversation_id
        )));
    }

    state.push_message(Role::User, utterance, now);
    state.phase = Phase::Validating;
    Ok(())
}

/// Applies a validated turn and returns the assistant messages it emitted.
pub fn apply(
    state: &mut ConversationState,
    input: TurnInput,
    policy: &ConversationPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<Message>, ConversationError> {
    if state.is_complete {
        return Err(ConversationError::AlreadyComplete(
            state.conversation_id.clone(),
        ));
    }
    if state.phase != Phase::Validating {
        return Err(invalid_phase(state));
    }
    let question_id = match state.current_question() {
        Some(q) => q.id.clone(),
        None => {
            return Err(ConversationError::UnknownQuestion(format!(
                "index {}",
                state.current_question_index
            )))
        }
    };
    let number = state.current_question_index + 1;
    let mut out = Emitter::new(state.history.len());

    match input.decision {
        Decision::Accept(value) => {
            state.record_answer(AnswerRecord {
                question_id,
                raw_value: input.utterance,
                processed_value: value,
                transcription: input.transcription,
                sentiment_score: input.sentiment_score,
                answered_at: now,
            });
            advance(state, &mut out, now)?;
        }
        Decision::Reject(reason) | Decision::NeedsFollowUp(reason)
            if state.attempts >= policy.max_retries =>
        {
            tracing::info!(
                conversation_id = %state.conversation_id,
                question_id = %question_id,
                attempts = state.attempts,
                reason = %reason,
                "retry cap reached, skipping question"
            );
            state.record_answer(AnswerRecord {
                question_id,
                raw_value: input.utterance,
                processed_value: AnswerValue::Skipped(SkipReason::RetriesExhausted),
                transcription: input.transcription,
                sentiment_score: None,
                answered_at: now,
            });
            say(state, &mut out, prompts::skipped_notice(number), now);
            advance(state, &mut out, now)?;
        }
        Decision::Reject(reason) => {
            tracing::debug!(
                conversation_id = %state.conversation_id,
                question_id = %question_id,
                reason = %reason,
                "answer rejected"
            );
            state.attempts += 1;
            state.phase = Phase::Rephrasing;
            say(state, &mut out, prompts::rephrase_prompt(number), now);
        }
        Decision::NeedsFollowUp(reason) => {
            state.attempts += 1;
            let prompt = prompts::follow_up_prompt(&reason);
            state.follow_up_context = Some(reason);
            state.phase = Phase::FollowingUp;
            say(state, &mut out, prompt, now);
        }
    }

    Ok(out.collect(state))
}

fn advance(
    state: &mut ConversationState,
    out: &mut Emitter,
    now: DateTime<Utc>,
) -> Result<(), ConversationError> {
    state.phase = Phase::Advancing;
    state.attempts = 0;
    state.follow_up_context = None;

    if state.is_last_question() {
        close(state, out, now)
    } else {
        state.current_question_index += 1;
        ask_current(state, out, now);
        Ok(())
    }
}

fn close(
    state: &mut ConversationState,
    out: &mut Emitter,
    now: DateTime<Utc>,
) -> Result<(), ConversationError> {
    state.phase = Phase::Closing;

    let missing = state.missing_required();
    if !missing.is_empty() {
        return Err(ConversationError::IncompleteForm {
            conversation_id: state.conversation_id.clone(),
            missing: missing.into_iter().map(String::from).collect(),
        });
    }

    let closing = state
        .closing_message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| prompts::DEFAULT_CLOSING.to_string());
    say(state, out, closing, now);

    state.completed_at = Some(now);
    state.completion_seconds = Some((now - state.start_time).num_seconds());
    state.is_complete = true;
    state.phase = Phase::Complete;
    Ok(())
}

fn ask_current(state: &mut ConversationState, out: &mut Emitter, now: DateTime<Utc>) {
    let total = state.questions.len();
    let index = state.current_question_index;
    if let Some(prompt) = state
        .current_question()
        .map(|q| prompts::question_prompt(q, index, total))
    {
        say(state, out, prompt, now);
    }
    state.phase = Phase::Questioning;
}

fn say(state: &mut ConversationState, out: &mut Emitter, content: String, now: DateTime<Utc>) {
    state.push_message(Role::Assistant, content, now);
    out.emitted += 1;
}

fn invalid_phase(state: &ConversationState) -> ConversationError {
    ConversationError::InvalidPhase {
        conversation_id: state.conversation_id.clone(),
        phase: state.phase,
    }
}

/// Tracks which history entries a single call appended.
struct Emitter {
    start: usize,
    emitted: usize,
}

impl Emitter {
    fn new(start: usize) -> Self {
        Self { start, emitted: 0 }
    }

    fn collect(self, state: &ConversationState) -> Vec<Message> {
        state.history[self.start..self.start + self.emitted].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vocaform_types::{Question, QuestionType};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn question(id: &str, required: bool) -> Question {
        Question {
            id: id.into(),
            text: format!("Question {id}?"),
            question_type: QuestionType::Text,
            options: None,
            required,
            order: 0,
        }
    }

    fn form(questions: Vec<Question>) -> Form {
        Form {
            id: "form-1".into(),
            title: "Survey".into(),
            description: None,
            opening_message: Some("Welcome!".into()),
            closing_message: Some("Bye!".into()),
            questions,
            created_at: None,
        }
    }

    fn opened(questions: Vec<Question>) -> ConversationState {
        let form = form(questions);
        let mut state =
            ConversationState::new("c1", &form.id, "r1", form.questions.clone(), t0());
        open(&mut state, &form, t0()).unwrap();
        state
    }

    fn turn(
        state: &mut ConversationState,
        decision: Decision,
        utterance: &str,
    ) -> Result<Vec<Message>, ConversationError> {
        begin_turn(state, utterance, t0())?;
        apply(
            state,
            TurnInput::text(decision, utterance),
            &ConversationPolicy::default(),
            t0(),
        )
    }

    fn accept(text: &str) -> Decision {
        Decision::Accept(AnswerValue::Text(text.into()))
    }

    #[test]
    fn open_greets_and_asks_first_question() {
        let state = opened(vec![question("a", true), question("b", true)]);
        assert_eq!(state.phase, Phase::Questioning);
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].content, "Welcome!");
        assert!(state.history[1].content.starts_with("Question 1 of 2"));
    }

    #[test]
    fn open_twice_is_invalid() {
        let f = form(vec![question("a", true)]);
        let mut state = opened(f.questions.clone());
        assert!(matches!(
            open(&mut state, &f, t0()),
            Err(ConversationError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn empty_form_closes_on_open() {
        let state = opened(vec![]);
        assert!(state.is_complete);
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.history.last().unwrap().content, "Bye!");
    }

    #[test]
    fn accept_advances_then_completes() {
        let mut state = opened(vec![question("a", true), question("b", true)]);

        let messages = turn(&mut state, accept("one"), "one").unwrap();
        assert_eq!(state.current_question_index, 1);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with("Question 2 of 2"));

        let later = t0() + Duration::seconds(95);
        begin_turn(&mut state, "two", later).unwrap();
        let messages = apply(
            &mut state,
            TurnInput::text(accept("two"), "two"),
            &ConversationPolicy::default(),
            later,
        )
        .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Bye!");
        assert!(state.is_complete);
        assert_eq!(state.completion_seconds, Some(95));
        assert_eq!(state.completed_at, Some(later));
        assert_eq!(state.current_question_index, 1);
    }

    #[test]
    fn reject_rephrases_without_advancing() {
        let mut state = opened(vec![question("a", true), question("b", true)]);
        let messages = turn(&mut state, Decision::Reject("empty".into()), "").unwrap();
        assert_eq!(state.phase, Phase::Rephrasing);
        assert_eq!(state.attempts, 1);
        assert_eq!(state.current_question_index, 0);
        assert_eq!(
            messages[0].content,
            "I didn't understand that. Could you rephrase your answer to question 1?"
        );
        assert!(state.answers.is_empty());
    }

    #[test]
    fn follow_up_keeps_context_until_advance() {
        let mut state = opened(vec![question("a", true), question("b", true)]);
        turn(
            &mut state,
            Decision::NeedsFollowUp("Please choose one of: Yes, No.".into()),
            "maybe",
        )
        .unwrap();
        assert_eq!(state.phase, Phase::FollowingUp);
        assert_eq!(
            state.follow_up_context.as_deref(),
            Some("Please choose one of: Yes, No.")
        );
        assert_eq!(state.current_question_index, 0);

        turn(&mut state, accept("yes"), "yes").unwrap();
        assert_eq!(state.follow_up_context, None);
        assert_eq!(state.attempts, 0);
    }

    #[test]
    fn retry_cap_forces_skip() {
        let mut state = opened(vec![question("a", true), question("b", true)]);
        for _ in 0..3 {
            turn(&mut state, Decision::Reject("bad".into()), "???").unwrap();
            assert_eq!(state.current_question_index, 0);
        }
        let messages = turn(&mut state, Decision::Reject("bad".into()), "!!!").unwrap();
        assert_eq!(state.current_question_index, 1);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("skipped question 1"));
        let record = &state.answers["a"];
        assert_eq!(
            record.processed_value,
            AnswerValue::Skipped(SkipReason::RetriesExhausted)
        );
        assert_eq!(record.raw_value, "!!!");
        assert_eq!(state.skipped_questions(), vec!["a"]);
    }

    #[test]
    fn turns_after_completion_are_rejected() {
        let mut state = opened(vec![question("a", true)]);
        turn(&mut state, accept("x"), "x").unwrap();
        let snapshot = state.clone();
        assert!(matches!(
            begin_turn(&mut state, "again", t0()),
            Err(ConversationError::AlreadyComplete(_))
        ));
        assert_eq!(state, snapshot);
    }

    #[test]
    fn apply_requires_validating_phase() {
        let mut state = opened(vec![question("a", true)]);
        let err = apply(
            &mut state,
            TurnInput::text(accept("x"), "x"),
            &ConversationPolicy::default(),
            t0(),
        )
        .unwrap_err();
        assert!(matches!(err, ConversationError::InvalidPhase { phase: Phase::Questioning, .. }));
    }

    #[test]
    fn index_never_decreases_and_terminates() {
        // Every mix of accept/reject/follow-up finishes within the bound.
        let decisions = [
            accept("ok"),
            Decision::Reject("no".into()),
            Decision::NeedsFollowUp("which?".into()),
        ];
        let policy = ConversationPolicy::default();
        let questions = 3usize;
        let bound = questions * (policy.max_retries as usize + 1);

        for seed in 0..200usize {
            let mut state = opened(
                (0..questions)
                    .map(|i| question(&format!("q{i}"), i % 2 == 0))
                    .collect(),
            );
            let mut last_index = 0;
            let mut turns = 0;
            let mut k = seed;
            while !state.is_complete {
                let decision = decisions[k % 3].clone();
                k = k / 3 + 7 * turns + seed;
                begin_turn(&mut state, "u", t0()).unwrap();
                apply(&mut state, TurnInput::text(decision, "u"), &policy, t0()).unwrap();
                assert!(state.current_question_index >= last_index);
                last_index = state.current_question_index;
                turns += 1;
                assert!(turns <= bound, "seed {seed} exceeded {bound} turns");
            }
            assert!(state.missing_required().is_empty());
            assert_eq!(state.answers.len(), questions);
        }
    }
}
