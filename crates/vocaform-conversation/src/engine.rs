//! Async orchestration around the state machine.
//!
//! The engine loads a conversation, runs interpretation, validation and
//! enrichment, applies the transition, and saves. Turns for one
//! conversation id are serialized through a per-id async mutex; different
//! conversations proceed in parallel.

use crate::error::ConversationError;
use crate::machine::{self, TurnInput};
use crate::providers::{CompletionNotifier, CompletionReport, FormProvider, LogNotifier};
use crate::store::{ArchiveReason, SessionStore};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vocaform_answers::{
    AnswerInterpreter, Decision, DecisionKind, LexiconScorer, RuleInterpreter, SentimentScorer,
    Validator,
};
use vocaform_types::{ConversationPolicy, ConversationState, Message, Phase, QuestionType};
use vocaform_voice::{Transcriber, VoiceError};

/// What a caller gets back from starting a conversation or taking a turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub conversation_id: String,
    /// Assistant messages emitted by this step, in order.
    pub messages: Vec<Message>,
    pub phase: Phase,
    pub current_question_index: usize,
    pub is_complete: bool,
    /// How the answer was judged. `None` when starting a conversation.
    pub decision: Option<DecisionKind>,
    /// The transcript of an audio turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl TurnReply {
    fn new(state: &ConversationState, messages: Vec<Message>) -> Self {
        Self {
            conversation_id: state.conversation_id.clone(),
            messages,
            phase: state.phase,
            current_question_index: state.current_question_index,
            is_complete: state.is_complete,
            decision: None,
            transcript: None,
        }
    }
}

enum Utterance<'a> {
    Text(&'a str),
    Audio(&'a [u8]),
}

type KeyedLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct ConversationEngine {
    forms: Arc<dyn FormProvider>,
    store: Arc<dyn SessionStore>,
    interpreter: Arc<dyn AnswerInterpreter>,
    validator: Validator,
    sentiment: Option<Arc<dyn SentimentScorer>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    notifier: Arc<dyn CompletionNotifier>,
    policy: ConversationPolicy,
    locks: KeyedLocks,
}

impl ConversationEngine {
    /// An engine with the rule interpreter, lexicon sentiment scoring, a
    /// logging notifier and no transcriber.
    pub fn new(
        forms: Arc<dyn FormProvider>,
        store: Arc<dyn SessionStore>,
        policy: ConversationPolicy,
    ) -> Self {
        Self {
            forms,
            store,
            interpreter: Arc::new(
                RuleInterpreter::new(policy.no_match).with_choice_match(policy.choice_match),
            ),
            validator: Validator::new(policy.no_match),
            sentiment: Some(Arc::new(LexiconScorer::new())),
            transcriber: None,
            notifier: Arc::new(LogNotifier),
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_interpreter(mut self, interpreter: Arc<dyn AnswerInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_sentiment(mut self, scorer: Option<Arc<dyn SentimentScorer>>) -> Self {
        self.sentiment = scorer;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn policy(&self) -> &ConversationPolicy {
        &self.policy
    }

    /// Starts a conversation on `form_id` and returns the opening messages.
    pub async fn start(
        &self,
        form_id: &str,
        response_id: Option<String>,
    ) -> Result<TurnReply, ConversationError> {
        let form = self
            .forms
            .form(form_id)
            .await?
            .ok_or_else(|| ConversationError::UnknownForm(form_id.to_string()))?;

        let conversation_id = uuid::Uuid::new_v4().to_string();
        let response_id = response_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = Utc::now();
        let mut state = ConversationState::new(
            &conversation_id,
            &form.id,
            response_id,
            form.questions.clone(),
            now,
        );
        let messages = machine::open(&mut state, &form, now)?;
        self.store.save(&state).await?;

        tracing::info!(
            conversation_id = %conversation_id,
            form_id = %form.id,
            questions = state.questions.len(),
            "conversation started"
        );

        if state.is_complete {
            self.finish(&state).await;
        }
        Ok(TurnReply::new(&state, messages))
    }

    /// Takes one typed turn.
    pub async fn submit_text(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<TurnReply, ConversationError> {
        self.run_turn(conversation_id, Utterance::Text(text)).await
    }

    /// Transcribes `audio` and takes it as one turn. The transcript is kept
    /// on the resulting answer record.
    pub async fn submit_audio(
        &self,
        conversation_id: &str,
        audio: &[u8],
    ) -> Result<TurnReply, ConversationError> {
        self.run_turn(conversation_id, Utterance::Audio(audio)).await
    }

    /// Current state of a conversation, active or archived.
    pub async fn conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationState, ConversationError> {
        self.store
            .load(conversation_id)
            .await?
            .ok_or_else(|| ConversationError::UnknownConversation(conversation_id.to_string()))
    }

    /// Archives conversations idle for longer than the configured TTL and
    /// returns their ids.
    pub async fn reap_stale(&self, now: DateTime<Utc>) -> Result<Vec<String>, ConversationError> {
        let ttl = Duration::seconds(self.policy.inactivity_ttl_seconds as i64);
        let cutoff = now - ttl;
        let candidates = self.store.list_inactive_since(cutoff).await?;

        let mut reaped = Vec::new();
        for id in candidates {
            let lock = self.lock_for(&id);
            let guard = lock.lock().await;

            // A turn may have landed while we waited for the lock.
            let still_stale = match self.store.load(&id).await? {
                Some(state) => !state.is_complete && state.last_activity < cutoff,
                None => false,
            };
            if still_stale && self.store.archive(&id, ArchiveReason::Abandoned).await? {
                tracing::info!(conversation_id = %id, "abandoned conversation archived");
                drop(guard);
                self.release_lock(&id);
                reaped.push(id);
            } else {
                drop(guard);
                self.release_idle_lock(&id, &lock);
            }
        }
        if !reaped.is_empty() {
            tracing::info!(count = reaped.len(), "reaped stale conversations");
        }
        Ok(reaped)
    }

    async fn run_turn(
        &self,
        conversation_id: &str,
        utterance: Utterance<'_>,
    ) -> Result<TurnReply, ConversationError> {
        // Unknown and finished ids never get a lock entry.
        self.open_conversation(conversation_id).await?;

        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().await;

        // A turn or the reaper may have closed it while we waited.
        let mut state = match self.open_conversation(conversation_id).await {
            Ok(state) => state,
            Err(
                e @ (ConversationError::UnknownConversation(_)
                | ConversationError::AlreadyComplete(_)
                | ConversationError::Abandoned(_)),
            ) => {
                self.release_lock(conversation_id);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let (text, transcription) = match utterance {
            Utterance::Text(text) => (text.to_string(), None),
            Utterance::Audio(audio) => {
                let transcriber = self.transcriber.as_ref().ok_or_else(|| {
                    ConversationError::TranscriptionFailed(VoiceError::Config(
                        "no transcriber configured".to_string(),
                    ))
                })?;
                let transcript = transcriber.transcribe(audio).await?;
                tracing::debug!(
                    conversation_id,
                    confidence = transcript.confidence,
                    "audio turn transcribed"
                );
                (transcript.text.clone(), Some(transcript.text))
            }
        };

        let now = Utc::now();
        machine::begin_turn(&mut state, &text, now)?;
        let question = state
            .current_question()
            .cloned()
            .ok_or_else(|| ConversationError::UnknownQuestion(conversation_id.to_string()))?;

        let candidate = self.interpreter.interpret(&text, &question).await?;
        let decision = self.validator.validate(&candidate, &question);
        let kind = decision.kind();
        tracing::info!(
            conversation_id,
            question_id = %question.id,
            decision = kind.as_str(),
            confidence = candidate.confidence,
            "answer validated"
        );

        let sentiment_score = match &decision {
            Decision::Accept(value)
                if question.question_type == QuestionType::Text && !value.is_skipped() =>
            {
                self.score_sentiment(conversation_id, &text).await
            }
            _ => None,
        };

        let messages = machine::apply(
            &mut state,
            TurnInput {
                decision,
                utterance: text,
                transcription: transcription.clone(),
                sentiment_score,
            },
            &self.policy,
            now,
        )?;
        self.store.save(&state).await?;
        tracing::debug!(
            conversation_id,
            phase = state.phase.as_str(),
            question_index = state.current_question_index,
            attempts = state.attempts,
            "turn applied"
        );

        if state.is_complete {
            self.finish(&state).await;
        }

        let mut reply = TurnReply::new(&state, messages);
        reply.decision = Some(kind);
        reply.transcript = transcription;
        Ok(reply)
    }

    /// Loads a conversation that can still take a turn.
    async fn open_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationState, ConversationError> {
        let state = self.conversation(conversation_id).await?;
        if state.is_complete {
            return Err(ConversationError::AlreadyComplete(
                conversation_id.to_string(),
            ));
        }
        if self.store.archive_reason(conversation_id).await? == Some(ArchiveReason::Abandoned) {
            return Err(ConversationError::Abandoned(conversation_id.to_string()));
        }
        Ok(state)
    }

    async fn score_sentiment(&self, conversation_id: &str, text: &str) -> Option<u8> {
        let scorer = self.sentiment.as_ref()?;
        if text.trim().chars().count() <= self.policy.sentiment_min_chars {
            return None;
        }
        match scorer.score(text).await {
            Ok(sentiment) => Some(sentiment.as_percent()),
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "sentiment scoring failed");
                None
            }
        }
    }

    /// Notifies and archives a completed conversation. Nothing here can
    /// fail the turn: the completed state is already saved.
    async fn finish(&self, state: &ConversationState) {
        let id = state.conversation_id.as_str();
        tracing::info!(
            conversation_id = id,
            form_id = %state.form_id,
            completion_seconds = state.completion_seconds.unwrap_or_default(),
            skipped = state.skipped_questions().len(),
            "conversation complete"
        );

        match self.forms.form(&state.form_id).await {
            Ok(Some(form)) => {
                let report = CompletionReport::new(form, state.clone());
                if let Err(e) = self.notifier.notify(&report).await {
                    tracing::warn!(conversation_id = id, error = %e, "completion notification failed");
                }
            }
            Ok(None) => {
                tracing::warn!(conversation_id = id, form_id = %state.form_id, "form gone, completion not notified");
            }
            Err(e) => {
                tracing::warn!(conversation_id = id, error = %e, "form lookup failed, completion not notified");
            }
        }

        if let Err(e) = self.store.archive(id, ArchiveReason::Completed).await {
            tracing::warn!(conversation_id = id, error = %e, "failed to archive completed conversation");
        }
        self.release_lock(id);
    }

    fn lock_for(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_lock(&self, conversation_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(conversation_id);
    }

    /// Drops the entry only if no other task holds or awaits it.
    fn release_idle_lock(&self, conversation_id: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // The map and `lock` account for two references.
        if Arc::strong_count(lock) <= 2 {
            locks.remove(conversation_id);
        }
    }

    /// Number of conversation ids with a live lock entry.
    pub fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}
