//! Collaborators the engine reads forms from and reports completions to.

use crate::store::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use vocaform_db::DbPool;
use vocaform_forms::FormError;
use vocaform_types::{AnswerRecord, ConversationState, Form};

/// Read-only access to form definitions.
#[async_trait]
pub trait FormProvider: Send + Sync {
    /// The form with its questions in order, or `None` if it does not exist.
    async fn form(&self, form_id: &str) -> Result<Option<Form>, StoreError>;
}

/// Reads forms from the SQLite database.
#[derive(Clone)]
pub struct SqliteFormProvider {
    pool: DbPool,
}

impl SqliteFormProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FormProvider for SqliteFormProvider {
    async fn form(&self, form_id: &str) -> Result<Option<Form>, StoreError> {
        let pool = self.pool.clone();
        let form_id = form_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Form>, StoreError> {
            let conn = pool.get()?;
            match vocaform_forms::get_form(&conn, &form_id) {
                Ok(form) => Ok(Some(form)),
                Err(FormError::NotFound(_)) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Fixed set of forms held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticFormProvider {
    forms: HashMap<String, Form>,
}

impl StaticFormProvider {
    pub fn new(forms: impl IntoIterator<Item = Form>) -> Self {
        Self {
            forms: forms.into_iter().map(|f| (f.id.clone(), f)).collect(),
        }
    }
}

#[async_trait]
impl FormProvider for StaticFormProvider {
    async fn form(&self, form_id: &str) -> Result<Option<Form>, StoreError> {
        Ok(self.forms.get(form_id).cloned())
    }
}

/// Everything a completion notification carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub form: Form,
    pub conversation: ConversationState,
    /// Answers in question order.
    pub answers: Vec<AnswerRecord>,
}

impl CompletionReport {
    pub fn new(form: Form, conversation: ConversationState) -> Self {
        let answers = conversation
            .questions
            .iter()
            .filter_map(|q| conversation.answers.get(&q.id).cloned())
            .collect();
        Self {
            form,
            conversation,
            answers,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

/// Told about every completed conversation. Failures are logged by the
/// caller and never undo the completion.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, report: &CompletionReport) -> Result<(), NotifyError>;
}

/// Writes completions to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn notify(&self, report: &CompletionReport) -> Result<(), NotifyError> {
        let skipped = report.conversation.skipped_questions().len();
        tracing::info!(
            form_id = %report.form.id,
            conversation_id = %report.conversation.conversation_id,
            response_id = %report.conversation.response_id,
            answers = report.answers.len(),
            skipped,
            completion_seconds = report.conversation.completion_seconds.unwrap_or_default(),
            "form response completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vocaform_types::{AnswerValue, Question, QuestionType};

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            text: id.into(),
            question_type: QuestionType::Text,
            options: None,
            required: true,
            order: 0,
        }
    }

    #[test]
    fn report_orders_answers_by_question() {
        let questions = vec![question("z"), question("a")];
        let form = Form {
            id: "f".into(),
            title: "F".into(),
            description: None,
            opening_message: None,
            closing_message: None,
            questions: questions.clone(),
            created_at: None,
        };
        let now = Utc::now();
        let mut state = ConversationState::new("c", "f", "r", questions, now);
        for id in ["a", "z"] {
            state.record_answer(AnswerRecord {
                question_id: id.into(),
                raw_value: id.into(),
                processed_value: AnswerValue::Text(id.into()),
                transcription: None,
                sentiment_score: None,
                answered_at: now,
            });
        }
        let report = CompletionReport::new(form, state);
        let order: Vec<_> = report.answers.iter().map(|a| a.question_id.as_str()).collect();
        assert_eq!(order, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn static_provider_lookup() {
        let provider = StaticFormProvider::new([Form {
            id: "f".into(),
            title: "F".into(),
            description: None,
            opening_message: None,
            closing_message: None,
            questions: vec![],
            created_at: None,
        }]);
        assert!(provider.form("f").await.unwrap().is_some());
        assert!(provider.form("g").await.unwrap().is_none());
    }
}
