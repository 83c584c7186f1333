//! Form and question persistence for the Vocaform platform.
//!
//! Forms own an ordered list of questions. Once a conversation starts it
//! copies the questions into its own state, so edits made here never reach
//! conversations that are already running.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use vocaform_types::{Form, Question, QuestionType};

/// Errors that can occur during form operations.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("form not found: {0}")]
    NotFound(String),
    #[error("form already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid form: {0}")]
    Invalid(String),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parameters for creating a new form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFormParams {
    pub form_id: String,
    pub title: String,
    pub description: Option<String>,
    pub opening_message: Option<String>,
    pub closing_message: Option<String>,
    pub questions: Vec<Question>,
}

/// A form listing entry without its questions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormSummary {
    pub form_id: String,
    pub title: String,
    pub description: Option<String>,
    pub question_count: i64,
    pub created_at: String,
}

/// Checks the structural rules a form must satisfy before it is stored.
///
/// - the title is not blank
/// - question IDs are non-empty and unique
/// - every `multiple_choice` question has at least one non-blank option
pub fn validate_form(params: &CreateFormParams) -> Result<(), FormError> {
    if params.form_id.trim().is_empty() {
        return Err(FormError::Invalid("form_id is empty".to_string()));
    }
    if params.title.trim().is_empty() {
        return Err(FormError::Invalid("title is empty".to_string()));
    }

    let mut seen = HashSet::new();
    for question in &params.questions {
        if question.id.trim().is_empty() {
            return Err(FormError::Invalid("question id is empty".to_string()));
        }
        if !seen.insert(question.id.as_str()) {
            return Err(FormError::Invalid(format!(
                "duplicate question id: {}",
                question.id
            )));
        }
        if question.text.trim().is_empty() {
            return Err(FormError::Invalid(format!(
                "question {} has no text",
                question.id
            )));
        }
        if question.question_type == QuestionType::MultipleChoice
            && question.options().iter().all(|o| o.trim().is_empty())
        {
            return Err(FormError::Invalid(format!(
                "multiple_choice question {} has no options",
                question.id
            )));
        }
    }
    Ok(())
}

/// Creates a form and its questions in one transaction.
pub fn create_form(conn: &Connection, params: &CreateFormParams) -> Result<Form, FormError> {
    validate_form(params)?;

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM forms WHERE form_id = ?1)",
        [&params.form_id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(FormError::AlreadyExists(params.form_id.clone()));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO forms (form_id, title, description, opening_message, closing_message)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            params.form_id,
            params.title,
            params.description,
            params.opening_message,
            params.closing_message,
        ],
    )?;

    for (index, question) in params.questions.iter().enumerate() {
        let options_json = question
            .options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        // Questions without an explicit order keep their list position.
        let position = if question.order != 0 {
            question.order
        } else {
            index as i64
        };
        tx.execute(
            "INSERT INTO questions (form_id, question_id, text, question_type, options_json, required, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                params.form_id,
                question.id,
                question.text,
                question.question_type.as_str(),
                options_json,
                question.required,
                position,
            ],
        )?;
    }
    tx.commit()?;

    tracing::info!(
        form_id = %params.form_id,
        questions = params.questions.len(),
        "created form"
    );

    get_form(conn, &params.form_id)
}

/// Retrieves a form with its questions in order.
pub fn get_form(conn: &Connection, form_id: &str) -> Result<Form, FormError> {
    let mut form = conn
        .query_row(
            "SELECT form_id, title, description, opening_message, closing_message, created_at
             FROM forms WHERE form_id = ?1",
            [form_id],
            |row| {
                Ok(Form {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    opening_message: row.get(3)?,
                    closing_message: row.get(4)?,
                    questions: Vec::new(),
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| FormError::NotFound(form_id.to_string()))?;

    form.questions = list_questions(conn, form_id)?;
    Ok(form)
}

/// Lists a form's questions ordered by position.
pub fn list_questions(conn: &Connection, form_id: &str) -> Result<Vec<Question>, FormError> {
    let mut stmt = conn.prepare(
        "SELECT question_id, text, question_type, options_json, required, position
         FROM questions WHERE form_id = ?1 ORDER BY position ASC, id ASC",
    )?;

    let rows = stmt.query_map([form_id], map_row_to_raw_question)?;
    let mut questions = Vec::new();
    for row in rows {
        questions.push(row?.into_question()?);
    }
    Ok(questions)
}

/// Lists all forms, newest first.
pub fn list_forms(conn: &Connection) -> Result<Vec<FormSummary>, FormError> {
    let mut stmt = conn.prepare(
        "SELECT f.form_id, f.title, f.description,
                (SELECT COUNT(*) FROM questions q WHERE q.form_id = f.form_id),
                f.created_at
         FROM forms f ORDER BY f.created_at DESC, f.id DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(FormSummary {
            form_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            question_count: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut forms = Vec::new();
    for row in rows {
        forms.push(row?);
    }
    Ok(forms)
}

/// Deletes a form; its questions go with it.
pub fn delete_form(conn: &Connection, form_id: &str) -> Result<(), FormError> {
    let affected = conn.execute("DELETE FROM forms WHERE form_id = ?1", [form_id])?;
    if affected == 0 {
        return Err(FormError::NotFound(form_id.to_string()));
    }
    tracing::info!(form_id, "deleted form");
    Ok(())
}

/// Question row before its JSON and enum columns are decoded.
struct RawQuestion {
    id: String,
    text: String,
    question_type: String,
    options_json: Option<String>,
    required: bool,
    order: i64,
}

impl RawQuestion {
    fn into_question(self) -> Result<Question, FormError> {
        let question_type: QuestionType = self
            .question_type
            .parse()
            .map_err(|e: vocaform_types::ParseQuestionTypeError| FormError::Invalid(e.to_string()))?;
        let options = self
            .options_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Question {
            id: self.id,
            text: self.text,
            question_type,
            options,
            required: self.required,
            order: self.order,
        })
    }
}

fn map_row_to_raw_question(row: &Row) -> rusqlite::Result<RawQuestion> {
    Ok(RawQuestion {
        id: row.get(0)?,
        text: row.get(1)?,
        question_type: row.get(2)?,
        options_json: row.get(3)?,
        required: row.get(4)?,
        order: row.get(5)?,
    })
}
