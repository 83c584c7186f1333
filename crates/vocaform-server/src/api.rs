//! Shared API error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use vocaform_answers::AnswerError;
use vocaform_conversation::ConversationError;
use vocaform_forms::FormError;

/// API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("gone: {0}")]
    Gone(String),
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Gone(msg) => (StatusCode::GONE, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<ConversationError> for ApiError {
    fn from(e: ConversationError) -> Self {
        let msg = e.to_string();
        match e {
            ConversationError::UnknownConversation(_)
            | ConversationError::UnknownForm(_)
            | ConversationError::UnknownQuestion(_) => ApiError::NotFound(msg),
            ConversationError::AlreadyComplete(_) | ConversationError::InvalidPhase { .. } => {
                ApiError::Conflict(msg)
            }
            ConversationError::Abandoned(_) => ApiError::Gone(msg),
            ConversationError::TranscriptionFailed(_) => ApiError::Unprocessable(msg),
            ConversationError::Persistence(_) => {
                tracing::error!(error = %msg, "conversation persistence failed");
                ApiError::ServiceUnavailable(msg)
            }
            ConversationError::Answer(AnswerError::Interpreter(_)) => {
                ApiError::ServiceUnavailable(msg)
            }
            ConversationError::Answer(AnswerError::MalformedQuestion { .. })
            | ConversationError::IncompleteForm { .. } => {
                tracing::error!(error = %msg, "conversation invariant violated");
                ApiError::InternalServerError(msg)
            }
        }
    }
}

impl From<FormError> for ApiError {
    fn from(e: FormError) -> Self {
        match e {
            FormError::NotFound(_) => ApiError::NotFound(e.to_string()),
            FormError::AlreadyExists(_) => ApiError::Conflict(e.to_string()),
            FormError::Invalid(_) => ApiError::BadRequest(e.to_string()),
            FormError::Database(_) | FormError::Json(_) => {
                ApiError::InternalServerError(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocaform_voice::VoiceError;

    fn status(e: impl Into<ApiError>) -> StatusCode {
        e.into().into_response().status()
    }

    #[test]
    fn conversation_errors_map_to_statuses() {
        assert_eq!(
            status(ConversationError::UnknownConversation("c".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ConversationError::UnknownForm("f".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ConversationError::AlreadyComplete("c".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ConversationError::Abandoned("c".into())),
            StatusCode::GONE
        );
        assert_eq!(
            status(ConversationError::TranscriptionFailed(VoiceError::EmptyInput)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(ConversationError::Answer(AnswerError::MalformedQuestion {
                question_id: "q".into(),
                reason: "no options".into(),
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn form_errors_map_to_statuses() {
        assert_eq!(status(FormError::Invalid("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(FormError::AlreadyExists("x".into())), StatusCode::CONFLICT);
        assert_eq!(status(FormError::NotFound("x".into())), StatusCode::NOT_FOUND);
    }
}
