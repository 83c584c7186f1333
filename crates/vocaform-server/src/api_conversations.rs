//! Conversation endpoints: start, inspect and take turns.

use crate::{api::ApiError, AppState};
use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use vocaform_conversation::TurnReply;
use vocaform_types::ConversationState;

/// Optional body for `POST /api/forms/{formId}/conversations`.
#[derive(Debug, Default, Deserialize)]
pub struct StartConversationRequest {
    /// Ties the conversation to an existing response record.
    #[serde(default)]
    pub response_id: Option<String>,
}

/// Request body for `POST /api/conversations/{conversationId}/turns`.
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub text: String,
}

/// Handler for `POST /api/forms/{formId}/conversations`.
///
/// The body may be empty. When present it must be a
/// [`StartConversationRequest`].
pub async fn start_conversation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(form_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<TurnReply>), ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartConversationRequest::default()
    } else {
        serde_json::from_slice::<StartConversationRequest>(&body)
            .map_err(|e| ApiError::Unprocessable(format!("invalid request body: {}", e)))?
    };

    let reply = state.engine.start(&form_id, request.response_id).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// Handler for `GET /api/conversations/{conversationId}`.
pub async fn get_conversation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationState>, ApiError> {
    Ok(Json(state.engine.conversation(&conversation_id).await?))
}

/// Handler for `POST /api/conversations/{conversationId}/turns`.
pub async fn submit_turn_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(body): Json<TurnRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    let reply = state
        .engine
        .submit_text(&conversation_id, &body.text)
        .await?;
    Ok(Json(reply))
}

/// Handler for `POST /api/conversations/{conversationId}/audio`.
///
/// The body is the raw audio file, passed to the transcriber unchanged.
pub async fn submit_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    body: Bytes,
) -> Result<Json<TurnReply>, ApiError> {
    let reply = state.engine.submit_audio(&conversation_id, &body).await?;
    Ok(Json(reply))
}
