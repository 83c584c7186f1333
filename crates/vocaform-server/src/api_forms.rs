//! Form definition endpoints.

use crate::{api::ApiError, AppState};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use vocaform_forms::{CreateFormParams, FormSummary};
use vocaform_types::{Form, Question};

/// Request body for `POST /api/forms`.
#[derive(Debug, Deserialize)]
pub struct CreateFormRequest {
    /// Generated when omitted.
    #[serde(default)]
    pub form_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub opening_message: Option<String>,
    #[serde(default)]
    pub closing_message: Option<String>,
    pub questions: Vec<Question>,
}

/// Handler for `POST /api/forms`.
pub async fn create_form_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<CreateFormRequest>,
) -> Result<(StatusCode, Json<Form>), ApiError> {
    let params = CreateFormParams {
        form_id: body
            .form_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        title: body.title,
        description: body.description,
        opening_message: body.opening_message,
        closing_message: body.closing_message,
        questions: body.questions,
    };

    let form = tokio::task::spawn_blocking(move || -> Result<Form, ApiError> {
        let conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        Ok(vocaform_forms::create_form(&conn, &params)?)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))??;

    tracing::info!(
        form_id = %form.id,
        questions = form.questions.len(),
        "form created"
    );
    Ok((StatusCode::CREATED, Json(form)))
}

/// Handler for `GET /api/forms`.
pub async fn list_forms_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<FormSummary>>, ApiError> {
    let forms = tokio::task::spawn_blocking(move || -> Result<Vec<FormSummary>, ApiError> {
        let conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        Ok(vocaform_forms::list_forms(&conn)?)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))??;

    Ok(Json(forms))
}

/// Handler for `GET /api/forms/{formId}`.
pub async fn get_form_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(form_id): Path<String>,
) -> Result<Json<Form>, ApiError> {
    let form = tokio::task::spawn_blocking(move || -> Result<Form, ApiError> {
        let conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        Ok(vocaform_forms::get_form(&conn, &form_id)?)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))??;

    Ok(Json(form))
}
