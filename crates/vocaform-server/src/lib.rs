//! Vocaform server library logic.

pub mod api;
pub mod api_conversations;
pub mod api_forms;
pub mod background;
pub mod config;
pub mod notify;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use config::Config;
use notify::WebhookNotifier;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vocaform_conversation::{
    ConversationEngine, NotifyError, SqliteFormProvider, SqliteSessionStore,
};
use vocaform_db::DbPool;
use vocaform_voice::SttService;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Runs every conversation turn.
    pub engine: Arc<ConversationEngine>,
}

/// Maximum request body size for JSON endpoints (2 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Maximum body size for raw audio turns (10 MiB).
const MAX_AUDIO_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the SQLite-backed conversation engine described by `config`.
///
/// Audio turns get a whisper transcriber only when `stt.enabled` is set.
/// Completions go to the webhook when one is configured and to the log
/// otherwise.
pub fn build_engine(config: &Config, pool: DbPool) -> Result<ConversationEngine, NotifyError> {
    let mut engine = ConversationEngine::new(
        Arc::new(SqliteFormProvider::new(pool.clone())),
        Arc::new(SqliteSessionStore::new(pool)),
        config.conversation.to_policy(),
    );

    if config.stt.enabled {
        tracing::info!(
            binary = %config.stt.settings.binary_path.display(),
            model = %config.stt.settings.model_path.display(),
            "speech-to-text enabled"
        );
        engine = engine.with_transcriber(Arc::new(SttService::from_config(&config.stt.settings)));
    }

    if let Some(url) = &config.notifications.webhook_url {
        let notifier = WebhookNotifier::new(
            url.clone(),
            Duration::from_secs(config.notifications.timeout_seconds),
        )?;
        tracing::info!(url = %notifier.url(), "completion webhook enabled");
        engine = engine.with_notifier(Arc::new(notifier));
    }

    Ok(engine)
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let audio_routes = Router::new()
        .route(
            "/api/conversations/{conversationId}/audio",
            post(api_conversations::submit_audio_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BODY_BYTES));

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/forms",
            post(api_forms::create_form_handler).get(api_forms::list_forms_handler),
        )
        .route("/api/forms/{formId}", get(api_forms::get_form_handler))
        .route(
            "/api/forms/{formId}/conversations",
            post(api_conversations::start_conversation_handler),
        )
        .route(
            "/api/conversations/{conversationId}",
            get(api_conversations::get_conversation_handler),
        )
        .route(
            "/api/conversations/{conversationId}/turns",
            post(api_conversations::submit_turn_handler),
        )
        .merge(audio_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
