use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use vocaform_conversation::{
    CompletionNotifier, CompletionReport, ConversationEngine, MemorySessionStore, NotifyError,
    StaticFormProvider,
};
use vocaform_server::notify::WebhookNotifier;
use vocaform_types::{ConversationPolicy, ConversationState, Form, Question, QuestionType};

fn form() -> Form {
    Form {
        id: "nps".to_string(),
        title: "Quick score".to_string(),
        description: None,
        opening_message: None,
        closing_message: None,
        questions: vec![Question {
            id: "score".to_string(),
            text: "How likely are you to recommend us?".to_string(),
            question_type: QuestionType::Rating,
            options: None,
            required: true,
            order: 0,
        }],
        created_at: None,
    }
}

/// Starts a receiver on an ephemeral port that answers with `status` and
/// forwards every payload to the returned channel.
async fn spawn_receiver(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let router = Router::new()
        .route(
            "/hook",
            post(
                move |State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>| async move {
                    let _ = tx.send(body);
                    status
                },
            ),
        )
        .with_state(tx);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}/hook", addr), rx)
}

#[tokio::test]
async fn completed_conversation_is_posted() {
    let (url, mut rx) = spawn_receiver(StatusCode::OK).await;
    let notifier = WebhookNotifier::new(url, Duration::from_secs(5)).unwrap();
    let engine = ConversationEngine::new(
        Arc::new(StaticFormProvider::new([form()])),
        Arc::new(MemorySessionStore::new()),
        ConversationPolicy::default(),
    )
    .with_notifier(Arc::new(notifier));

    let id = engine.start("nps", None).await.unwrap().conversation_id;
    let reply = engine.submit_text(&id, "five").await.unwrap();
    assert!(reply.is_complete);

    let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload["form"]["id"], "nps");
    assert_eq!(payload["conversation"]["conversation_id"], id.as_str());
    assert_eq!(payload["answers"][0]["question_id"], "score");
    assert_eq!(
        payload["answers"][0]["processed_value"],
        serde_json::json!({ "kind": "rating", "value": 5 })
    );
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let (url, _rx) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
    let notifier = WebhookNotifier::new(url, Duration::from_secs(5)).unwrap();
    let report = CompletionReport::new(
        form(),
        ConversationState::new("c1", "nps", "r1", form().questions, chrono::Utc::now()),
    );

    let err = notifier.notify(&report).await.unwrap_err();
    assert!(matches!(err, NotifyError::Rejected(500)));
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let notifier =
        WebhookNotifier::new(format!("http://{}/hook", addr), Duration::from_secs(2)).unwrap();
    let report = CompletionReport::new(
        form(),
        ConversationState::new("c1", "nps", "r1", vec![], chrono::Utc::now()),
    );

    let err = notifier.notify(&report).await.unwrap_err();
    assert!(matches!(err, NotifyError::Transport(_)));
}
