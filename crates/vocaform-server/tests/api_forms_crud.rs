use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vocaform_server::{app, build_engine, config::Config, AppState};

fn setup_app() -> (Router, tempfile::NamedTempFile) {
    let file = tempfile::NamedTempFile::new().unwrap();
    let pool = vocaform_db::create_pool(
        file.path().to_str().unwrap(),
        vocaform_db::DbRuntimeSettings::default(),
    )
    .unwrap();
    vocaform_db::run_migrations(&pool.get().unwrap()).unwrap();
    let engine = Arc::new(build_engine(&Config::default(), pool.clone()).unwrap());
    (app(AppState { pool, engine }), file)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).method(method);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn survey() -> Value {
    json!({
        "form_id": "onboarding",
        "title": "Onboarding survey",
        "closing_message": "Thanks, all done.",
        "questions": [
            { "id": "name", "text": "What should we call you?", "type": "text" },
            { "id": "team", "text": "Which team are you on?", "type": "multiple_choice",
              "options": ["Sales", "Support", "Engineering"] },
            { "id": "mood", "text": "How is your first week going?", "type": "rating", "required": false }
        ]
    })
}

#[tokio::test]
async fn create_get_and_list_forms() {
    let (app, _file) = setup_app();

    let (status, form) = send(&app, "POST", "/api/forms", Some(survey())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(form["id"], "onboarding");
    assert_eq!(form["questions"].as_array().unwrap().len(), 3);
    assert_eq!(form["questions"][1]["type"], "multiple_choice");
    assert_eq!(form["questions"][2]["required"], false);

    let (status, fetched) = send(&app, "GET", "/api/forms/onboarding", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Onboarding survey");
    assert_eq!(fetched["questions"][0]["id"], "name");

    let (status, list) = send(&app, "GET", "/api/forms", None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["form_id"], "onboarding");
    assert_eq!(list[0]["question_count"], 3);
}

#[tokio::test]
async fn form_id_is_generated_when_omitted() {
    let (app, _file) = setup_app();
    let mut body = survey();
    body.as_object_mut().unwrap().remove("form_id");

    let (status, form) = send(&app, "POST", "/api/forms", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(uuid::Uuid::parse_str(form["id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn duplicate_form_is_conflict() {
    let (app, _file) = setup_app();
    send(&app, "POST", "/api/forms", Some(survey())).await;

    let (status, body) = send(&app, "POST", "/api/forms", Some(survey())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("onboarding"));
}

#[tokio::test]
async fn invalid_form_is_bad_request() {
    let (app, _file) = setup_app();

    let mut blank_title = survey();
    blank_title["title"] = json!("  ");
    let (status, _) = send(&app, "POST", "/api/forms", Some(blank_title)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let no_options = json!({
        "title": "Broken",
        "questions": [{ "id": "q", "text": "Pick one", "type": "multiple_choice" }]
    });
    let (status, _) = send(&app, "POST", "/api/forms", Some(no_options)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_form_is_not_found() {
    let (app, _file) = setup_app();
    let (status, body) = send(&app, "GET", "/api/forms/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}
