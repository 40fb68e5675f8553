use std::sync::Arc;

use async_trait::async_trait;
use docqa_rag::{Generator, HashingEmbeddingProvider, Orchestrator, RagConfig, RagError};
use docqa_server::{AppState, ErrorBody, app_router};
use serde_json::{Value, json};

/// Echoes the question it was asked; follow-ups become `standalone: <question>`.
struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str, _temperature: f32) -> docqa_rag::Result<String> {
        if let Some(rest) = prompt.strip_suffix("\nStandalone question:") {
            let follow_up = rest.rsplit("Follow Up Input: ").next().unwrap_or_default();
            return Ok(format!("standalone: {follow_up}"));
        }
        let question = prompt
            .strip_suffix("\nHelpful Answer:")
            .and_then(|rest| rest.rsplit("Question: ").next())
            .unwrap_or_default();
        Ok(format!("echo: {question}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

struct DownGenerator;

#[async_trait]
impl Generator for DownGenerator {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> docqa_rag::Result<String> {
        Err(RagError::generation("down", "upstream unavailable"))
    }

    fn name(&self) -> &str {
        "down"
    }
}

async fn spawn_server(generator: Arc<dyn Generator>) -> (String, tokio::task::JoinHandle<()>) {
    let orchestrator = Orchestrator::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .generator(generator)
        .build()
        .expect("orchestrator");
    let app = app_router(AppState::new(orchestrator));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let created: Value = client
        .post(format!("{}/api/sessions", base))
        .send()
        .await
        .expect("session create response")
        .json()
        .await
        .expect("session json");
    created.get("session_id").and_then(Value::as_str).expect("session_id field").to_string()
}

fn manual() -> Value {
    json!({
        "document_id": "manual.pdf",
        "pages": [
            {"number": 1, "text": "The warranty covers manufacturing defects for two years."},
            {"number": 2, "text": "The battery lasts roughly ten hours on a full charge."}
        ]
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, handle) = spawn_server(Arc::new(EchoGenerator)).await;
    let body: Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    handle.abort();
}

#[tokio::test]
async fn upload_then_ask_and_follow_up() {
    let (base, handle) = spawn_server(Arc::new(EchoGenerator)).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let upload = client
        .post(format!("{}/api/sessions/{}/documents", base, session_id))
        .json(&manual())
        .send()
        .await
        .expect("upload response");
    assert!(upload.status().is_success());
    let report: Value = upload.json().await.unwrap();
    assert_eq!(report["document_id"], "manual.pdf");
    assert_eq!(report["pages"], 2);
    assert_eq!(report["chunks"], 2);

    let first: Value = client
        .post(format!("{}/api/sessions/{}/ask", base, session_id))
        .json(&json!({"question": "How long is the warranty?", "chat_history": []}))
        .send()
        .await
        .expect("ask response")
        .json()
        .await
        .unwrap();
    assert_eq!(first["answer"], "echo: How long is the warranty?");
    assert_eq!(first["standalone_question"], "How long is the warranty?");
    let sources = first["source_documents"].as_array().expect("source_documents");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["source"], "manual.pdf");

    let follow_up: Value = client
        .post(format!("{}/api/sessions/{}/ask", base, session_id))
        .json(&json!({"question": "And the battery?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(follow_up["standalone_question"], "standalone: And the battery?");

    let status: Value = client
        .get(format!("{}/api/sessions/{}", base, session_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["phase"], "ready");
    assert_eq!(status["turns"], 2);
    assert_eq!(status["history"][1]["question"], "And the battery?");

    handle.abort();
}

#[tokio::test]
async fn client_chat_history_does_not_override_server_history() {
    let (base, handle) = spawn_server(Arc::new(EchoGenerator)).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;
    client
        .post(format!("{}/api/sessions/{}/documents", base, session_id))
        .json(&manual())
        .send()
        .await
        .expect("upload response");

    let stale_history = json!([
        {"question": "What is the warranty?", "answer": "Two years."},
        {"question": "And refurbished?", "answer": "Six months."},
    ]);
    let response = client
        .post(format!("{}/api/sessions/{}/ask", base, session_id))
        .json(&json!({"question": "How long does the battery last?", "chat_history": stale_history}))
        .send()
        .await
        .expect("ask response");
    assert!(response.status().is_success());
    let answer: Value = response.json().await.unwrap();
    // The server history is empty, so the question is not condensed.
    assert_eq!(answer["standalone_question"], "How long does the battery last?");

    let status: Value = client
        .get(format!("{}/api/sessions/{}", base, session_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["turns"], 1);

    handle.abort();
}

#[tokio::test]
async fn ask_before_upload_is_conflict() {
    let (base, handle) = spawn_server(Arc::new(EchoGenerator)).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let response = client
        .post(format!("{}/api/sessions/{}/ask", base, session_id))
        .json(&json!({"question": "Anything?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.kind, "not_ready");

    handle.abort();
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (base, handle) = spawn_server(Arc::new(EchoGenerator)).await;
    let response = reqwest::Client::new()
        .post(format!("{}/api/sessions/missing/ask", base))
        .json(&json!({"question": "Anything?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.kind, "session_not_found");
    handle.abort();
}

#[tokio::test]
async fn empty_document_and_blank_question_are_rejected() {
    let (base, handle) = spawn_server(Arc::new(EchoGenerator)).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let empty = client
        .post(format!("{}/api/sessions/{}/documents", base, session_id))
        .json(&json!({"document_id": "scan.pdf", "pages": [{"number": 1, "text": "  "}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = empty.json().await.unwrap();
    assert_eq!(body.kind, "ingestion");

    client
        .post(format!("{}/api/sessions/{}/documents", base, session_id))
        .json(&manual())
        .send()
        .await
        .unwrap();
    let blank = client
        .post(format!("{}/api/sessions/{}/ask", base, session_id))
        .json(&json!({"question": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status(), reqwest::StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn generator_failure_is_bad_gateway() {
    let (base, handle) = spawn_server(Arc::new(DownGenerator)).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;
    client
        .post(format!("{}/api/sessions/{}/documents", base, session_id))
        .json(&manual())
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/sessions/{}/ask", base, session_id))
        .json(&json!({"question": "How long is the warranty?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.kind, "generation");

    handle.abort();
}

#[tokio::test]
async fn reset_returns_session_to_idle() {
    let (base, handle) = spawn_server(Arc::new(EchoGenerator)).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;
    client
        .post(format!("{}/api/sessions/{}/documents", base, session_id))
        .json(&manual())
        .send()
        .await
        .unwrap();

    let status: Value = client
        .post(format!("{}/api/sessions/{}/reset", base, session_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["phase"], "idle");
    assert_eq!(status["indexed_chunks"], 0);

    let deleted = client
        .delete(format!("{}/api/sessions/{}", base, session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), reqwest::StatusCode::NO_CONTENT);

    handle.abort();
}
