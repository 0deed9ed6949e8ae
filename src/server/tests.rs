use super::*;
use crate::Result as QaResult;
use crate::embeddings::HashingEmbedder;
use crate::server::errors::{EMPTY_QUESTION_ERROR, NOT_INDEXED_ANSWER, NOT_INDEXED_ERROR};
use crate::server::handlers::sanitize_file_name;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "pdf-qa-test-boundary";

struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    fn model(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> QaResult<String> {
        Ok(format!("echo: {} chars", prompt.chars().count()))
    }
}

fn test_app(temp_dir: &TempDir) -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.persist_dir = temp_dir.path().join("vector_store");
    config.upload_dir = temp_dir.path().join("uploads");
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 20;

    let state = Arc::new(AppState::new(
        Arc::new(config),
        Arc::new(HashingEmbedder::new(128)),
        Arc::new(EchoGenerator),
    ));
    (router(Arc::clone(&state)), state)
}

fn multipart_request(field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload-pdf")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("valid request")
}

fn ask_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_ok() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, _) = test_app(&temp_dir);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("valid request");
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn ask_before_upload_is_bad_request() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, _) = test_app(&temp_dir);

    let (status, body) = send(&app, ask_request(&json!({"question": "What?"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": NOT_INDEXED_ERROR, "answer": NOT_INDEXED_ANSWER})
    );
}

#[tokio::test]
async fn upload_then_ask_returns_answer_and_sources() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, state) = test_app(&temp_dir);

    let (status, body) = send(
        &app,
        multipart_request(
            "file",
            "../../warranty.txt",
            b"The warranty covers parts for two years.\n\nLabour is covered for ninety days.",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        json!({
            "success": true,
            "message": "PDF 'warranty.txt' uploaded and processed successfully!"
        })
    );
    assert!(state.config.upload_dir.join("warranty.txt").exists());

    let (status, body) = send(
        &app,
        ask_request(&json!({"question": "How long is the warranty?", "top_k": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(
        body["answer"]
            .as_str()
            .is_some_and(|a| a.starts_with("echo:"))
    );
    let sources = body["sources"].as_array().expect("sources array");
    assert_eq!(sources.len(), 1);
    assert!(
        sources[0]["source"]
            .as_str()
            .is_some_and(|s| s.ends_with("warranty.txt"))
    );
    assert!(sources[0].get("page").is_none());
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, _) = test_app(&temp_dir);

    let (status, body) = send(&app, multipart_request("document", "a.pdf", b"data")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("No file provided"));
}

#[tokio::test]
async fn upload_rejects_unsupported_and_empty_files() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, state) = test_app(&temp_dir);

    let (unsupported, _) = send(&app, multipart_request("file", "photo.png", b"png")).await;
    let (empty, _) = send(&app, multipart_request("file", "empty.pdf", b"")).await;

    assert_eq!(unsupported, StatusCode::BAD_REQUEST);
    assert_eq!(empty, StatusCode::BAD_REQUEST);
    assert!(!state.config.persist_dir.exists());
}

#[tokio::test]
async fn malformed_pdf_is_bad_request() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, state) = test_app(&temp_dir);

    let (status, body) = send(
        &app,
        multipart_request("file", "broken.pdf", b"definitely not a pdf"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(!state.config.upload_dir.join("broken.pdf").exists());
    assert!(!state.config.persist_dir.exists());
}

#[tokio::test]
async fn blank_question_is_bad_request() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, _) = test_app(&temp_dir);

    let (status, body) = send(&app, ask_request(&json!({"question": "   "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!(EMPTY_QUESTION_ERROR));
}

#[tokio::test]
async fn malformed_ask_body_is_bad_request() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, _) = test_app(&temp_dir);

    let (status, body) = send(&app, ask_request(&json!({"top_k": 2}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["answer"].as_str().is_some_and(|a| a.starts_with("Error processing question:")));
}

#[tokio::test]
async fn store_from_other_model_is_server_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (app, state) = test_app(&temp_dir);

    let source = temp_dir.path().join("notes.txt");
    std::fs::write(&source, "Some indexed notes.").expect("should write file");
    Indexer::new(Arc::clone(&state.config), Arc::new(HashingEmbedder::new(64)))
        .build_index(&source, &state.config.persist_dir)
        .await
        .expect("index with another model");

    let (status, body) = send(&app, ask_request(&json!({"question": "Notes?"}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().expect("error message");
    assert!(message.contains("mismatch"), "{message}");
    assert_eq!(
        body["answer"],
        json!(format!("Error processing question: {message}"))
    );
}

#[test]
fn file_names_keep_only_last_component() {
    assert_eq!(
        sanitize_file_name("../../etc/passwd.pdf"),
        Some("passwd.pdf".to_string())
    );
    assert_eq!(
        sanitize_file_name("C:\\Users\\me\\report.pdf"),
        Some("report.pdf".to_string())
    );
    assert_eq!(sanitize_file_name("dir/"), None);
    assert_eq!(sanitize_file_name(".."), None);
}
