//! Integration tests for the Ollama client.
//!
//! These tests run the client against a mock generate endpoint bound to a
//! random local port.

mod common;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use common::{alert, files_in, test_config, RecordingCluster};
use responder::{
    IncidentOutcome, InferenceClient, InferenceConfig, InferenceError, OllamaClient, Pipeline,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

// =============================================================================
// Mock Ollama Server
// =============================================================================

#[derive(Default)]
struct MockOllamaState {
    /// Every request body received
    requests: RwLock<Vec<Value>>,
}

async fn mock_generate(
    State(state): State<Arc<MockOllamaState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    state.requests.write().await.push(body);

    let response = if prompt.starts_with("You are the Director") {
        "RCA: pool exhaustion.\nRemediation: RESTART DEPLOYMENT cartservice IN online-boutique"
    } else {
        "Connection pool saturation on cartservice."
    };
    Json(json!({ "model": "sre-kernel", "response": response, "done": true }))
}

async fn mock_unavailable() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "model is loading")
}

async fn mock_garbage() -> impl IntoResponse {
    (StatusCode::OK, "<html>proxy error</html>")
}

/// Start a mock Ollama server on a random port.
async fn start_mock_ollama() -> (SocketAddr, Arc<MockOllamaState>) {
    let state = Arc::new(MockOllamaState::default());

    let app = Router::new()
        .route("/api/generate", post(mock_generate))
        .route("/unavailable", post(mock_unavailable))
        .route("/garbage", post(mock_garbage))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, state)
}

fn client_for(addr: SocketAddr, path: &str) -> OllamaClient {
    OllamaClient::new(&InferenceConfig {
        url: format!("http://{addr}{path}"),
        model: "sre-kernel".to_string(),
        timeout_secs: 5,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_generate_sends_model_prompt_and_no_stream() {
    let (addr, state) = start_mock_ollama().await;
    let client = client_for(addr, "/api/generate");

    let answer = client.generate("Why is cartservice slow?").await.unwrap();
    assert_eq!(answer, "Connection pool saturation on cartservice.");

    let requests = state.requests.read().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0],
        json!({ "model": "sre-kernel", "prompt": "Why is cartservice slow?", "stream": false })
    );
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let (addr, _state) = start_mock_ollama().await;
    let client = client_for(addr, "/unavailable");

    match client.generate("anything").await {
        Err(InferenceError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "model is loading");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_body_is_an_error() {
    let (addr, _state) = start_mock_ollama().await;
    let client = client_for(addr, "/garbage");

    assert!(matches!(
        client.generate("anything").await,
        Err(InferenceError::Http(_))
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_an_error() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, "/api/generate");
    assert!(client.generate("anything").await.is_err());
}

#[tokio::test]
async fn test_pipeline_over_http_inference() {
    let (addr, state) = start_mock_ollama().await;
    let dir = TempDir::new().unwrap();

    let mut config = test_config(dir.path());
    config.inference.url = format!("http://{addr}/api/generate");
    let cluster = Arc::new(RecordingCluster::healthy());
    let pipeline = Pipeline::new(
        &config,
        Arc::new(OllamaClient::new(&config.inference)),
        cluster.clone(),
    );

    let processed = pipeline
        .process(&alert("HighLatency", "online-boutique", "cartservice"))
        .await;

    assert_eq!(processed.outcome, IncidentOutcome::Remediated);
    // Three specialists plus the director
    assert_eq!(state.requests.read().await.len(), 4);
    assert_eq!(cluster.mutations().len(), 1);
    assert_eq!(files_in(&dir.path().join("post-mortems")).len(), 1);
}
