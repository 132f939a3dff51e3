use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{Value, json};
use shared::llm::{GeminiClient, GeminiConfig, GenerateError, GenerateRequest, GenerationClient};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone)]
struct MockReply {
    status: StatusCode,
    content_type: &'static str,
    body: String,
}

#[derive(Debug, Clone)]
struct TestServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_paths: Arc<Mutex<Vec<String>>>,
    seen_api_keys: Arc<Mutex<Vec<String>>>,
    seen_bodies: Arc<Mutex<Vec<Value>>>,
}

impl TestServerState {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_paths: Arc::new(Mutex::new(Vec::new())),
            seen_api_keys: Arc::new(Mutex::new(Vec::new())),
            seen_bodies: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[tokio::test]
async fn streams_text_fragments_in_order() {
    let state = TestServerState::with_replies(vec![sse_reply(&[
        text_event("Hel"),
        text_event("lo"),
    ])]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let client = client_for(base_url);
    let stream = client
        .stream_generate(generate_request("Hello"))
        .await
        .expect("stream should open");
    let fragments: Vec<Result<String, GenerateError>> = stream.collect().await;

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    let texts: Vec<String> = fragments
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("all fragments should be text");
    assert_eq!(texts, vec!["Hel".to_string(), "lo".to_string()]);

    let seen_paths = state.seen_paths.lock().await.clone();
    assert_eq!(
        seen_paths,
        vec!["gemini-1.5-flash:streamGenerateContent".to_string()]
    );

    let seen_api_keys = state.seen_api_keys.lock().await.clone();
    assert_eq!(seen_api_keys, vec!["test-gemini-key".to_string()]);
}

#[tokio::test]
async fn request_carries_generation_parameters() {
    let state = TestServerState::with_replies(vec![sse_reply(&[text_event("ok")])]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let client = client_for(base_url);
    let stream = client
        .stream_generate(GenerateRequest {
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.2,
            system_instruction: "answer briefly".to_string(),
            prompt: "Hello".to_string(),
        })
        .await
        .expect("stream should open");
    let _: Vec<Result<String, GenerateError>> = stream.collect().await;

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    let seen_bodies = state.seen_bodies.lock().await.clone();
    assert_eq!(seen_bodies.len(), 1);
    let body = &seen_bodies[0];
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
    assert_eq!(body["generationConfig"]["temperature"], 0.2);
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "answer briefly");
}

#[tokio::test]
async fn provider_error_status_fails_the_request() {
    let state = TestServerState::with_replies(vec![MockReply {
        status: StatusCode::TOO_MANY_REQUESTS,
        content_type: "application/json",
        body: json!({
            "error": {
                "code": 429,
                "message": "quota exceeded",
                "status": "RESOURCE_EXHAUSTED"
            }
        })
        .to_string(),
    }]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let client = client_for(base_url);
    let err = client
        .stream_generate(generate_request("Hello"))
        .await
        .err()
        .expect("provider error status should fail the request");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(
        matches!(err, GenerateError::ProviderFailure(ref message)
            if message.contains("status=429") && message.contains("RESOURCE_EXHAUSTED")),
        "expected structured provider error, got {err:?}"
    );
}

#[tokio::test]
async fn midstream_error_event_terminates_the_stream() {
    let state = TestServerState::with_replies(vec![sse_reply(&[
        text_event("partial"),
        json!({ "error": { "code": 503, "message": "overloaded" } }),
    ])]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let client = client_for(base_url);
    let stream = client
        .stream_generate(generate_request("Hello"))
        .await
        .expect("stream should open");
    let fragments: Vec<Result<String, GenerateError>> = stream.collect().await;

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[0].as_deref().expect("first fragment"), "partial");
    assert!(
        matches!(fragments[1], Err(GenerateError::ProviderFailure(ref message))
            if message.contains("overloaded")),
        "expected mid-stream provider failure, got {:?}",
        fragments[1]
    );
}

fn generate_request(prompt: &str) -> GenerateRequest {
    GenerateRequest {
        model: "gemini-1.5-flash".to_string(),
        temperature: 1.0,
        system_instruction: String::new(),
        prompt: prompt.to_string(),
    }
}

fn client_for(base_url: String) -> GeminiClient {
    GeminiClient::from_config(GeminiConfig {
        base_url,
        api_key: Some("test-gemini-key".to_string()),
        timeout_ms: 5_000,
    })
    .expect("client should build")
    .expect("api key is configured")
}

fn text_event(text: &str) -> Value {
    json!({
        "candidates": [
            { "content": { "parts": [{ "text": text }] } }
        ]
    })
}

fn sse_reply(events: &[Value]) -> MockReply {
    let body = events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect();

    MockReply {
        status: StatusCode::OK,
        content_type: "text/event-stream",
        body,
    }
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route(
            "/v1beta/models/{model_call}",
            post(test_stream_generate_handler),
        )
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (format!("http://{local_addr}"), shutdown_tx, server_task)
}

async fn test_stream_generate_handler(
    State(state): State<TestServerState>,
    Path(model_call): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    state.seen_paths.lock().await.push(model_call);
    state.seen_bodies.lock().await.push(payload);

    if let Some(value) = headers
        .get("x-goog-api-key")
        .and_then(|header| header.to_str().ok())
    {
        state.seen_api_keys.lock().await.push(value.to_string());
    }

    let reply = state
        .replies
        .lock()
        .await
        .pop_front()
        .unwrap_or(MockReply {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            content_type: "application/json",
            body: json!({ "error": { "message": "no scripted reply" } }).to_string(),
        });

    (
        reply.status,
        [(header::CONTENT_TYPE, reply.content_type)],
        reply.body,
    )
}
