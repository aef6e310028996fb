//! OpenRouterClient against a local chat-completions stub

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use goal_roadmap::clients::traits::{BackendError, ChatBackend, ChatMessage, ChatRequest};
use goal_roadmap::clients::OpenRouterClient;
use goal_roadmap::config::ProviderConfig;
use goal_roadmap::invoker::{InvokerError, ProviderRegistry, ResilientInvoker};
use serde_json::{Value, json};

const TOKEN: &str = "sk-or-stub";

#[derive(Clone, Default)]
struct Stub {
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl Stub {
    fn hits(&self, model: &str) -> usize {
        self.hits.lock().unwrap().get(model).copied().unwrap_or(0)
    }
}

fn completion(content: &str) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

async fn chat(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != format!("Bearer {}", TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let model = body["model"].as_str().unwrap_or_default().to_string();
    *stub.hits.lock().unwrap().entry(model.clone()).or_insert(0) += 1;

    match model.as_str() {
        "limited" => (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "7")], "slow down")
            .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(completion("too late")).into_response()
        }
        "fenced" => Json(completion("```json\n[1]\n```")).into_response(),
        _ => Json(completion("hello from ok")).into_response(),
    }
}

async fn spawn_stub() -> (String, Stub) {
    let stub = Stub::default();
    let app = Router::new()
        .route("/chat/completions", post(chat))
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), stub)
}

fn client(base_url: &str, api_key: Option<&str>) -> OpenRouterClient {
    let cfg = ProviderConfig {
        base_url: base_url.to_string(),
        api_key: api_key.map(str::to_string),
        ..ProviderConfig::default()
    };
    OpenRouterClient::from_config(&cfg).unwrap()
}

fn request() -> ChatRequest {
    ChatRequest {
        messages: vec![ChatMessage::user("hi")],
        temperature: 0.5,
        max_tokens: 64,
        response_format: Default::default(),
    }
}

fn registry(models: &[&str], tier_ms: u64) -> ProviderRegistry {
    ProviderRegistry {
        models: models.iter().map(|m| m.to_string()).collect(),
        timeout_tiers: vec![Duration::from_millis(tier_ms)],
        max_retries: 1,
        retry_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_successful_completion_returns_content() {
    let (base, stub) = spawn_stub().await;
    let text = client(&base, Some(TOKEN))
        .complete("ok", &request(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(text, "hello from ok");
    assert_eq!(stub.hits("ok"), 1);
}

#[tokio::test]
async fn test_429_maps_to_rate_limit_with_retry_after() {
    let (base, _stub) = spawn_stub().await;
    let err = client(&base, Some(TOKEN))
        .complete("limited", &request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    match err {
        BackendError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Some(Duration::from_secs(7)))
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let (base, _stub) = spawn_stub().await;
    let err = client(&base, Some(TOKEN))
        .complete("broken", &request(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, BackendError::Status { status: 500, ref body } if body.contains("exploded")));
}

#[tokio::test]
async fn test_invoker_walks_models_over_real_transport() {
    let (base, stub) = spawn_stub().await;
    let invoker = ResilientInvoker::new(
        Arc::new(client(&base, Some(TOKEN))),
        registry(&["limited", "broken", "ok"], 5_000),
    );

    let invocation = invoker.invoke(&request()).await.unwrap();

    assert_eq!(invocation.model, "ok");
    assert_eq!(invocation.content, "hello from ok");
    assert_eq!(stub.hits("limited"), 1);
    assert_eq!(stub.hits("broken"), 2);
    assert_eq!(stub.hits("ok"), 1);
}

#[tokio::test]
async fn test_slow_model_times_out_and_falls_through() {
    let (base, stub) = spawn_stub().await;
    let invoker = ResilientInvoker::new(
        Arc::new(client(&base, Some(TOKEN))),
        registry(&["slow", "fenced"], 200),
    );

    let invocation = invoker.invoke(&request()).await.unwrap();

    assert_eq!(invocation.model, "fenced");
    assert_eq!(invocation.content, "```json\n[1]\n```");
    assert_eq!(stub.hits("slow"), 2);
}

#[tokio::test]
async fn test_missing_credential_sends_nothing() {
    let (base, stub) = spawn_stub().await;
    let backend = client(&base, None);
    assert!(!backend.is_configured());

    let invoker = ResilientInvoker::new(Arc::new(backend), registry(&["ok"], 5_000));
    let err = invoker.invoke(&request()).await.unwrap_err();

    assert!(matches!(err, InvokerError::Exhausted { attempts: 1, .. }));
    assert_eq!(stub.hits("ok"), 0);
}
