//! In-process mock inference server.

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lantern_config::SharedConfiguration;
use lantern_core::ServerConfigurationBuilder;
use futures::StreamExt;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Pieces the mock streams for a generate or chat call.
pub const STREAM_PIECES: [&str; 3] = ["The quick", " brown", " fox"];

/// Tokens the mock reports for every generation.
pub const TOKENS: u32 = 7;

/// How the mock answers generation requests.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Answer normally
    Normal,
    /// Sleep before answering
    Slow(Duration),
    /// Answer with this status code
    Status(u16),
    /// Stream the first piece, then go silent without closing
    Stall,
}

#[derive(Clone)]
struct MockState {
    behavior: Behavior,
    hits: Arc<AtomicUsize>,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

/// A running mock server.
pub struct MockServer {
    /// Bound address
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl MockServer {
    /// Start a mock on an ephemeral port.
    pub async fn start(behavior: Behavior) -> Self {
        let state = MockState {
            behavior,
            hits: Arc::new(AtomicUsize::new(0)),
            arrivals: Arc::new(Mutex::new(Vec::new())),
        };
        let hits = state.hits.clone();
        let arrivals = state.arrivals.clone();

        let app = Router::new()
            .route("/api/tags", get(tags))
            .route("/api/generate", post(generate))
            .route("/api/chat", post(chat))
            .route("/api/embeddings", post(embeddings))
            .route("/api/pull", post(pull))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            hits,
            arrivals,
        }
    }

    /// Generation requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Arrival times of generation requests.
    pub fn arrivals(&self) -> Vec<Instant> {
        self.arrivals.lock().unwrap().clone()
    }

    /// Configuration pointing at this mock.
    pub fn config(&self, max_retries: u32, retry_delay: f64, timeout: f64) -> SharedConfiguration {
        config_for(self.addr.port(), max_retries, retry_delay, timeout)
    }
}

/// Configuration for a server on localhost at `port`.
pub fn config_for(port: u16, max_retries: u32, retry_delay: f64, timeout: f64) -> SharedConfiguration {
    let config = ServerConfigurationBuilder::default()
        .name("mock")
        .host("127.0.0.1")
        .port(port)
        .max_retries(max_retries)
        .retry_delay_seconds(retry_delay)
        .timeout_seconds(timeout)
        .max_concurrent_requests(1usize)
        .request_queue_size(1usize)
        .build()
        .unwrap();
    Arc::new(RwLock::new(config))
}

/// A localhost port with nothing listening on it.
pub fn unreachable_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn tags() -> Json<Value> {
    Json(json!({"models": [{"name": "llama3.1:8b", "size": 4_661_224_676u64}, {"name": "nomic-embed-text"}]}))
}

async fn misbehave(state: &MockState) -> Option<Response> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.arrivals.lock().unwrap().push(Instant::now());
    match state.behavior {
        Behavior::Normal | Behavior::Stall => None,
        Behavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            None
        }
        Behavior::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap();
            Some((status, "mock failure").into_response())
        }
    }
}

fn ndjson(lines: Vec<Value>) -> Response {
    let parts: Vec<Result<Bytes, Infallible>> = lines
        .into_iter()
        .map(|line| Ok(Bytes::from(format!("{line}\n"))))
        .collect();
    Response::builder()
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(futures::stream::iter(parts)))
        .unwrap()
}

async fn generate(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    if let Some(response) = misbehave(&state).await {
        return response;
    }
    let model = body["model"].as_str().unwrap_or_default().to_string();
    if matches!(state.behavior, Behavior::Stall) {
        let first = json!({"model": model, "response": STREAM_PIECES[0], "done": false});
        let parts = futures::stream::iter([Ok::<_, Infallible>(Bytes::from(format!("{first}\n")))])
            .chain(futures::stream::pending());
        return Response::builder()
            .header("content-type", "application/x-ndjson")
            .body(Body::from_stream(parts))
            .unwrap();
    }
    if body["stream"].as_bool().unwrap_or(true) {
        let mut lines: Vec<Value> = STREAM_PIECES
            .iter()
            .map(|piece| json!({"model": model, "response": piece, "done": false}))
            .collect();
        lines.push(json!({
            "model": model, "response": "", "done": true, "done_reason": "stop",
            "eval_count": TOKENS, "eval_duration": 120_000_000u64
        }));
        ndjson(lines)
    } else {
        Json(json!({
            "model": model,
            "response": STREAM_PIECES.concat(),
            "done": true,
            "done_reason": "stop",
            "eval_count": TOKENS,
            "eval_duration": 120_000_000u64,
            "prompt_eval_count": 12
        }))
        .into_response()
    }
}

async fn chat(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    if let Some(response) = misbehave(&state).await {
        return response;
    }
    let model = body["model"].as_str().unwrap_or_default().to_string();
    let turns = body["messages"].as_array().map(Vec::len).unwrap_or(0);
    let reply = format!("{} turns", turns);
    if body["stream"].as_bool().unwrap_or(true) {
        ndjson(vec![
            json!({"model": model, "message": {"role": "assistant", "content": reply}, "done": false}),
            json!({"model": model, "message": {"role": "assistant", "content": ""}, "done": true, "eval_count": TOKENS}),
        ])
    } else {
        Json(json!({
            "model": model,
            "message": {"role": "assistant", "content": reply},
            "done": true,
            "eval_count": TOKENS
        }))
        .into_response()
    }
}

async fn embeddings(State(state): State<MockState>) -> Response {
    if let Some(response) = misbehave(&state).await {
        return response;
    }
    Json(json!({"embedding": [0.25, -0.5, 1.0, 0.0]})).into_response()
}

async fn pull(Json(body): Json<Value>) -> Response {
    let name = body["name"].as_str().unwrap_or_default();
    if name == "missing" {
        return ndjson(vec![
            json!({"status": "pulling manifest"}),
            json!({"error": "pull model manifest: file does not exist"}),
        ]);
    }
    if name == "partial" {
        return ndjson(vec![json!({"status": "pulling manifest"})]);
    }
    ndjson(vec![
        json!({"status": "pulling manifest"}),
        json!({"status": "downloading", "digest": "sha256:abc", "total": 100, "completed": 50}),
        json!({"status": "downloading", "digest": "sha256:abc", "total": 100, "completed": 100}),
        json!({"status": "success"}),
    ])
}
