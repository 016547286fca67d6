//! Mock OpenAI-compatible chat-completion server for demos and tests.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::config::MockServerConfig;
use crate::models::openai::{ChatCompletionRequest, ChatCompletionResponse};

struct MockState {
    config: MockServerConfig,
    requests: Arc<AtomicUsize>,
}

/// Mock chat-completion server
pub struct MockChatServer {
    config: MockServerConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
    requests: Arc<AtomicUsize>,
}

impl MockChatServer {
    /// Create a new mock server with the given configuration
    pub fn new(config: MockServerConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            port: 0,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start the mock server and return the actual port
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("127.0.0.1:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        self.port = port;

        let state = Arc::new(MockState {
            config: self.config.clone(),
            requests: self.requests.clone(),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = Router::new()
            .route("/v1/chat/completions", post(handle_completion))
            .route("/chat/completions", post(handle_completion))
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        tracing::debug!(port, "Mock chat server listening");
        Ok(port)
    }

    /// Base URL to configure as the endpoint (includes `/v1`)
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/v1", self.port)
    }

    /// Number of completion requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle /chat/completions requests
async fn handle_completion(
    State(state): State<Arc<MockState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Response {
    let n = state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    let config = &state.config;

    let (delay, fail) = {
        let mut rng = rand::thread_rng();
        let jitter = if config.jitter_ms > 0 {
            rng.gen_range(0..=config.jitter_ms)
        } else {
            0
        };
        let fail = (config.fail_every > 0 && n % config.fail_every == 0)
            || (config.error_rate > 0.0 && rng.gen::<f64>() < config.error_rate);
        (Duration::from_millis(config.latency_ms + jitter), fail)
    };

    tokio::time::sleep(delay).await;

    if fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Simulated error").into_response();
    }

    let prompt = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    let content = generate_content(prompt, config.content_size);

    let response = ChatCompletionResponse::new(
        format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        request.model,
        content,
    );
    (StatusCode::OK, Json(response)).into_response()
}

/// Generate a moth-flavoured answer of roughly the requested size
fn generate_content(prompt: &str, size: usize) -> String {
    const WORDS: &[&str] = &[
        "the", "moth", "flies", "toward", "a", "distant", "lamp", "while", "silk", "wings",
        "beat", "softly", "under", "moonlight", "and", "dust", "settles", "on", "every", "cocoon",
    ];

    let mut rng = rand::thread_rng();
    let mut result = String::with_capacity(size + 32);
    let topic: String = prompt.chars().take(24).collect();
    if !topic.is_empty() {
        result.push_str("Re: ");
        result.push_str(&topic);
        result.push_str(" -");
    }

    while result.len() < size {
        let word = WORDS[rng.gen_range(0..WORDS.len())];
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }

    result
}
