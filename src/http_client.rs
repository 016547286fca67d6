use anyhow::Context;
use reqwest::Client;

use crate::bench::config::RunConfig;
use crate::bench::events::CancelToken;
use crate::error::{BenchError, ProtocolError, Result};
use crate::models::openai::{ChatCompletionRequest, ChatCompletionResponse};

/// Resolution of a single chat-completion call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Complete response received and parsed
    Response { text: String },
    /// Request exceeded the configured timeout
    TimedOut,
    /// Connection refused, DNS failure, reset...
    TransportError { message: String },
    /// Non-2xx status or a body that does not match the expected shape
    ProtocolError(ProtocolError),
    /// Cut short by cancellation before a response arrived
    Aborted,
}

/// HTTP client issuing one chat-completion request at a time.
///
/// Each call is a single attempt: there is no retry or backoff.
pub struct EndpointClient {
    client: Client,
    url: String,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl EndpointClient {
    /// Create a client for the given run configuration
    pub fn new(config: &RunConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")
            .map_err(BenchError::Internal)?;

        Ok(Self {
            client,
            url: config.completions_url(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send `prompt` and wait for the full response body, or until `cancel` fires.
    ///
    /// Cancellation drops the in-flight request, which closes its connection.
    pub async fn send(&self, prompt: &str, cancel: &CancelToken) -> Outcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(url = %self.url, "Request aborted by cancellation");
                Outcome::Aborted
            }
            outcome = self.execute(prompt) => outcome,
        }
    }

    async fn execute(&self, prompt: &str) -> Outcome {
        let body =
            ChatCompletionRequest::new(&self.model, &self.system_prompt, prompt, self.max_tokens);

        tracing::debug!(url = %self.url, max_tokens = self.max_tokens, "Sending chat completion");

        let response = match self.client.post(&self.url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status();
        tracing::debug!(status = %status, "Received HTTP response");

        // The timeout covers the body as well, so a slow body still maps to TimedOut.
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return classify_transport_error(&e),
        };

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            return Outcome::ProtocolError(ProtocolError::Status {
                status: status.as_u16(),
                body: crate::bench::scorecard::truncate_chars(text.trim(), 200),
            });
        }

        match ChatCompletionResponse::content_from_body(&bytes) {
            Ok(text) => Outcome::Response { text },
            Err(e) => Outcome::ProtocolError(e),
        }
    }
}

/// Map a reqwest failure onto an outcome
fn classify_transport_error(e: &reqwest::Error) -> Outcome {
    if e.is_timeout() {
        return Outcome::TimedOut;
    }

    let kind = if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    };

    tracing::debug!(error_kind = kind, error = ?e, "HTTP request error");

    Outcome::TransportError {
        message: format!("{} ({})", error_chain(e), kind),
    }
}

/// Flatten an error and its sources into one line
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}
