//! Configuration structs for benchmarking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BenchError, Result};

/// Default system prompt sent with every benchmark request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a precise assistant being benchmarked with \
moth-themed logic, math, code and reasoning tasks. Answer clearly and concisely, show \
reasoning for logic/math, and return valid code where requested.";

pub const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:8081/v1";
pub const DEFAULT_MODEL: &str = "local-model";
pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Configuration for the mock chat-completion server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockServerConfig {
    /// Port to listen on (0 for random)
    pub port: u16,
    /// Simulated processing time per request in milliseconds
    pub latency_ms: u64,
    /// Random extra latency added on top, in milliseconds
    pub jitter_ms: u64,
    /// Error rate (0.0 to 1.0)
    pub error_rate: f64,
    /// Answer every Nth request with a 500 (0 disables)
    pub fail_every: usize,
    /// Size of the generated answer in characters
    pub content_size: usize,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            latency_ms: 50,
            jitter_ms: 0,
            error_rate: 0.0,
            fail_every: 0,
            content_size: 200,
        }
    }
}

/// Immutable snapshot of the settings for one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Base URL of the OpenAI-compatible API (e.g. `http://127.0.0.1:8081/v1`)
    pub endpoint_url: String,
    /// Model name sent in the request body
    pub model: String,
    /// Completion budget per request
    pub max_tokens: u32,
    /// System message; left out of the request when blank
    pub system_prompt: String,
    /// Total per-request timeout in seconds
    pub timeout_secs: u64,
    /// Connection establishment timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl RunConfig {
    /// Config pointing at the given endpoint with every other setting at its default
    pub fn for_endpoint(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }

    /// Reject configurations that cannot produce a single valid request
    pub fn validate(&self) -> Result<()> {
        let trimmed = self.endpoint_url.trim();
        if trimmed.is_empty() {
            return Err(BenchError::Config("endpoint_url is required".to_string()));
        }

        let url = reqwest::Url::parse(trimmed).map_err(|e| {
            BenchError::Config(format!("invalid endpoint_url '{}': {}", trimmed, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BenchError::Config(format!(
                "endpoint_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(BenchError::Config(format!(
                "endpoint_url '{}' has no host",
                trimmed
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(BenchError::Config(format!(
                "endpoint_url '{}' must be a base URL without query or fragment",
                trimmed
            )));
        }

        if self.max_tokens == 0 {
            return Err(BenchError::Config("max_tokens must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(BenchError::Config("timeout must be at least 1 second".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(BenchError::Config(
                "connect timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(())
    }

    /// Full URL of the chat-completions endpoint
    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.endpoint_url.trim().trim_end_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
