// Error handling module
// Defines the error types surfaced by the benchmark engine

use thiserror::Error;

/// Errors that prevent a benchmark run from starting or its artifacts from being produced.
///
/// Per-test failures are never represented here: they are recorded as
/// `TestResult`s and the run carries on.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Missing or invalid run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedded test catalog failed validation
    #[error("Test catalog is corrupt: {0}")]
    CatalogCorrupt(String),

    /// A run is already in progress on this runner
    #[error("A benchmark run is already in progress")]
    AlreadyRunning,

    /// Filesystem error while writing or reading artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Ways a chat-completion response can violate the expected wire shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Endpoint answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body is not JSON at all
    #[error("Response body is not valid JSON: {0}")]
    NotJson(String),

    /// Response is JSON but a field has the wrong type
    #[error("Unexpected response shape: {0}")]
    Schema(String),

    /// A required field is absent or null
    #[error("Response is missing field `{0}`")]
    MissingField(&'static str),
}

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BenchError::Config("endpoint_url is required".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: endpoint_url is required"
        );

        let err = BenchError::CatalogCorrupt("expected 43 tests, found 42".to_string());
        assert_eq!(
            err.to_string(),
            "Test catalog is corrupt: expected 43 tests, found 42"
        );

        let err = BenchError::AlreadyRunning;
        assert_eq!(err.to_string(), "A benchmark run is already in progress");
    }

    #[test]
    fn test_internal_error_message() {
        let err = BenchError::Internal(anyhow::anyhow!("Something went wrong"));
        assert_eq!(err.to_string(), "Internal error: Something went wrong");
    }

    #[test]
    fn test_protocol_error_messages() {
        let err = ProtocolError::Status {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: overloaded");

        let err = ProtocolError::MissingField("choices[0].message.content");
        assert_eq!(
            err.to_string(),
            "Response is missing field `choices[0].message.content`"
        );

        let err = ProtocolError::NotJson("expected value at line 1 column 1".to_string());
        assert!(err.to_string().starts_with("Response body is not valid JSON"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BenchError = io.into();
        assert!(matches!(err, BenchError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
