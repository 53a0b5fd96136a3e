//! Error types for the Marketo source
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the Marketo source
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Catalog error: {message}")]
    Catalog { message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Marketo API error {code}: {message}")]
    Api { code: String, message: String },

    // ============================================================================
    // Export Errors
    // ============================================================================
    #[error("Export failed with status '{status}'")]
    ExportFailed { status: String },

    // ============================================================================
    // Data Integrity Errors
    // ============================================================================
    #[error("Export chunk is not valid UTF-8 after trimming 3 trailing bytes: {message}")]
    ChunkDecode { message: String },

    #[error("CSV row has {} fields but the header has {} ({header:?} vs {row:?})", row.len(), header.len())]
    NonRectangularCsvRow {
        header: Vec<String>,
        row: Vec<String>,
    },

    #[error("Could not parse timestamp '{value}'")]
    Timestamp { value: String },

    #[error("Could not format value for field '{field}': {message}")]
    ValueFormat { field: String, message: String },

    // ============================================================================
    // Sync Errors
    // ============================================================================
    #[error("Stream '{stream}' has no sync strategy")]
    UnsupportedStream { stream: String },

    #[error("State error: {message}")]
    State { message: String },

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create a catalog error
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a Marketo API error
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an export failure carrying the job's terminal status
    pub fn export_failed(status: impl Into<String>) -> Self {
        Self::ExportFailed {
            status: status.into(),
        }
    }

    /// Create a chunk decode error
    pub fn chunk_decode(message: impl Into<String>) -> Self {
        Self::ChunkDecode {
            message: message.into(),
        }
    }

    /// Create a timestamp parse error
    pub fn timestamp(value: impl Into<String>) -> Self {
        Self::Timestamp {
            value: value.into(),
        }
    }

    /// Create a value format error
    pub fn value_format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValueFormat {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported stream error
    pub fn unsupported_stream(stream: impl Into<String>) -> Self {
        Self::UnsupportedStream {
            stream: stream.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Check if this error is retryable at the HTTP layer
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if this error is a terminal export failure
    ///
    /// Export failures are handled leniently by the orchestrator (logged,
    /// export pointers cleared, loop continues with a fresh export); all
    /// other errors abort the stream's sync.
    pub fn is_export_failure(&self) -> bool {
        matches!(self, Error::ExportFailed { .. })
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the Marketo source
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("client_id");
        assert_eq!(err.to_string(), "Missing required config field: client_id");

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::export_failed("Cancelled");
        assert_eq!(err.to_string(), "Export failed with status 'Cancelled'");
    }

    #[test]
    fn test_non_rectangular_display_carries_both_sides() {
        let err = Error::NonRectangularCsvRow {
            header: vec!["id".to_string(), "email".to_string()],
            row: vec!["1".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("1 fields"));
        assert!(text.contains("header has 2"));
        assert!(text.contains("email"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::RateLimited {
            retry_after_seconds: 60
        }
        .is_retryable());
        assert!(Error::http_status(429, "").is_retryable());
        assert!(Error::http_status(500, "").is_retryable());
        assert!(Error::http_status(503, "").is_retryable());

        assert!(!Error::http_status(400, "").is_retryable());
        assert!(!Error::http_status(401, "").is_retryable());
        assert!(!Error::config("test").is_retryable());
        assert!(!Error::export_failed("Failed").is_retryable());
    }

    #[test]
    fn test_is_export_failure() {
        assert!(Error::export_failed("Failed").is_export_failure());
        assert!(!Error::timestamp("garbage").is_export_failure());
        assert!(!Error::state("oops").is_export_failure());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
