//! Error types for the trade window SDK

use thiserror::Error;
use std::fmt;

/// Main error type for the SDK
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdkError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Connection-level failures of the feed transport
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to establish connection: {0}")]
    EstablishmentFailed(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Failures turning a raw feed payload into trade records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Malformed trade: {0}")]
    MalformedTrade(String),
}

impl NormalizationError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        NormalizationError::MalformedTrade(reason.into())
    }
}

/// Error context for debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub operation: String,
    pub details: Vec<(String, String)>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            operation: operation.to_string(),
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.details.push((key.to_string(), value.to_string()));
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] Operation: {}", self.timestamp, self.operation)?;

        for (key, value) in &self.details {
            write!(f, " {}={}", key, value)?;
        }

        Ok(())
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,      // A single skipped entry or payload
    Medium,   // Recoverable connection trouble
    High,     // The feed is down until the owner reconnects
}

impl ErrorSeverity {
    pub fn from_error(error: &SdkError) -> Self {
        match error {
            SdkError::Normalization(_) => ErrorSeverity::Low,
            SdkError::Transport(TransportError::Timeout(_))
            | SdkError::Transport(TransportError::Stream(_)) => ErrorSeverity::Medium,
            SdkError::Transport(_) => ErrorSeverity::High,
            SdkError::Configuration(_) | SdkError::Runtime(_) => ErrorSeverity::High,
        }
    }
}

/// Routes errors to the diagnostics log at a level matching their severity.
///
/// Nothing reported here is surfaced to snapshot consumers.
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn report_error(error: &SdkError, context: Option<&ErrorContext>) {
        let context = context.map(|c| c.to_string()).unwrap_or_default();

        match ErrorSeverity::from_error(error) {
            ErrorSeverity::High => {
                tracing::error!(%context, "{}", error);
            }
            ErrorSeverity::Medium => {
                tracing::warn!(%context, "{}", error);
            }
            ErrorSeverity::Low => {
                tracing::warn!(%context, "skipped: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let malformed = SdkError::from(NormalizationError::malformed("missing price"));
        assert_eq!(ErrorSeverity::from_error(&malformed), ErrorSeverity::Low);

        let timeout = SdkError::from(TransportError::Timeout("connect".into()));
        assert_eq!(ErrorSeverity::from_error(&timeout), ErrorSeverity::Medium);

        let lost = SdkError::from(TransportError::ConnectionLost("reset".into()));
        assert_eq!(ErrorSeverity::from_error(&lost), ErrorSeverity::High);
    }

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new("ingest").with_detail("entry", 2);
        let rendered = ctx.to_string();
        assert!(rendered.contains("Operation: ingest"));
        assert!(rendered.contains("entry=2"));
    }

    #[test]
    fn test_error_messages() {
        let err = SdkError::from(NormalizationError::malformed("unknown side: hold"));
        assert_eq!(err.to_string(), "Normalization error: Malformed trade: unknown side: hold");
    }
}
