use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for configuration and credential failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "edges./posts.max_batches")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "credential")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the fetch pipeline.
///
/// Anything that reaches the caller is fatal for the stream: transient faults
/// only show up here once the client's retries are exhausted.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Server error: HTTP {status}")]
    ServerError { status: u16, body: String },

    #[error("Unexpected redirect: HTTP {status}{}", format_location(.location))]
    UnexpectedRedirect {
        status: u16,
        location: Option<String>,
    },

    #[error("Bad batch response ({message}): {body:?}")]
    Parse { message: String, body: String },

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_location(location: &Option<String>) -> String {
    match location {
        Some(l) => format!(" to {}", l),
        None => String::new(),
    }
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn credential(msg: impl Into<String>) -> Self {
        Error::Credential {
            message: msg.into(),
        }
    }

    pub(crate) fn parse(msg: impl Into<String>, body: impl Into<String>) -> Self {
        Error::Parse {
            message: msg.into(),
            body: body.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether the client would retry this error on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ServerError { .. } => true,
            Error::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// True for request timeouts, which the client counts separately.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display_includes_context() {
        let err = Error::configuration_with_context(
            "max_batches must be at least 1",
            ErrorContext::new()
                .with_field_path("edges./posts.max_batches")
                .with_source("config_loader"),
        );
        let msg = err.to_string();
        assert!(msg.contains("max_batches must be at least 1"));
        assert!(msg.contains("field: edges./posts.max_batches"));
        assert!(msg.contains("source: config_loader"));
        assert!(err.context().is_some());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::ServerError {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(Error::Transport(TransportError::Timeout("slow".into())).is_retryable());
        assert!(Error::Transport(TransportError::Timeout("slow".into())).is_timeout());
        assert!(!Error::UnexpectedRedirect {
            status: 302,
            location: None
        }
        .is_retryable());
        assert!(!Error::parse("bad", "{").is_retryable());
    }

    #[test]
    fn test_redirect_display() {
        let err = Error::UnexpectedRedirect {
            status: 301,
            location: Some("https://elsewhere.example".into()),
        };
        assert_eq!(
            err.to_string(),
            "Unexpected redirect: HTTP 301 to https://elsewhere.example"
        );
    }
}
