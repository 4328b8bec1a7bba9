//! Transport layer: one blocking form POST per call.
//!
//! The [`Transport`] trait is the seam between the retrying
//! [`BatchClient`](crate::client::BatchClient) and the network. It performs a
//! single attempt and reports what happened; classification and retries live
//! in the client.

mod credential;
mod http;
mod memory;

pub use credential::Credential;
pub use http::HttpTransport;
pub use memory::{MemoryTransport, RecordedRequest};

/// Raw outcome of one HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// `Location` header, kept for redirect diagnostics.
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            location: None,
            body: body.into(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Blocking POST of form fields to a path on a fixed host.
pub trait Transport: Send + Sync {
    fn post_form(
        &self,
        path: &str,
        fields: &[(String, String)],
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// Low-level connection faults that are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFault {
    Reset,
    BrokenPipe,
    InvalidArgument,
    UnexpectedEof,
    /// Could not connect, including host name resolution failures.
    Connect,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection fault ({kind:?}): {message}")]
    Connection {
        kind: ConnectionFault,
        message: String,
    },

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn connection(kind: ConnectionFault, message: impl Into<String>) -> Self {
        TransportError::Connection {
            kind,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::Connection { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}
