//! In-memory transport for tests and offline runs.

use super::{HttpResponse, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Responder =
    dyn Fn(&RecordedRequest) -> std::result::Result<HttpResponse, TransportError> + Send + Sync;

/// A request as seen by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub path: String,
    pub fields: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

enum Mode {
    Scripted(VecDeque<std::result::Result<HttpResponse, TransportError>>),
    Responder(Box<Responder>),
}

/// Transport that answers from a script or a closure and records every call.
///
/// Cloning shares the recorded requests, so a clone kept by the test can
/// inspect what the client sent.
#[derive(Clone)]
pub struct MemoryTransport {
    mode: Arc<Mutex<Mode>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MemoryTransport {
    /// Answer calls in order; once the script runs out every call fails.
    pub fn scripted(
        outcomes: impl IntoIterator<Item = std::result::Result<HttpResponse, TransportError>>,
    ) -> Self {
        Self::with_mode(Mode::Scripted(outcomes.into_iter().collect()))
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> std::result::Result<HttpResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_mode(Mode::Responder(Box::new(responder)))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Transport for MemoryTransport {
    fn post_form(
        &self,
        path: &str,
        fields: &[(String, String)],
    ) -> std::result::Result<HttpResponse, TransportError> {
        let request = RecordedRequest {
            path: path.to_string(),
            fields: fields.to_vec(),
        };
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut mode = self
            .mode
            .lock()
            .map_err(|_| TransportError::Other("memory transport poisoned".to_string()))?;
        match &mut *mode {
            Mode::Scripted(outcomes) => outcomes
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string()))),
            Mode::Responder(responder) => responder(&request),
        }
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("requests", &self.request_count())
            .finish()
    }
}
