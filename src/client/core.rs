use crate::config::FetchConfig;
use crate::transport::{Credential, HttpResponse, HttpTransport, Transport};
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error_classification::classify;
use super::policy::{Decision, RetryPolicy};

/// Form field carrying the resolved credential.
pub const ACCESS_TOKEN_FIELD: &str = "access_token";

/// Blocking sleep used between retries. Injectable so backoff is observable.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Point-in-time copy of the client's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub attempted: u64,
    /// Attempts that got an HTTP response back, whatever its status.
    pub completed: u64,
    pub timed_out: u64,
    pub server_errors: u64,
}

/// Retrying client for combined calls.
///
/// Each [`send`](BatchClient::send) resolves the credential once, then makes
/// up to `1 + max_retries` attempts. Server errors, timeouts and connection
/// faults are retried after a blocking delay; redirects and everything else
/// fail on first occurrence. Counters are cumulative for the client's
/// lifetime.
pub struct BatchClient {
    transport: Box<dyn Transport>,
    credential: Credential,
    policy: RetryPolicy,
    timeout: Option<Duration>,
    sleeper: Sleeper,
    attempted: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    server_errors: AtomicU64,
}

impl BatchClient {
    pub fn new(transport: impl Transport + 'static, credential: impl Into<Credential>) -> Self {
        Self {
            transport: Box::new(transport),
            credential: credential.into(),
            policy: RetryPolicy::default(),
            timeout: None,
            sleeper: Arc::new(std::thread::sleep),
            attempted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
        }
    }

    /// HTTP client for the configured host with the given per-call timeout.
    pub fn http(config: &FetchConfig, timeout: Duration, credential: Credential) -> Result<Self> {
        let transport = HttpTransport::new(config, timeout)?;
        Ok(Self::new(transport, credential)
            .with_retry_policy(config.retry.into())
            .with_timeout(timeout))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Record the transport timeout for diagnostics.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
        }
    }

    /// POST `fields` plus the access token to `path`, retrying transient failures.
    pub fn send(&self, path: &str, fields: &[(String, String)]) -> Result<HttpResponse> {
        let token = self.credential.resolve()?;
        let mut form: Vec<(String, String)> = fields
            .iter()
            .filter(|(k, _)| k != ACCESS_TOKEN_FIELD)
            .cloned()
            .collect();
        form.push((ACCESS_TOKEN_FIELD.to_string(), token));

        let request_id = Uuid::new_v4().to_string();
        let mut retry: u32 = 0;

        loop {
            self.attempted.fetch_add(1, Ordering::Relaxed);
            let start = Instant::now();
            let outcome = self.transport.post_form(path, &form);
            if outcome.is_ok() {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }

            let err = match classify(outcome) {
                Ok(response) => {
                    debug!(
                        request_id = request_id.as_str(),
                        path,
                        http_status = response.status,
                        retry,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "combined call completed"
                    );
                    return Ok(response);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!(
                    request_id = request_id.as_str(),
                    path,
                    error = %err,
                    "combined call failed"
                );
                return Err(err);
            }

            retry += 1;
            self.count_retryable(&err);

            match self.policy.decide(&err, retry) {
                Decision::Retry { delay } => {
                    warn!(
                        request_id = request_id.as_str(),
                        path,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying combined call"
                    );
                    (self.sleeper)(delay);
                }
                Decision::Fail => {
                    warn!(
                        request_id = request_id.as_str(),
                        path,
                        retries = retry - 1,
                        error = %err,
                        "giving up on combined call"
                    );
                    return Err(err);
                }
            }
        }
    }

    fn count_retryable(&self, err: &Error) {
        if err.is_timeout() {
            self.timed_out.fetch_add(1, Ordering::Relaxed);
        } else if matches!(err, Error::ServerError { .. }) {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for BatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchClient")
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ConnectionFault, MemoryTransport, TransportError};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn recording_sleeper() -> (Sleeper, Arc<Mutex<Vec<Duration>>>) {
        let slept = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&slept);
        let sleeper: Sleeper = Arc::new(move |d: Duration| sink.lock().unwrap().push(d));
        (sleeper, slept)
    }

    fn ok() -> std::result::Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(200, "[]"))
    }

    fn server_error() -> std::result::Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(500, "internal"))
    }

    fn fields() -> Vec<(String, String)> {
        vec![("batch".to_string(), "[]".to_string())]
    }

    #[test]
    fn test_three_server_errors_then_success() {
        let transport =
            MemoryTransport::scripted(vec![server_error(), server_error(), server_error(), ok()]);
        let (sleeper, slept) = recording_sleeper();
        let client = BatchClient::new(transport.clone(), "tok").with_sleeper(sleeper);

        let resp = client.send("/batch", &fields()).unwrap();
        assert_eq!(resp.status, 200);

        let delays: Vec<u64> = slept.lock().unwrap().iter().map(|d| d.as_secs()).collect();
        assert_eq!(delays, vec![0, 2, 4]);
        assert_eq!(
            client.stats(),
            ClientStats {
                attempted: 4,
                completed: 4,
                timed_out: 0,
                server_errors: 3,
            }
        );
        assert_eq!(transport.request_count(), 4);
    }

    #[test]
    fn test_exhausted_retries_return_last_error() {
        let transport = MemoryTransport::scripted(vec![
            server_error(),
            server_error(),
            server_error(),
            server_error(),
            Err(TransportError::Timeout("operation timed out".into())),
            ok(),
        ]);
        let (sleeper, slept) = recording_sleeper();
        let client = BatchClient::new(transport.clone(), "tok").with_sleeper(sleeper);

        let err = client.send("/batch", &fields()).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(slept.lock().unwrap().len(), 4);
        assert_eq!(transport.request_count(), 5);

        let stats = client.stats();
        assert_eq!(stats.attempted, 5);
        assert_eq!(stats.completed, 4);
        assert_eq!(stats.server_errors, 4);
        assert_eq!(stats.timed_out, 1);
    }

    #[test]
    fn test_redirect_not_retried() {
        let transport = MemoryTransport::scripted(vec![
            Ok(HttpResponse::new(301, "").with_location("https://other.example/batch")),
            ok(),
        ]);
        let (sleeper, slept) = recording_sleeper();
        let client = BatchClient::new(transport.clone(), "tok").with_sleeper(sleeper);

        let err = client.send("/batch", &fields()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedRedirect { status: 301, .. }));
        assert!(slept.lock().unwrap().is_empty());
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_non_retryable_transport_error_propagates() {
        let transport =
            MemoryTransport::scripted(vec![Err(TransportError::Other("tls handshake".into())), ok()]);
        let client = BatchClient::new(transport.clone(), "tok");
        assert!(matches!(
            client.send("/batch", &fields()),
            Err(Error::Transport(TransportError::Other(_)))
        ));
        assert_eq!(client.stats().attempted, 1);
        assert_eq!(client.stats().completed, 0);
    }

    #[test]
    fn test_connection_faults_are_retried() {
        let transport = MemoryTransport::scripted(vec![
            Err(TransportError::connection(ConnectionFault::Reset, "reset")),
            Err(TransportError::connection(ConnectionFault::UnexpectedEof, "eof")),
            ok(),
        ]);
        let (sleeper, _) = recording_sleeper();
        let client = BatchClient::new(transport, "tok").with_sleeper(sleeper);
        client.send("/batch", &fields()).unwrap();
        let stats = client.stats();
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.server_errors, 0);
        assert_eq!(stats.timed_out, 0);
    }

    #[test]
    fn test_token_merged_into_form() {
        let transport = MemoryTransport::scripted(vec![ok()]);
        let client = BatchClient::new(transport.clone(), "secret");
        let mut input = fields();
        input.push((ACCESS_TOKEN_FIELD.to_string(), "stale".to_string()));
        client.send("/batch", &input).unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.field("batch"), Some("[]"));
        assert_eq!(sent.field(ACCESS_TOKEN_FIELD), Some("secret"));
        assert_eq!(sent.fields.len(), 2);
    }

    #[test]
    fn test_credential_resolved_per_send() {
        let transport = MemoryTransport::from_fn(|_| Ok(HttpResponse::new(200, "[]")));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let credential = Credential::provider(move || {
            Ok(format!("token-{}", counter.fetch_add(1, Ordering::SeqCst)))
        });
        let client = BatchClient::new(transport.clone(), credential);
        client.send("/batch", &fields()).unwrap();
        client.send("/batch", &fields()).unwrap();

        let tokens: Vec<String> = transport
            .requests()
            .iter()
            .filter_map(|r| r.field(ACCESS_TOKEN_FIELD).map(str::to_string))
            .collect();
        assert_eq!(tokens, vec!["token-0", "token-1"]);
    }

    #[test]
    fn test_credential_failure_makes_no_attempt() {
        let transport = MemoryTransport::scripted(vec![ok()]);
        let client = BatchClient::new(
            transport.clone(),
            Credential::provider(|| Err(Error::credential("rotated away"))),
        );
        assert!(matches!(
            client.send("/batch", &fields()),
            Err(Error::Credential { .. })
        ));
        assert_eq!(transport.request_count(), 0);
        assert_eq!(client.stats().attempted, 0);
    }

    #[test]
    fn test_counters_are_cumulative() {
        let transport = MemoryTransport::scripted(vec![server_error(), ok(), ok()]);
        let (sleeper, _) = recording_sleeper();
        let client = BatchClient::new(transport, "tok").with_sleeper(sleeper);
        client.send("/batch", &fields()).unwrap();
        client.send("/batch", &fields()).unwrap();
        assert_eq!(client.stats().attempted, 3);
        assert_eq!(client.stats().server_errors, 1);
    }
}
