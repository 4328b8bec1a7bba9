use super::{ConnectionFault, HttpResponse, Transport, TransportError};
use crate::config::FetchConfig;
use crate::Result;
use reqwest::blocking::Client;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::Proxy;
use std::env;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use url::Url;

/// Blocking HTTPS transport bound to one host.
///
/// Connections are pooled and reused across combined calls. Redirects are
/// never followed: the client treats them as a protocol fault.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig, timeout: Duration) -> Result<Self> {
        let base_url = config.base_url()?;

        let mut builder = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("GRAPH_FETCH_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Transport for HttpTransport {
    fn post_form(
        &self,
        path: &str,
        fields: &[(String, String)],
    ) -> std::result::Result<HttpResponse, TransportError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| TransportError::Other(format!("invalid path {}: {}", path, e)))?;

        let resp = self.client.post(url).form(fields).send()?;

        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text()?;

        Ok(HttpResponse {
            status,
            location,
            body,
        })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return TransportError::Timeout(e.to_string());
        }
        // Peer closed the connection before a response arrived.
        if closed_before_response(&e) {
            return TransportError::connection(ConnectionFault::UnexpectedEof, e.to_string());
        }
        if let Some(kind) = io_error_kind(&e) {
            let fault = match kind {
                io::ErrorKind::TimedOut => return TransportError::Timeout(e.to_string()),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                    Some(ConnectionFault::Reset)
                }
                io::ErrorKind::BrokenPipe => Some(ConnectionFault::BrokenPipe),
                io::ErrorKind::InvalidInput => Some(ConnectionFault::InvalidArgument),
                io::ErrorKind::UnexpectedEof => Some(ConnectionFault::UnexpectedEof),
                io::ErrorKind::ConnectionRefused => None,
                _ if e.is_connect() => Some(ConnectionFault::Connect),
                _ => None,
            };
            return match fault {
                Some(kind) => TransportError::connection(kind, e.to_string()),
                None => TransportError::Other(e.to_string()),
            };
        }
        if e.is_connect() {
            return TransportError::connection(ConnectionFault::Connect, e.to_string());
        }
        TransportError::Other(e.to_string())
    }
}

fn closed_before_response(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            return hyper_err.is_incomplete_message();
        }
        source = err.source();
    }
    false
}

fn io_error_kind(e: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = err.source();
    }
    None
}
