//! Streaming orchestrator.
//!
//! [`FetchStream`] pulls identifiers from its source one at a time, packs them
//! into a [`CombinedRequest`], and flushes (send, decode, queue results)
//! whenever the request overflows. Whatever is left when the source runs dry
//! is flushed once more. Results come out in flush order, then in the order
//! the remote listed them.
//!
//! Identifiers whose sub-response reported an error are silently missing from
//! the output; see [`CombinedResponse`]. Any error that does reach the
//! iterator (retries exhausted, redirect, malformed body, source failure) is
//! yielded once and ends the stream.

use crate::batch::{CombinedRequest, CombinedResponse, RequestFull, DEFAULT_BATCH_CAPACITY};
use crate::client::{BatchClient, ClientStats};
use crate::config::{EdgeProfile, FetchConfig, DEFAULT_BATCH_PATH};
use crate::source::{IntoIdentifier, LazySource};
use crate::transport::Credential;
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Form field carrying the serialized combined request.
pub const BATCH_FIELD: &str = "batch";

/// Per-stream settings; anything left unset comes from [`FetchConfig`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub edge: String,
    pub batch_capacity: Option<usize>,
    pub max_batches: Option<usize>,
    pub client: Option<Arc<BatchClient>>,
}

impl StreamOptions {
    pub fn new(edge: impl Into<String>) -> Self {
        Self {
            edge: edge.into(),
            batch_capacity: None,
            max_batches: None,
            client: None,
        }
    }

    pub fn with_batch_capacity(mut self, n: usize) -> Self {
        self.batch_capacity = Some(n);
        self
    }

    pub fn with_max_batches(mut self, n: usize) -> Self {
        self.max_batches = Some(n);
        self
    }

    /// Use this client instead of building one for the edge.
    pub fn with_client(mut self, client: Arc<BatchClient>) -> Self {
        self.client = Some(client);
        self
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::new("/")
    }
}

/// Progress counters of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Elements pulled from the source, blanks included.
    pub produced: u64,
    /// Identifiers placed into a combined request.
    pub placed: u64,
    pub flushes: u64,
    pub results: u64,
    /// Sub-responses dropped because the remote reported an error.
    pub dropped_sub_responses: u64,
    pub client: ClientStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pulling,
    Done,
}

pub struct FetchStream<I> {
    source: LazySource<I>,
    client: Arc<BatchClient>,
    edge: String,
    batch_path: String,
    max_batches: usize,
    batch_capacity: usize,
    current: CombinedRequest,
    pending: VecDeque<(String, Value)>,
    state: State,
    placed: u64,
    flushes: u64,
    results: u64,
    dropped: u64,
}

impl<I> FetchStream<I>
where
    I: Iterator,
    I::Item: IntoIdentifier,
{
    /// Stream `source` against `edge`. Sub-requests per call follow the
    /// edge's built-in profile (5 for `/posts`, 20 otherwise).
    pub fn new(
        source: impl IntoIterator<IntoIter = I>,
        edge: impl Into<String>,
        client: Arc<BatchClient>,
    ) -> Self {
        let edge = edge.into();
        let max_batches = EdgeProfile::designated(&edge).max_batches;
        Self {
            source: LazySource::new(source),
            client,
            current: CombinedRequest::new(edge.clone(), max_batches, DEFAULT_BATCH_CAPACITY),
            edge,
            batch_path: DEFAULT_BATCH_PATH.to_string(),
            max_batches,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            pending: VecDeque::new(),
            state: State::Pulling,
            placed: 0,
            flushes: 0,
            results: 0,
            dropped: 0,
        }
    }

    pub fn with_max_batches(mut self, n: usize) -> Self {
        self.max_batches = n;
        self.reset_if_untouched();
        self
    }

    pub fn with_batch_capacity(mut self, n: usize) -> Self {
        self.batch_capacity = n;
        self.reset_if_untouched();
        self
    }

    pub fn with_batch_path(mut self, path: impl Into<String>) -> Self {
        self.batch_path = path.into();
        self
    }

    /// Drive the whole pipeline, handing every decoded pair to `callback`.
    pub fn run<F>(mut self, mut callback: F) -> Result<StreamSummary>
    where
        F: FnMut(String, Value),
    {
        while let Some(item) = self.next() {
            let (id, value) = item?;
            callback(id, value);
        }
        Ok(self.summary())
    }

    pub fn produced(&self) -> u64 {
        self.source.produced()
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn edge(&self) -> &str {
        &self.edge
    }

    pub fn client(&self) -> &Arc<BatchClient> {
        &self.client
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            produced: self.source.produced(),
            placed: self.placed,
            flushes: self.flushes,
            results: self.results,
            dropped_sub_responses: self.dropped,
            client: self.client.stats(),
        }
    }

    fn fresh_request(&self) -> CombinedRequest {
        CombinedRequest::new(self.edge.clone(), self.max_batches, self.batch_capacity)
    }

    fn reset_if_untouched(&mut self) {
        if !self.current.any() {
            self.current = self.fresh_request();
        }
    }

    /// Pull until one flush happened or the source is exhausted.
    fn advance(&mut self) -> Result<()> {
        while let Some(item) = self.source.next() {
            let Some(id) = item.into_identifier()? else {
                continue;
            };
            match self.current.append(id) {
                Ok(()) => self.placed += 1,
                Err(RequestFull(id)) => {
                    let fresh = self.fresh_request();
                    let full = std::mem::replace(&mut self.current, fresh);
                    self.flush(full)?;

                    if let Err(RequestFull(id)) = self.current.append(id) {
                        error!(
                            edge = %self.edge,
                            id = %id,
                            "empty combined request rejected an identifier"
                        );
                        return Err(Error::configuration_with_context(
                            format!("identifier {} does not fit an empty combined request", id),
                            ErrorContext::new()
                                .with_field_path("max_batches")
                                .with_details(format!(
                                    "max_batches={} batch_capacity={}",
                                    self.max_batches, self.batch_capacity
                                )),
                        ));
                    }
                    self.placed += 1;
                    return Ok(());
                }
            }
        }

        self.state = State::Done;
        if self.current.any() {
            let fresh = self.fresh_request();
            let last = std::mem::replace(&mut self.current, fresh);
            self.flush(last)?;
        }
        Ok(())
    }

    fn flush(&mut self, request: CombinedRequest) -> Result<()> {
        let body = request.serialize()?;
        debug!(
            edge = request.edge(),
            batches = request.batches().len(),
            ids = request.len(),
            "flushing combined request"
        );

        let response = self
            .client
            .send(&self.batch_path, &[(BATCH_FIELD.to_string(), body)])?;
        let mut decoded = CombinedResponse::new(&request, response.body);
        decoded.parse()?;

        self.flushes += 1;
        self.dropped += decoded.dropped() as u64;
        info!(
            edge = request.edge(),
            flush = self.flushes,
            ids = request.len(),
            results = decoded.nodes().len(),
            dropped = decoded.dropped(),
            produced = self.source.produced(),
            "flush complete"
        );
        self.pending.extend(decoded.into_nodes());
        Ok(())
    }
}

impl<I> Iterator for FetchStream<I>
where
    I: Iterator,
    I::Item: IntoIdentifier,
{
    type Item = Result<(String, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pair) = self.pending.pop_front() {
                self.results += 1;
                return Some(Ok(pair));
            }
            if self.state == State::Done {
                return None;
            }
            if let Err(e) = self.advance() {
                self.state = State::Done;
                self.pending.clear();
                return Some(Err(e));
            }
        }
    }
}

impl<I> FusedIterator for FetchStream<I>
where
    I: Iterator,
    I::Item: IntoIdentifier,
{
}

impl<I> std::fmt::Debug for FetchStream<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchStream")
            .field("edge", &self.edge)
            .field("produced", &self.source.produced())
            .field("placed", &self.placed)
            .field("flushes", &self.flushes)
            .field("dropped", &self.dropped)
            .field("client", &self.client)
            .finish()
    }
}

/// Entry point that builds per-edge clients and streams from a [`FetchConfig`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    config: FetchConfig,
    credential: Credential,
}

impl Fetcher {
    pub fn new(config: FetchConfig, credential: impl Into<Credential>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            credential: credential.into(),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// HTTP client with the edge's timeout and the configured retry policy.
    pub fn client_for(&self, edge: &str) -> Result<BatchClient> {
        let profile = self.config.profile_for(edge);
        BatchClient::http(&self.config, profile.timeout(), self.credential.clone())
    }

    pub fn stream<S>(&self, ids: S, options: StreamOptions) -> Result<FetchStream<S::IntoIter>>
    where
        S: IntoIterator,
        S::Item: IntoIdentifier,
    {
        let profile = self.config.profile_for(&options.edge);
        let client = match options.client {
            Some(client) => client,
            None => Arc::new(self.client_for(&options.edge)?),
        };
        Ok(FetchStream::new(ids, options.edge, client)
            .with_batch_path(self.config.batch_path.clone())
            .with_batch_capacity(options.batch_capacity.unwrap_or(self.config.batch_capacity))
            .with_max_batches(options.max_batches.unwrap_or(profile.max_batches)))
    }
}
