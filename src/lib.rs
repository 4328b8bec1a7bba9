//! # graph-batch-fetch
//!
//! Streaming batch client for APIs that accept combined ("batch") calls.
//!
//! Given an arbitrarily large, possibly unbounded source of node identifiers,
//! the crate packs them into sub-requests of bounded size, bundles those into
//! combined HTTP calls, and yields the decoded `(identifier, value)` pairs as
//! each call completes. The source is pulled lazily, so it is never held in
//! memory as a whole.
//!
//! ## Pipeline
//!
//! ```text
//! source --pull--> LazySource --pack--> CombinedRequest --overflow--> BatchClient::send
//!                                                                        |
//!            caller <--yield-- FetchStream <--decode-- CombinedResponse <-+
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graph_batch_fetch::{Credential, FetchConfig, Fetcher, StreamOptions};
//!
//! fn main() -> graph_batch_fetch::Result<()> {
//!     let fetcher = Fetcher::new(
//!         FetchConfig::default().with_env_overrides()?,
//!         Credential::from_env("GRAPH_ACCESS_TOKEN"),
//!     )?;
//!
//!     let ids = ["4", "5", "6"];
//!     for item in fetcher.stream(ids, StreamOptions::new("/"))? {
//!         let (id, node) = item?;
//!         println!("{id}: {node}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Partial failures
//!
//! A sub-response that reports an error is dropped: its identifiers are not
//! retried and not reported. The remote uses this for unknown or inaccessible
//! nodes, so a stream may legitimately return fewer results than it was given.
//! Transport failures are retried by [`BatchClient`]; anything that still
//! fails ends the stream with an [`Error`].
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`source`] | Lazy, counted identifier source |
//! | [`batch`] | Batches, combined requests and response decoding |
//! | [`transport`] | Blocking HTTP transport and credentials |
//! | [`client`] | Retrying client with counters |
//! | [`stream`] | The orchestrating iterator and [`Fetcher`] facade |
//! | [`config`] | Per-edge capacity/timeout configuration |

pub mod batch;
pub mod client;
pub mod config;
pub mod source;
pub mod stream;
pub mod transport;

pub use batch::{CombinedRequest, CombinedResponse};
pub use client::{BatchClient, ClientStats, RetryPolicy};
pub use config::{EdgeProfile, FetchConfig, RetrySettings};
pub use source::{IntoIdentifier, LazySource};
pub use stream::{FetchStream, Fetcher, StreamOptions, StreamSummary};
pub use transport::{Credential, HttpTransport, MemoryTransport, Transport};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
