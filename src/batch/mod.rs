//! Two-level request batching.
//!
//! The remote API caps both the number of identifiers per sub-request and the
//! number of sub-requests per combined call. Exceeding either is a protocol
//! error, so both limits are enforced here, in this order: fill the current
//! batch, open a new batch, and finally ask the caller to flush.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Batch`] | Up to `capacity` identifiers, one sub-request |
//! | [`CombinedRequest`] | Up to `max_batches` batches, one HTTP call |
//! | [`CombinedResponse`] | Decodes a combined call body into `(id, value)` pairs |
//!
//! ## Example
//!
//! ```rust
//! use graph_batch_fetch::batch::{CombinedRequest, RequestFull};
//!
//! let mut request = CombinedRequest::new("/posts", 5, 20);
//! for id in 0..100 {
//!     request.append(id.to_string()).unwrap();
//! }
//! assert_eq!(request.batches().len(), 5);
//! assert_eq!(request.append("100".into()), Err(RequestFull("100".into())));
//! ```

mod collector;
mod request;
mod response;

pub use collector::{Batch, BatchFull, DEFAULT_BATCH_CAPACITY};
pub use request::{CombinedRequest, RequestFull, SubRequest, DEFAULT_MAX_BATCHES};
pub use response::{CombinedResponse, SubResponse, SubResponseHeader};
