//! Combined request: an ordered group of batches sent as one HTTP call.

use super::collector::{Batch, BatchFull, DEFAULT_BATCH_CAPACITY};
use crate::Result;
use serde::Serialize;

/// Default number of sub-requests per combined call.
pub const DEFAULT_MAX_BATCHES: usize = 20;

/// Returned when every batch is full and no new batch may be opened.
/// The identifier was not placed and is handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFull(pub String);

impl std::fmt::Display for RequestFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "combined request full, cannot place {}", self.0)
    }
}

impl std::error::Error for RequestFull {}

/// One sub-request descriptor of the combined call body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubRequest {
    pub method: &'static str,
    pub relative_url: String,
}

#[derive(Debug, Clone)]
pub struct CombinedRequest {
    edge: String,
    batches: Vec<Batch>,
    max_batches: usize,
    batch_capacity: usize,
}

impl CombinedRequest {
    /// Both limits are clamped to at least one so a fresh batch always
    /// accepts an identifier.
    pub fn new(edge: impl Into<String>, max_batches: usize, batch_capacity: usize) -> Self {
        let batch_capacity = batch_capacity.max(1);
        Self {
            edge: edge.into(),
            batches: vec![Batch::new(batch_capacity)],
            max_batches: max_batches.max(1),
            batch_capacity,
        }
    }

    pub fn with_defaults(edge: impl Into<String>) -> Self {
        Self::new(edge, DEFAULT_MAX_BATCHES, DEFAULT_BATCH_CAPACITY)
    }

    /// Place an identifier: current batch first, then a new batch, otherwise
    /// report [`RequestFull`] so the caller flushes.
    pub fn append(&mut self, mut id: String) -> std::result::Result<(), RequestFull> {
        if let Some(last) = self.batches.last_mut() {
            match last.append(id) {
                Ok(()) => return Ok(()),
                Err(BatchFull(rejected)) => id = rejected,
            }
        }

        if self.batches.len() >= self.max_batches {
            return Err(RequestFull(id));
        }

        let mut batch = Batch::new(self.batch_capacity);
        batch
            .append(id)
            .map_err(|BatchFull(id)| RequestFull(id))?;
        self.batches.push(batch);
        Ok(())
    }

    pub fn any(&self) -> bool {
        self.batches.iter().any(Batch::any)
    }

    pub fn edge(&self) -> &str {
        &self.edge
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn max_batches(&self) -> usize {
        self.max_batches
    }

    /// Total number of identifiers placed.
    pub fn len(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.batches
            .iter()
            .flat_map(|b| b.identifiers().iter().map(String::as_str))
    }

    /// Sub-request descriptors, one per non-empty batch, in batch order.
    pub fn sub_requests(&self) -> Vec<SubRequest> {
        self.batches
            .iter()
            .filter(|b| b.any())
            .map(|b| SubRequest {
                method: "GET",
                relative_url: format!("{}?ids={}", self.edge, b.identifiers().join(",")),
            })
            .collect()
    }

    /// Wire body of the combined call.
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.sub_requests())?)
    }
}
