//! Combined response decoding.
//!
//! The body of a combined call is a JSON list with one entry per sub-request:
//!
//! ```text
//! [{"code": 200, "headers": [...], "body": "{\"1\": {...}, \"2\": {...}}"},
//!  {"code": 400, "headers": [...], "body": "{\"error\": {...}}"}]
//! ```
//!
//! Sub-responses whose body carries an `error` key are dropped: their
//! identifiers are neither emitted nor retried. The remote reports unknown or
//! inaccessible nodes this way, so callers get a possibly incomplete result
//! set rather than an error. [`CombinedResponse::dropped`] tells how many
//! sub-responses were discarded.

use super::request::CombinedRequest;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct SubResponseHeader {
    pub name: String,
    pub value: String,
}

/// One entry of the combined response list.
#[derive(Debug, Clone, Deserialize)]
pub struct SubResponse {
    pub code: u16,
    #[serde(default)]
    pub headers: Vec<SubResponseHeader>,
    pub body: String,
}

/// Decoder for the raw body of one combined call.
#[derive(Debug)]
pub struct CombinedResponse<'a> {
    request: &'a CombinedRequest,
    body: String,
    nodes: Vec<(String, Value)>,
    dropped: usize,
}

impl<'a> CombinedResponse<'a> {
    pub fn new(request: &'a CombinedRequest, body: impl Into<String>) -> Self {
        Self {
            request,
            body: body.into(),
            nodes: Vec::new(),
            dropped: 0,
        }
    }

    /// Decode the body into `(identifier, value)` pairs.
    ///
    /// Fails with [`Error::Parse`] carrying the raw body when either the outer
    /// list or a nested sub-response body is malformed.
    pub fn parse(&mut self) -> Result<()> {
        let entries: Vec<Option<SubResponse>> = serde_json::from_str(&self.body)
            .map_err(|e| Error::parse(e.to_string(), self.body.clone()))?;

        for (index, entry) in entries.into_iter().enumerate() {
            let Some(sub) = entry else {
                warn!(
                    edge = self.request.edge(),
                    index, "sub-request was not executed, dropping"
                );
                self.dropped += 1;
                continue;
            };

            let nested: Value = serde_json::from_str(&sub.body)
                .map_err(|e| Error::parse(e.to_string(), self.body.clone()))?;
            let Value::Object(map) = nested else {
                return Err(Error::parse(
                    format!("sub-response {} body is not an object", index),
                    self.body.clone(),
                ));
            };

            if map.contains_key("error") {
                warn!(
                    edge = self.request.edge(),
                    index,
                    code = sub.code,
                    "sub-response reported an error, dropping"
                );
                self.dropped += 1;
                continue;
            }

            self.nodes.extend(map);
        }

        debug!(
            edge = self.request.edge(),
            nodes = self.nodes.len(),
            dropped = self.dropped,
            "decoded combined response"
        );
        Ok(())
    }

    pub fn nodes(&self) -> &[(String, Value)] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<(String, Value)> {
        self.nodes
    }

    /// Number of sub-responses skipped because they signalled an error.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn request(&self) -> &CombinedRequest {
        self.request
    }
}
