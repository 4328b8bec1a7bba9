//! Fetch configuration.
//!
//! Everything has a default, so an empty YAML document (or
//! [`FetchConfig::default`]) is a valid configuration. Per-edge profiles
//! choose how many sub-requests go into one combined call and how long a call
//! may take; edges without a profile use `default_profile`.
//!
//! ```yaml
//! base_url: https://graph.facebook.com
//! batch_path: /batch
//! batch_capacity: 20
//! default_profile: { max_batches: 20, timeout_secs: 10 }
//! edges:
//!   /posts: { max_batches: 5, timeout_secs: 60 }
//! retry: { max_retries: 4, delay_step_secs: 2 }
//! ```

use crate::batch::{DEFAULT_BATCH_CAPACITY, DEFAULT_MAX_BATCHES};
use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_BATCH_PATH: &str = "/batch";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Edges whose responses are heavy enough to need smaller, slower calls.
static DESIGNATED_EDGES: Lazy<HashMap<String, EdgeProfile>> = Lazy::new(|| {
    let mut edges = HashMap::new();
    edges.insert(
        "/posts".to_string(),
        EdgeProfile {
            max_batches: 5,
            timeout_secs: 60,
        },
    );
    edges
});

/// Capacity and timeout for one target edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeProfile {
    /// Sub-requests per combined call.
    pub max_batches: usize,
    pub timeout_secs: u64,
}

impl Default for EdgeProfile {
    fn default() -> Self {
        Self {
            max_batches: DEFAULT_MAX_BATCHES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EdgeProfile {
    /// Built-in profile for `edge`, or the default when the edge has none.
    pub fn designated(edge: &str) -> Self {
        DESIGNATED_EDGES.get(edge).copied().unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry settings for the batch client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before retry `n` is `(n - 1) * delay_step_secs`.
    pub delay_step_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 4,
            delay_step_secs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub batch_path: String,
    /// Identifiers per sub-request.
    pub batch_capacity: usize,
    pub default_profile: EdgeProfile,
    pub edges: HashMap<String, EdgeProfile>,
    pub retry: RetrySettings,
    pub pool_max_idle_per_host: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            batch_path: DEFAULT_BATCH_PATH.to_string(),
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            default_profile: EdgeProfile::default(),
            edges: DESIGNATED_EDGES.clone(),
            retry: RetrySettings::default(),
            pool_max_idle_per_host: 4,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity;
        self
    }

    pub fn with_edge(mut self, edge: impl Into<String>, profile: EdgeProfile) -> Self {
        self.edges.insert(edge.into(), profile);
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: FetchConfig = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                "invalid configuration document",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read configuration file {}", path.display()),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `GRAPH_FETCH_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup("GRAPH_FETCH_BASE_URL") {
            self.base_url = url;
        }
        if let Some(raw) = lookup("GRAPH_FETCH_TIMEOUT_SECS") {
            self.default_profile.timeout_secs = parse_env("GRAPH_FETCH_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("GRAPH_FETCH_MAX_RETRIES") {
            self.retry.max_retries = parse_env("GRAPH_FETCH_MAX_RETRIES", &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Profile for `edge`, falling back to the default profile.
    pub fn profile_for(&self, edge: &str) -> EdgeProfile {
        self.edges
            .get(edge)
            .copied()
            .unwrap_or(self.default_profile)
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url {}", self.base_url),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(e.to_string()),
            )
        })
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("base_url", "scheme must be http or https"));
        }
        if !self.batch_path.starts_with('/') {
            return Err(invalid("batch_path", "must start with '/'"));
        }
        if self.batch_capacity == 0 {
            return Err(invalid("batch_capacity", "must be at least 1"));
        }
        check_profile("default_profile", &self.default_profile)?;
        for (edge, profile) in &self.edges {
            check_profile(&format!("edges.{}", edge), profile)?;
        }
        Ok(())
    }
}

fn check_profile(field: &str, profile: &EdgeProfile) -> Result<()> {
    if profile.max_batches == 0 {
        return Err(invalid(
            format!("{}.max_batches", field),
            "must be at least 1",
        ));
    }
    if profile.timeout_secs == 0 {
        return Err(invalid(
            format!("{}.timeout_secs", field),
            "must be at least 1",
        ));
    }
    Ok(())
}

fn invalid(field: impl Into<String>, details: &str) -> Error {
    Error::configuration_with_context(
        "invalid configuration value",
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("config_validator"),
    )
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        Error::configuration_with_context(
            format!("cannot parse {}", key),
            ErrorContext::new()
                .with_field_path(key)
                .with_details(format!("got {:?}", raw))
                .with_source("env"),
        )
    })
}
