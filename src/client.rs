//! Retrying batch client.
//!
//! Keep the public surface small: one client type, its retry policy and a
//! counters snapshot. Implementation details are split into submodules under
//! `src/client/`.

pub mod core;
mod error_classification;
mod policy;

pub use core::{BatchClient, ClientStats, Sleeper, ACCESS_TOKEN_FIELD};
pub use policy::{Decision, RetryPolicy};
