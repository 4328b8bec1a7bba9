//! Bearer credential resolved at send time.

use crate::{Error, Result};
use keyring::Entry;
use std::fmt;
use std::sync::Arc;

type Provider = dyn Fn() -> Result<String> + Send + Sync;

/// Access token sent with every combined call.
///
/// A `Provider` is invoked on each send, so rotating tokens are picked up
/// between sends without rebuilding the client.
///
/// The resolved token is sent unchanged, except that an empty or
/// whitespace-only token is refused with [`Error::Credential`] instead of
/// being posted as `access_token=`.
#[derive(Clone)]
pub enum Credential {
    Static(String),
    Provider(Arc<Provider>),
}

impl Credential {
    pub fn token(token: impl Into<String>) -> Self {
        Credential::Static(token.into())
    }

    pub fn provider<F>(f: F) -> Self
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        Credential::Provider(Arc::new(f))
    }

    /// Read the environment variable on every send.
    pub fn from_env(var: impl Into<String>) -> Self {
        let var = var.into();
        Self::provider(move || {
            std::env::var(&var)
                .map_err(|_| Error::credential(format!("environment variable {} is not set", var)))
        })
    }

    /// Read the token from the OS keyring on every send.
    pub fn from_keyring(service: impl Into<String>, account: impl Into<String>) -> Self {
        let service = service.into();
        let account = account.into();
        Self::provider(move || {
            let entry = Entry::new(&service, &account)
                .map_err(|e| Error::credential(format!("keyring entry {}: {}", service, e)))?;
            entry
                .get_password()
                .map_err(|e| Error::credential(format!("keyring entry {}: {}", service, e)))
        })
    }

    /// Try `self`, then `other` when `self` fails.
    pub fn or(self, other: Credential) -> Self {
        Self::provider(move || self.resolve().or_else(|_| other.resolve()))
    }

    /// Produce the token for one send. Fails on provider errors and on an
    /// empty or whitespace-only token; the value is otherwise not altered.
    pub fn resolve(&self) -> Result<String> {
        let token = match self {
            Credential::Static(token) => token.clone(),
            Credential::Provider(f) => f()?,
        };
        if token.trim().is_empty() {
            return Err(Error::credential("access token is empty"));
        }
        Ok(token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Static(_) => f.write_str("Credential::Static(<redacted>)"),
            Credential::Provider(_) => f.write_str("Credential::Provider"),
        }
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Credential::token(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Credential::Static(token)
    }
}
