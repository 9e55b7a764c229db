//! Service records and the registry store.
//!
//! The registry is the only durable state in the gateway: one keyed
//! collection of [`ServiceRecord`]s, owned exclusively by a [`ServiceStore`]
//! implementation behind a trait object. The core pipeline reads through the
//! trait on every request and never caches records, so registry changes take
//! effect on the next request.

pub mod file;
pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scope permitting a service to act as a caller through the proxy.
pub const SCOPE_REQUEST: &str = "request";

/// Scope permitting a service to be a proxy target.
pub const SCOPE_RECEIVE: &str = "receive";

/// A registered upstream service: unique id, base URL, capability scopes.
///
/// The id may itself contain `/`-separated segments; it is matched against
/// inbound path prefixes, not treated as opaque. Scopes are an unordered set
/// of freeform strings; only [`SCOPE_REQUEST`] and [`SCOPE_RECEIVE`] are
/// meaningful to the gateway, everything else is opaque pass-through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: String,
    pub url: String,
    pub scopes: HashSet<String>,
}

impl ServiceRecord {
    /// Build a record from anything iterable as scope strings.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this record carries the given capability scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Base URL with any trailing slashes stripped.
    ///
    /// The stored URL's trailing slash is insignificant; stripping here keeps
    /// destination construction from ever producing a doubled `//`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Failures inside a store implementation.
///
/// These are infrastructure failures, not domain outcomes: a missing record
/// is `Ok(None)` from [`ServiceStore::get`], never an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Keyed persistence of service records.
///
/// Implementations must support concurrent reads and writes; `put` is a full
/// insert-or-replace (re-registering an id discards the old scope set
/// entirely, never merges).
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Look up a record by exact id.
    async fn get(&self, id: &str) -> Result<Option<ServiceRecord>, StoreError>;

    /// Insert or fully replace the record under its id.
    async fn put(&self, record: ServiceRecord) -> Result<(), StoreError>;

    /// Remove a record. Returns `false` if the id was not registered.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// All records, ordered by id for stable output.
    async fn list(&self) -> Result<Vec<ServiceRecord>, StoreError>;
}
