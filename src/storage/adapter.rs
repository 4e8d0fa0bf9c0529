//! Backing store contract.
//!
//! A backing store is a dumb string-to-string map keyed by the composite
//! `NAMESPACE:key`. Serialization, TTL stamping and lazy expiry live one
//! layer up in [`NamespacedStore`](crate::storage::NamespacedStore).
//!
//! Durable stores additionally expose a raw relational query capability.
//! Callers discover it through [`KvAdapter::capability`], which returns a
//! variant rather than a method to probe for, so every branch on it is an
//! exhaustive `match`.

use crate::error::{Result, StoreError};
use async_trait::async_trait;

/// Positional parameter for a raw statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Integer(i64),
    Text(String),
}

/// Raw statement execution, available only on durable stores.
#[async_trait]
pub trait RawQuery: Send + Sync {
    /// Executes a statement with `?N` positional parameters and returns the
    /// number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64>;
}

/// What a backing store can do beyond get/set/delete.
pub enum Capability<'a> {
    /// Plain key-value operations only.
    Simple,
    /// The store accepts raw statements against its physical table.
    RawQuery(&'a dyn RawQuery),
}

/// Physical key-value persistence shared by all namespaces.
#[async_trait]
pub trait KvAdapter: Send + Sync + 'static {
    /// Returns the raw envelope stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `raw` under `key`, replacing any previous envelope.
    async fn set(&self, key: &str, raw: String) -> Result<()>;

    /// Removes `key`. Returns `true` if something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Releases the underlying connection. Stores with nothing to release
    /// keep the default no-op.
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Optional capabilities of this store.
    fn capability(&self) -> Capability<'_> {
        Capability::Simple
    }

    /// Short name used in log lines.
    fn kind(&self) -> &'static str;
}

/// Stand-in for a durable store that failed to open.
///
/// Every operation fails with [`StoreError::Unavailable`] so the affected
/// namespaces report errors instead of silently losing writes, while the
/// process itself keeps running.
#[derive(Debug, Clone)]
pub struct UnavailableAdapter {
    reason: String,
}

impl UnavailableAdapter {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl KvAdapter for UnavailableAdapter {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(StoreError::unavailable(&self.reason))
    }

    async fn set(&self, _key: &str, _raw: String) -> Result<()> {
        Err(StoreError::unavailable(&self.reason))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Err(StoreError::unavailable(&self.reason))
    }

    fn kind(&self) -> &'static str {
        "unavailable"
    }
}
