//! Namespaced Store
//!
//! This module implements the store that request handlers talk to. It maps
//! `(namespace, key)` pairs onto a backing store and owns the TTL rules.
//!
//! ## Layout
//!
//! ```text
//!  Durable mode                         In-memory mode
//!
//!  SCENES ──┐                           SCENES ──> MemoryAdapter
//!  ROOMS  ──┤                           ROOMS  ──> MemoryAdapter
//!  FILES  ──┼──> one SqliteAdapter      FILES  ──> MemoryAdapter
//!  SETTINGS─┘    (shared connection)    SETTINGS─> MemoryAdapter
//! ```
//!
//! Every namespace addresses its backing store with the composite key
//! `NAMESPACE:key`, so the shared table never mixes up two namespaces.
//!
//! ## TTL
//!
//! Each write stamps `expires = now + ttl` into the record envelope. Reads
//! treat `now >= expires` as absent and delete the row on the way out. The
//! sweeper only reclaims space; it never decides visibility.

use crate::error::Result;
use crate::storage::adapter::{KvAdapter, UnavailableAdapter};
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::expiry::TtlSweeper;
use crate::storage::memory::MemoryAdapter;
use crate::storage::record::{composite_key, expires_at, Record, StoredValue};
use crate::storage::sqlite::{SqliteAdapter, SqliteConnector, SqliteTarget};
use crate::storage::touch::TouchConfig;
use crate::storage::Namespace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Which physical backend the store is built on.
enum BackendSelection {
    /// One isolated in-memory map per namespace.
    Memory,
    /// One shared SQLite connection, opened from a `STORAGE_URI`.
    Durable(String),
    /// One shared, caller-supplied backend.
    Custom(Arc<dyn KvAdapter>),
}

/// Builder for [`NamespacedStore`].
pub struct StoreBuilder {
    backend: BackendSelection,
    ttl: Option<Duration>,
    touch: TouchConfig,
    clock: Arc<dyn Clock>,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            backend: BackendSelection::Memory,
            ttl: None,
            touch: TouchConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl StoreBuilder {
    pub fn memory(mut self) -> Self {
        self.backend = BackendSelection::Memory;
        self
    }

    pub fn durable(mut self, uri: impl Into<String>) -> Self {
        self.backend = BackendSelection::Durable(uri.into());
        self
    }

    pub fn custom_backend(mut self, adapter: Arc<dyn KvAdapter>) -> Self {
        self.backend = BackendSelection::Custom(adapter);
        self
    }

    /// Lifetime of every written record. A zero lifetime keeps records
    /// forever.
    pub fn ttl(self, ttl: Duration) -> Self {
        self.ttl_opt(Some(ttl))
    }

    /// Same as [`ttl`](Self::ttl), but `None` keeps records forever.
    pub fn ttl_opt(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl.filter(|ttl| !ttl.is_zero());
        self
    }

    pub fn touch(mut self, touch: TouchConfig) -> Self {
        self.touch = touch;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the store.
    ///
    /// A durable backend that fails to open is logged and replaced by an
    /// [`UnavailableAdapter`]; building itself never fails.
    pub async fn build(self) -> NamespacedStore {
        let (adapters, shared, sweeper) = match self.backend {
            BackendSelection::Memory => {
                let adapters: Vec<Arc<dyn KvAdapter>> = Namespace::ALL
                    .iter()
                    .map(|_| Arc::new(MemoryAdapter::new()) as Arc<dyn KvAdapter>)
                    .collect();
                (adapters, None, None)
            }
            BackendSelection::Durable(uri) => {
                let (adapter, sweeper) = open_durable(&uri, &self.clock).await;
                (vec![Arc::clone(&adapter); Namespace::ALL.len()], Some(adapter), sweeper)
            }
            BackendSelection::Custom(adapter) => {
                (vec![Arc::clone(&adapter); Namespace::ALL.len()], Some(adapter), None)
            }
        };

        for namespace in Namespace::ALL {
            debug!(%namespace, backend = adapters[namespace.index()].kind(), "Namespace ready");
        }

        NamespacedStore {
            adapters,
            shared,
            sweeper,
            ttl: self.ttl,
            touch: self.touch,
            clock: self.clock,
            closed: AtomicBool::new(false),
        }
    }
}

async fn open_durable(
    uri: &str,
    clock: &Arc<dyn Clock>,
) -> (Arc<dyn KvAdapter>, Option<TtlSweeper>) {
    let target = match SqliteTarget::parse(uri) {
        Ok(target) => target,
        Err(e) => {
            error!(error = %e, "Rejected storage uri, namespaces will be unavailable");
            return (Arc::new(UnavailableAdapter::new(e.to_string())), None);
        }
    };

    let sweeper = TtlSweeper::with_clock(
        Arc::new(SqliteConnector::new(target.clone())),
        Arc::clone(clock),
    );

    match SqliteAdapter::open(target).await {
        Ok(adapter) => (Arc::new(adapter), Some(sweeper)),
        Err(e) => {
            error!(error = %e, "Could not open backing store, namespaces will be unavailable");
            (Arc::new(UnavailableAdapter::new(e.to_string())), Some(sweeper))
        }
    }
}

/// CRUD over `(namespace, key)` with TTL semantics.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct NamespacedStore {
    /// Indexed by [`Namespace::index`].
    adapters: Vec<Arc<dyn KvAdapter>>,
    /// The single shared backend, when one is configured.
    shared: Option<Arc<dyn KvAdapter>>,
    /// Present only when the store was built from a durable URI.
    sweeper: Option<TtlSweeper>,
    ttl: Option<Duration>,
    touch: TouchConfig,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl NamespacedStore {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// An in-memory store with no TTL.
    pub async fn in_memory() -> Self {
        Self::builder().memory().build().await
    }

    /// Returns the value under `key`, or `None` if it is missing or expired.
    pub async fn get(&self, key: &str, namespace: Namespace) -> Result<Option<StoredValue>> {
        let full_key = composite_key(namespace, key);
        let adapter = self.adapter(namespace);

        let Some(raw) = adapter.get(&full_key).await? else {
            return Ok(None);
        };
        let record = Record::from_json(&raw)?;

        if record.is_expired(self.now_millis()) {
            debug!(%namespace, key, "Dropping expired record on read");
            if let Err(e) = adapter.delete(&full_key).await {
                warn!(%namespace, key, error = %e, "Failed to delete expired record");
            }
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    /// Stores `value` under `key`, replacing any previous value and
    /// resetting its expiration.
    pub async fn set(&self, key: &str, value: StoredValue, namespace: Namespace) -> Result<bool> {
        let expires = self.ttl.map(|ttl| expires_at(self.now_millis(), ttl));
        let raw = Record::new(value, expires).to_json()?;

        self.adapter(namespace)
            .set(&composite_key(namespace, key), raw)
            .await?;
        Ok(true)
    }

    /// Returns `true` if `get` would yield a value. Empty values count.
    pub async fn has(&self, key: &str, namespace: Namespace) -> Result<bool> {
        Ok(self.get(key, namespace).await?.is_some())
    }

    /// Deletes every expired record across all namespaces.
    ///
    /// Returns the number of records removed. In-memory stores have no
    /// sweeper and always report `0`.
    pub async fn delete_expired_items(&self) -> u64 {
        match &self.sweeper {
            Some(sweeper) => sweeper.delete_expired_items().await,
            None => {
                debug!("No durable backend, nothing to sweep");
                0
            }
        }
    }

    /// The sweeper bound to this store's durable backend, if any.
    pub fn sweeper(&self) -> Option<&TtlSweeper> {
        self.sweeper.as_ref()
    }

    /// Whether the store was built on a shared (durable or custom) backend.
    pub fn is_durable(&self) -> bool {
        self.shared.is_some()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Releases the shared backend connection.
    ///
    /// Only the first call does anything. Disconnect failures are logged.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(shared) = &self.shared else {
            debug!("In-memory store, nothing to disconnect");
            return;
        };

        match shared.disconnect().await {
            Ok(()) => info!(backend = shared.kind(), "Backing store disconnected"),
            Err(e) => error!(error = %e, "Error disconnecting backing store"),
        }
    }

    pub(crate) fn adapter(&self, namespace: Namespace) -> &Arc<dyn KvAdapter> {
        &self.adapters[namespace.index()]
    }

    pub(crate) fn touch_config(&self) -> &TouchConfig {
        &self.touch
    }

    pub(crate) fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for NamespacedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedStore")
            .field("durable", &self.is_durable())
            .field("ttl", &self.ttl)
            .field("touch", &self.touch)
            .finish()
    }
}
