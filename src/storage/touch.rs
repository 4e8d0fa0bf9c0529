//! TTL refresh ("touch").
//!
//! Two physical paths sit behind one call:
//!
//! ```text
//!   touch(key, ns)
//!        │
//!        ├── enabled && RawQuery ──> UPDATE ... json_set(expires)   (value never read)
//!        │
//!        └── otherwise ────────────> get(key, ns) ──> set(key, same value, ns)
//! ```
//!
//! The decision is made on every call. Touch never fails the caller: every
//! error becomes `false` plus a log line.
//!
//! The fallback path is two separate backing-store operations. A write that
//! lands between its read and its rewrite is overwritten with the stale value.

use crate::storage::adapter::{Capability, RawQuery, SqlParam};
use crate::storage::record::{composite_key, expires_at};
use crate::storage::sqlite::TOUCH_EXPIRES_SQL;
use crate::storage::{Namespace, NamespacedStore};
use std::time::Duration;
use tracing::{debug, error, warn};

/// TTL used by the optimized path when no store TTL is configured.
///
/// Only the in-place path writes it. The rewrite path goes through `set`, so
/// on a store without a TTL a rewritten record stays without expiry while an
/// in-place touch gives the same record one day to live.
pub const DEFAULT_TOUCH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Settings for the optimized touch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchConfig {
    /// Whether the optimized path may be used at all.
    pub enabled: bool,
    /// New lifetime written by the optimized path.
    pub ttl: Duration,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl TouchConfig {
    pub fn enabled(ttl: Duration) -> Self {
        Self { enabled: true, ttl }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: DEFAULT_TOUCH_TTL,
        }
    }
}

impl NamespacedStore {
    /// Refreshes the expiration of `key` in `namespace`.
    ///
    /// Returns `true` iff a record existed and its expiration was refreshed.
    /// A missing record, a backend error and an unavailable backend all look
    /// the same to the caller.
    pub async fn touch(&self, key: &str, namespace: Namespace) -> bool {
        let adapter = self.adapter(namespace);
        match (self.touch_config().enabled, adapter.capability()) {
            (true, Capability::RawQuery(raw)) => self.touch_in_place(raw, key, namespace).await,
            (true, Capability::Simple) | (false, _) => self.touch_by_rewrite(key, namespace).await,
        }
    }

    async fn touch_in_place(&self, raw: &dyn RawQuery, key: &str, namespace: Namespace) -> bool {
        let expires = expires_at(self.now_millis(), self.touch_config().ttl);
        let params = [
            SqlParam::Integer(expires),
            SqlParam::Text(composite_key(namespace, key)),
        ];

        match raw.execute(TOUCH_EXPIRES_SQL, &params).await {
            Ok(1) => {
                debug!(%namespace, key, expires, "Refreshed expiry in place");
                true
            }
            Ok(rows) => {
                warn!(%namespace, key, rows, "Touch matched no single record");
                false
            }
            Err(e) => {
                error!(%namespace, key, error = %e, "Error executing touch statement");
                false
            }
        }
    }

    async fn touch_by_rewrite(&self, key: &str, namespace: Namespace) -> bool {
        let value = match self.get(key, namespace).await {
            Ok(Some(value)) => value,
            Ok(None) => return false,
            Err(e) => {
                error!(%namespace, key, error = %e, "Touch could not read record");
                return false;
            }
        };

        match self.set(key, value, namespace).await {
            Ok(written) => written,
            Err(e) => {
                error!(%namespace, key, error = %e, "Touch could not rewrite record");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::clock::ManualClock;
    use crate::storage::engine::test_support::RecordingAdapter;
    use crate::storage::sqlite::{SqliteAdapter, SqliteTarget};
    use crate::storage::adapter::KvAdapter;
    use crate::storage::{Record, StoredValue};
    use std::sync::Arc;

    const T0: i64 = 1_000_000_000;
    const DAY_MS: i64 = 86_400_000;

    async fn store_over(
        adapter: Arc<RecordingAdapter>,
        touch: TouchConfig,
    ) -> (NamespacedStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let store = NamespacedStore::builder()
            .custom_backend(adapter)
            .ttl(Duration::from_millis(DAY_MS as u64))
            .touch(touch)
            .clock(clock.clone())
            .build()
            .await;
        (store, clock)
    }

    #[tokio::test]
    async fn test_missing_key_returns_false_without_writing() {
        let adapter = Arc::new(RecordingAdapter::simple());
        let (store, _) = store_over(adapter.clone(), TouchConfig::disabled()).await;

        assert!(!store.touch("never-set", Namespace::Scenes).await);
        assert_eq!(adapter.set_calls().len(), 0);
    }

    #[tokio::test]
    async fn test_optimized_path_issues_single_update() {
        let adapter = Arc::new(RecordingAdapter::with_raw_query(1));
        let touch = TouchConfig::enabled(Duration::from_millis(DAY_MS as u64));
        let (store, _) = store_over(adapter.clone(), touch).await;

        assert!(store.touch("test-key-123", Namespace::Scenes).await);

        let raw = adapter.raw_calls();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].0, TOUCH_EXPIRES_SQL);
        assert_eq!(
            raw[0].1,
            vec![
                SqlParam::Integer(T0 + DAY_MS),
                SqlParam::Text("SCENES:test-key-123".to_string()),
            ]
        );
        assert_eq!(adapter.get_calls().len(), 0);
        assert_eq!(adapter.set_calls().len(), 0);
    }

    #[tokio::test]
    async fn test_optimized_path_clamps_oversized_ttl() {
        let adapter = Arc::new(RecordingAdapter::with_raw_query(1));
        let touch = TouchConfig::enabled(Duration::from_millis(i64::MAX as u64));
        let (store, _) = store_over(adapter.clone(), touch).await;

        assert!(store.touch("k", Namespace::Rooms).await);
        assert_eq!(adapter.raw_calls()[0].1[0], SqlParam::Integer(i64::MAX));
    }

    #[tokio::test]
    async fn test_optimized_path_zero_rows_is_false() {
        let adapter = Arc::new(RecordingAdapter::with_raw_query(0));
        let (store, _) = store_over(adapter.clone(), TouchConfig::enabled(DEFAULT_TOUCH_TTL)).await;

        assert!(!store.touch("missing", Namespace::Files).await);
        assert_eq!(adapter.raw_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_optimized_path_error_is_false() {
        let adapter = Arc::new(RecordingAdapter::with_raw_query(1));
        adapter.fail_raw_queries();
        let (store, _) = store_over(adapter.clone(), TouchConfig::enabled(DEFAULT_TOUCH_TTL)).await;

        assert!(!store.touch("any", Namespace::Files).await);
    }

    #[tokio::test]
    async fn test_fallback_rewrites_value_unchanged() {
        let adapter = Arc::new(RecordingAdapter::simple());
        let (store, clock) = store_over(adapter.clone(), TouchConfig::enabled(DEFAULT_TOUCH_TTL)).await;
        store.set("doc", "payload".into(), Namespace::Rooms).await.unwrap();

        clock.set(T0 + 5_000);
        assert!(store.touch("doc", Namespace::Rooms).await);

        let sets = adapter.set_calls();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].1.value, sets[1].1.value);
        assert_eq!(sets[1].1.expires, Some(T0 + 5_000 + DAY_MS));
        assert_eq!(
            store.get("doc", Namespace::Rooms).await.unwrap(),
            Some(StoredValue::from("payload"))
        );
    }

    #[tokio::test]
    async fn test_disabled_touch_ignores_raw_capability() {
        let adapter = Arc::new(RecordingAdapter::with_raw_query(1));
        let (store, _) = store_over(adapter.clone(), TouchConfig::disabled()).await;
        store.set("doc", "payload".into(), Namespace::Files).await.unwrap();

        assert!(store.touch("doc", Namespace::Files).await);
        assert_eq!(adapter.raw_calls().len(), 0);
        assert_eq!(adapter.set_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_read_error_is_false() {
        let adapter = Arc::new(RecordingAdapter::simple());
        let (store, _) = store_over(adapter.clone(), TouchConfig::disabled()).await;
        store.set("doc", "payload".into(), Namespace::Files).await.unwrap();
        adapter.fail_reads();

        assert!(!store.touch("doc", Namespace::Files).await);
        assert_eq!(adapter.set_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_write_error_is_false() {
        let adapter = Arc::new(RecordingAdapter::simple());
        let (store, _) = store_over(adapter.clone(), TouchConfig::disabled()).await;
        store.set("doc", "payload".into(), Namespace::Files).await.unwrap();
        adapter.fail_writes();

        assert!(!store.touch("doc", Namespace::Files).await);
    }

    #[tokio::test]
    async fn test_sqlite_touch_extends_expiry_without_rewriting_value() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sqlite = SqliteAdapter::open(SqliteTarget::File(tmp.path().join("touch.db")))
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(chrono::Utc::now().timestamp_millis()));
        let store = NamespacedStore::builder()
            .custom_backend(Arc::new(sqlite))
            .ttl(Duration::from_secs(60))
            .touch(TouchConfig::enabled(Duration::from_secs(3600)))
            .clock(clock.clone())
            .build()
            .await;

        store
            .set("file", StoredValue::from(vec![0u8, 1, 2, 255]), Namespace::Files)
            .await
            .unwrap();
        assert!(store.touch("file", Namespace::Files).await);

        // Past the first lifetime, inside the refreshed one
        clock.advance(120_000);
        assert_eq!(
            store.get("file", Namespace::Files).await.unwrap(),
            Some(StoredValue::from(vec![0u8, 1, 2, 255]))
        );
        assert!(!store.touch("other", Namespace::Files).await);
    }

    #[tokio::test]
    async fn test_sql_guard_follows_database_clock() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sqlite = SqliteAdapter::open(SqliteTarget::File(tmp.path().join("guard.db")))
            .await
            .unwrap();
        let wall = chrono::Utc::now().timestamp_millis();
        let live_by_wall = Record::new(StoredValue::from("v"), Some(wall + 60_000));
        sqlite.set("ROOMS:k", live_by_wall.to_json().unwrap()).await.unwrap();

        // Store clock runs ahead of SQLite's, past the record's expiry
        let store = NamespacedStore::builder()
            .custom_backend(Arc::new(sqlite))
            .touch(TouchConfig::enabled(DEFAULT_TOUCH_TTL))
            .clock(Arc::new(ManualClock::new(wall + 120_000)))
            .build()
            .await;

        assert!(store.touch("k", Namespace::Rooms).await);
        assert_eq!(
            store.get("k", Namespace::Rooms).await.unwrap(),
            Some(StoredValue::from("v"))
        );
    }

    #[tokio::test]
    async fn test_untimed_store_paths_disagree_on_expiry() {
        let tmp = tempfile::TempDir::new().unwrap();
        let uri = format!("sqlite://{}", tmp.path().join("untimed.db").display());
        let now = chrono::Utc::now().timestamp_millis();

        let in_place = NamespacedStore::builder()
            .durable(uri.clone())
            .touch(TouchConfig::enabled(DEFAULT_TOUCH_TTL))
            .clock(Arc::new(ManualClock::new(now)))
            .build()
            .await;
        let rewrite = NamespacedStore::builder()
            .durable(uri)
            .touch(TouchConfig::disabled())
            .clock(Arc::new(ManualClock::new(now)))
            .build()
            .await;

        in_place.set("a", "v".into(), Namespace::Rooms).await.unwrap();
        rewrite.set("b", "v".into(), Namespace::Rooms).await.unwrap();
        assert!(in_place.touch("a", Namespace::Rooms).await);
        assert!(rewrite.touch("b", Namespace::Rooms).await);

        let expiry_of = |raw: Option<String>| Record::from_json(&raw.unwrap()).unwrap().expires;
        let adapter = in_place.adapter(Namespace::Rooms);
        assert_eq!(
            expiry_of(adapter.get("ROOMS:a").await.unwrap()),
            Some(now + DEFAULT_TOUCH_TTL.as_millis() as i64)
        );
        assert_eq!(expiry_of(adapter.get("ROOMS:b").await.unwrap()), None);

        in_place.close().await;
        rewrite.close().await;
    }

    #[tokio::test]
    async fn test_unavailable_backend_touch_is_false() {
        let store = NamespacedStore::builder()
            .durable("postgres://localhost/db")
            .touch(TouchConfig::enabled(DEFAULT_TOUCH_TTL))
            .build()
            .await;

        assert!(!store.touch("k", Namespace::Scenes).await);
    }
}
