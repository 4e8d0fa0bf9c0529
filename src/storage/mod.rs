//! Storage Module
//!
//! Everything below the HTTP layer: the namespaced store, its backing
//! stores, the touch paths and the expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//!        get / set / has / touch                 delete_expired_items
//!                 │                                       │
//!                 ▼                                       ▼
//!  ┌──────────────────────────────┐          ┌──────────────────────────┐
//!  │       NamespacedStore        │          │        TtlSweeper        │
//!  │  TTL stamping, lazy expiry,  │          │  dedicated connection    │
//!  │  touch decision              │          │  per run                 │
//!  └──────────────┬───────────────┘          └────────────┬─────────────┘
//!                 │ KvAdapter (+ RawQuery)                │ SweepConnector
//!                 ▼                                       ▼
//!  ┌──────────────────────────────┐          ┌──────────────────────────┐
//!  │ SqliteAdapter | MemoryAdapter│          │     SqliteConnector      │
//!  └──────────────────────────────┘          └──────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use stashkv::storage::{Namespace, NamespacedStore, StoredValue};
//! use std::time::Duration;
//!
//! # tokio_test_block_on(async {
//! let store = NamespacedStore::builder()
//!     .memory()
//!     .ttl(Duration::from_secs(3600))
//!     .build()
//!     .await;
//!
//! store.set("room-1", "hello".into(), Namespace::Rooms).await.unwrap();
//! assert_eq!(
//!     store.get("room-1", Namespace::Rooms).await.unwrap(),
//!     Some(StoredValue::from("hello"))
//! );
//! assert!(store.touch("room-1", Namespace::Rooms).await);
//! assert!(!store.has("room-1", Namespace::Scenes).await.unwrap());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod adapter;
pub mod clock;
pub mod engine;
pub mod expiry;
pub mod memory;
pub mod namespace;
pub mod record;
pub mod sqlite;
pub mod touch;

// Re-export commonly used types
pub use adapter::{Capability, KvAdapter, RawQuery, SqlParam, UnavailableAdapter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{NamespacedStore, StoreBuilder};
pub use expiry::{ExpirySweeper, SweepConnection, SweepConnector, SweepSchedule, TtlSweeper};
pub use memory::MemoryAdapter;
pub use namespace::Namespace;
pub use record::{composite_key, Record, StoredValue};
pub use sqlite::{SqliteAdapter, SqliteConnector, SqliteTarget};
pub use touch::{TouchConfig, DEFAULT_TOUCH_TTL};
