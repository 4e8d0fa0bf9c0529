//! # StashKV - A Namespaced, TTL-Bounded Key-Value Store
//!
//! StashKV stores opaque blobs in a small set of fixed namespaces behind an
//! HTTP API. Records carry an absolute expiry; the store can run on a
//! durable SQLite database or entirely in memory.
//!
//! ## Features
//!
//! - **Namespaces**: `SCENES`, `ROOMS`, `FILES` and `SETTINGS` are independent key spaces
//! - **TTL**: Every write stamps an expiry; expired records read as absent
//! - **Touch**: Refresh expiry in place with one SQL update, or by read + rewrite
//! - **Sweeper**: A scheduled background task deletes expired rows
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              StashKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────────┐ │
//! │  │ axum Router │───>│  Handlers   │───>│       NamespacedStore        │ │
//! │  │ (/api/v2)   │    │             │    │  get / set / has / touch     │ │
//! │  └─────────────┘    └─────────────┘    └──────────────┬───────────────┘ │
//! │                                                       │                 │
//! │                                   ┌───────────────────┴──────────┐      │
//! │                                   ▼                              ▼      │
//! │                          ┌────────────────┐            ┌──────────────┐ │
//! │                          │ SqliteAdapter  │            │MemoryAdapter │ │
//! │                          │ (shared conn)  │            │ (per ns)     │ │
//! │                          └───────▲────────┘            └──────────────┘ │
//! │                                  │ own connection per run               │
//! │                          ┌───────┴────────┐                             │
//! │                          │ ExpirySweeper  │                             │
//! │                          │ (Tokio task)   │                             │
//! │                          └────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use stashkv::server::{self, AppState};
//! use stashkv::storage::NamespacedStore;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(
//!         NamespacedStore::builder()
//!             .durable("sqlite://data/stash.db")
//!             .build()
//!             .await,
//!     );
//!
//!     let app = server::router(AppState::new(Arc::clone(&store)), stashkv::DEFAULT_MAX_PAYLOAD);
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     server::serve(listener, app).await?;
//!
//!     store.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: Namespaced store, backing stores, touch and sweeper
//! - [`server`]: HTTP routes and error responses
//! - [`config`]: Command-line and environment configuration
//! - [`error`]: Storage error type
//!
//! ## Expiry
//!
//! Records expire in two ways:
//! 1. **Lazy**: A read that finds an expired record deletes it and reports absent
//! 2. **Active**: The sweeper deletes every expired record in one statement
//!
//! Only the first one decides what callers see. The second reclaims rows
//! that are never read again.

pub mod config;
pub mod error;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::{Result, StoreError};
pub use storage::{ExpirySweeper, Namespace, NamespacedStore, StoredValue, TouchConfig};

/// The default port StashKV listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host StashKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Largest request body accepted by default (50 MiB)
pub const DEFAULT_MAX_PAYLOAD: usize = 50 * 1024 * 1024;

/// Version of StashKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
