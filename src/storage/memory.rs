//! In-memory backing store.
//!
//! Used when no `STORAGE_URI` is configured. Each namespace gets its own
//! isolated instance, and records vanish on restart.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MemoryAdapter                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are distributed across shards by hash, so writers to different keys
//! rarely contend. Expiry is not tracked here: envelopes are opaque strings
//! and the namespaced store drops expired ones lazily on read.

use crate::error::Result;
use crate::storage::adapter::KvAdapter;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Number of shards per adapter.
const NUM_SHARDS: usize = 16;

#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<String, String>>,
}

/// Sharded in-memory map of composite key to record envelope.
#[derive(Debug)]
pub struct MemoryAdapter {
    shards: Vec<Shard>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
        }
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Number of physically present envelopes, expired ones included.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.data.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvAdapter for MemoryAdapter {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.shard(key).data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, raw: String) -> Result<()> {
        self.shard(key).data.write().insert(key.to_string(), raw);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.shard(key).data.write().remove(key).is_some())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::adapter::Capability;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_and_get() {
        let adapter = MemoryAdapter::new();

        adapter.set("ROOMS:key", "value".to_string()).await.unwrap();
        assert_eq!(
            adapter.get("ROOMS:key").await.unwrap(),
            Some("value".to_string())
        );
        assert_eq!(adapter.get("ROOMS:other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let adapter = MemoryAdapter::new();

        adapter.set("k", "one".to_string()).await.unwrap();
        adapter.set("k", "two".to_string()).await.unwrap();

        assert_eq!(adapter.get("k").await.unwrap(), Some("two".to_string()));
        assert_eq!(adapter.len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let adapter = MemoryAdapter::new();

        adapter.set("k", "v".to_string()).await.unwrap();
        assert!(adapter.delete("k").await.unwrap());
        assert!(!adapter.delete("k").await.unwrap());
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn test_has_no_raw_capability() {
        let adapter = MemoryAdapter::new();
        assert!(matches!(adapter.capability(), Capability::Simple));
        assert!(adapter.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let adapter = Arc::new(MemoryAdapter::new());
        let mut handles = vec![];

        for i in 0..8 {
            let adapter = Arc::clone(&adapter);
            handles.push(tokio::spawn(async move {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    adapter.set(&key, "value".to_string()).await.unwrap();
                    adapter.get(&key).await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(adapter.len(), 800);
    }
}
