//! Persisted record layout.
//!
//! Every record is stored as a JSON envelope under a composite key:
//!
//! ```text
//! key:   "ROOMS:abc123"
//! value: {"value":":base64:AAEC","expires":1700000000000}
//! ```
//!
//! The optimized touch statement and the sweep statement both address the
//! `$.expires` JSON path (epoch milliseconds) and the `NAMESPACE:key`
//! composite key directly in SQL. Renaming the envelope field breaks both.

use crate::error::Result;
use crate::storage::Namespace;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Marker prefix for binary payloads inside the envelope.
const BINARY_PREFIX: &str = ":base64:";

/// Absolute expiry for a lifetime starting at `now_ms`.
///
/// Lifetimes that do not fit the epoch-millisecond range clamp to
/// `i64::MAX`, which never expires in practice.
pub fn expires_at(now_ms: i64, ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).map_or(i64::MAX, |ttl_ms| now_ms.saturating_add(ttl_ms))
}

/// Builds the physical key for a record.
pub fn composite_key(namespace: Namespace, key: &str) -> String {
    format!("{}:{}", namespace.as_str(), key)
}

/// A stored value: either text or an opaque byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Text(String),
    Binary(Bytes),
}

impl StoredValue {
    /// Returns the raw bytes of the value.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            StoredValue::Text(s) => s.as_bytes(),
            StoredValue::Binary(b) => b,
        }
    }

    /// Consumes the value, returning its bytes.
    pub fn into_bytes(self) -> Bytes {
        match self {
            StoredValue::Text(s) => Bytes::from(s),
            StoredValue::Binary(b) => b,
        }
    }

    fn encode(&self) -> String {
        match self {
            // A leading ':' is doubled so text can never be mistaken for a marker
            StoredValue::Text(s) if s.starts_with(':') => format!(":{s}"),
            StoredValue::Text(s) => s.clone(),
            StoredValue::Binary(b) => format!("{BINARY_PREFIX}{}", STANDARD.encode(b)),
        }
    }

    fn decode(encoded: String) -> Result<Self> {
        if let Some(payload) = encoded.strip_prefix(BINARY_PREFIX) {
            return Ok(StoredValue::Binary(Bytes::from(STANDARD.decode(payload)?)));
        }
        if let Some(text) = encoded.strip_prefix("::") {
            return Ok(StoredValue::Text(format!(":{text}")));
        }
        Ok(StoredValue::Text(encoded))
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::Text(value.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        StoredValue::Text(value)
    }
}

impl From<Bytes> for StoredValue {
    fn from(value: Bytes) -> Self {
        StoredValue::Binary(value)
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(value: Vec<u8>) -> Self {
        StoredValue::Binary(Bytes::from(value))
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires: Option<i64>,
}

/// A decoded record: value plus optional absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub value: StoredValue,
    /// Epoch milliseconds after which the record is logically absent.
    pub expires: Option<i64>,
}

impl Record {
    pub fn new(value: StoredValue, expires: Option<i64>) -> Self {
        Self { value, expires }
    }

    /// A record is gone once `now >= expires`, swept or not.
    #[inline]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires.is_some_and(|exp| now_ms >= exp)
    }

    /// Serializes the record into its JSON envelope.
    pub fn to_json(&self) -> Result<String> {
        let envelope = Envelope {
            value: self.value.encode(),
            expires: self.expires,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Parses a JSON envelope produced by [`Record::to_json`].
    pub fn from_json(raw: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        Ok(Self {
            value: StoredValue::decode(envelope.value)?,
            expires: envelope.expires,
        })
    }
}
