//! Core data types for the enhancement cache.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Number of digest bytes kept in key hashes (16 hex characters).
const HASH_PREFIX_BYTES: usize = 8;

/// Content-addressed identity of a cached result.
///
/// Keys are equal iff all four fields match. The canonical string form
/// `content_hash:enhancement_type:parameters_hash:version` is the lookup
/// identity inside the store and the text pattern invalidation matches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Truncated SHA-256 of the raw content bytes.
    pub content_hash: String,
    /// Kind of enhancement applied (e.g. "upscale", "caption").
    pub enhancement_type: String,
    /// Truncated SHA-256 of the canonical parameter encoding.
    pub parameters_hash: String,
    /// Cache format version.
    pub version: String,
}

impl CacheKey {
    /// Builds a key from already-computed parts.
    pub fn new(
        content_hash: impl Into<String>,
        enhancement_type: impl Into<String>,
        parameters_hash: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            content_hash: content_hash.into(),
            enhancement_type: enhancement_type.into(),
            parameters_hash: parameters_hash.into(),
            version: version.into(),
        }
    }

    /// Derives a key from content, enhancement type, and parameters.
    ///
    /// Parameter objects are hashed with their keys sorted at every depth, so
    /// insertion order never changes the key.
    pub fn generate(
        content: &[u8],
        enhancement_type: &str,
        parameters: &Value,
        version: &str,
    ) -> Self {
        Self::new(
            truncated_digest(content),
            enhancement_type,
            truncated_digest(canonical_json(parameters).as_bytes()),
            version,
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.content_hash, self.enhancement_type, self.parameters_hash, self.version
        )
    }
}

fn truncated_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..HASH_PREFIX_BYTES])
}

/// JSON encoding with object keys sorted recursively.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| format!("{}:{}", Value::String(key.clone()), canonical_json(&map[key])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        scalar => scalar.to_string(),
    }
}

/// Lifecycle state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Servable.
    Valid,
    /// TTL elapsed.
    Expired,
    /// Explicitly invalidated; never served again.
    Invalidated,
    /// Reserved while a result is being produced.
    Pending,
}

/// A cached result with access bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Identity of the entry.
    pub key: CacheKey,
    /// Cached blob.
    pub data: Bytes,
    /// Free-form metadata stored with the blob.
    pub metadata: Value,
    /// When the entry was stored.
    pub created_at: DateTime<Utc>,
    /// When the entry was last read.
    pub last_accessed: DateTime<Utc>,
    /// Number of successful reads.
    pub access_count: u64,
    /// Size of `data` in bytes.
    pub size_bytes: u64,
    /// Lifecycle state.
    pub status: EntryStatus,
    /// Time-to-live measured from `created_at`.
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    /// Create a new valid entry stamped with the current time.
    pub fn new(key: CacheKey, data: Bytes, metadata: Value, ttl: Option<Duration>) -> Self {
        let now = Utc::now();
        Self {
            key,
            size_bytes: data.len() as u64,
            data,
            metadata,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            status: EntryStatus::Valid,
            ttl,
        }
    }

    /// Update the last accessed timestamp and increment access count.
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
        self.access_count += 1;
    }

    /// Whether the entry must no longer be served.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit clock reading.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.status == EntryStatus::Invalidated {
            return true;
        }
        match (self.ttl, (now - self.created_at).to_std()) {
            (Some(ttl), Ok(age)) => age > ttl,
            _ => false,
        }
    }

    /// Stored status, or `Expired` once the TTL has elapsed.
    pub fn effective_status(&self, now: DateTime<Utc>) -> EntryStatus {
        if self.status == EntryStatus::Valid && self.is_expired_at(now) {
            EntryStatus::Expired
        } else {
            self.status
        }
    }

    /// TTL in whole seconds, if any.
    pub fn ttl_seconds(&self) -> Option<u64> {
        self.ttl.map(|ttl| ttl.as_secs())
    }
}

/// Cache statistics for observability.
///
/// The five counters only ever grow; `total_size_bytes` and `entry_count`
/// always describe the entries currently held.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    /// Every `get` call.
    pub total_requests: u64,
    /// Reads that returned data.
    pub cache_hits: u64,
    /// Reads that found nothing servable.
    pub cache_misses: u64,
    /// Entries removed to make room.
    pub evictions: u64,
    /// Entries removed by invalidation or expiry.
    pub invalidations: u64,
    /// Sum of `size_bytes` over held entries.
    pub total_size_bytes: u64,
    /// Number of held entries.
    pub entry_count: u64,
}

impl CacheStatistics {
    /// Fraction of requests that hit, 0.0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }

    /// Fraction of `max_size_bytes` in use.
    pub fn utilization(&self, max_size_bytes: u64) -> f64 {
        if max_size_bytes == 0 {
            0.0
        } else {
            self.total_size_bytes as f64 / max_size_bytes as f64
        }
    }

    /// Plain JSON record for external analytics, including the hit rate.
    pub fn to_value(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("hit_rate".to_string(), Value::from(self.hit_rate()));
        }
        value
    }
}

/// Usage snapshot of one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    /// Canonical key string.
    pub key: String,
    /// Number of successful reads.
    pub access_count: u64,
    /// Size of the blob.
    pub size_bytes: u64,
    /// When the entry was stored.
    pub created_at: DateTime<Utc>,
    /// When the entry was last read.
    pub last_accessed: DateTime<Utc>,
    /// Effective lifecycle state.
    pub status: EntryStatus,
}
