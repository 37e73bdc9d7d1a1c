//! Time-bound memoization of successful call results.
//!
//! Keys are canonical: the tool name plus its parameter set serialized with
//! object keys ordered deterministically at every nesting level, so logically
//! identical parameter sets produce the same key regardless of the order the
//! caller supplied them in. Array element order is semantic and preserved.
//!
//! Entries are read lazily — a lookup past the entry's expiry removes it and
//! reports absence; there is no background sweep. Only successful results
//! are ever stored, so a previously failing call always reaches the worker
//! again. One cache per session; `clear` runs at teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Derive the canonical cache key for a tool invocation.
///
/// Parameter sets that are permutations of the same key/value pairs map to
/// the same key:
///
/// ```
/// use serde_json::json;
/// use toolwire::cache::canonical_key;
///
/// let a = canonical_key("lookup", &json!({"x": 1, "y": 2}));
/// let b = canonical_key("lookup", &json!({"y": 2, "x": 1}));
/// assert_eq!(a, b);
/// ```
#[must_use]
pub fn canonical_key(tool: &str, params: &Value) -> String {
    let body = serde_json::to_string(&canonicalize(params)).unwrap_or_default();
    format!("{tool}:{body}")
}

/// Rebuild `value` with object keys inserted in sorted order at every level.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                if let Some(inner) = map.get(key) {
                    out.insert(key.clone(), canonicalize(inner));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// One stored result and the instant it stops being served.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Session-scoped store of successful call results.
///
/// Cloning is cheap and shares the underlying map, so the session and its
/// teardown supervisor can hold the same cache.
#[derive(Debug, Clone)]
pub struct ResultCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    default_ttl: Duration,
}

impl ResultCache {
    /// Create an empty cache whose inserts default to `default_ttl`.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            default_ttl,
        }
    }

    /// Look up `key`, honoring expiry lazily.
    ///
    /// Returns the stored value only while the current time is before the
    /// entry's expiry; a stale entry is removed and reported as absent.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;

        let stale = match entries.get(key) {
            Some(entry) => {
                if Instant::now() < entry.expires_at {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };

        if stale {
            entries.remove(key);
            debug!(key, "cache entry expired, removed");
        }
        None
    }

    /// Store `value` under `key` with the cache's default time-to-live.
    pub async fn insert(&self, key: String, value: Value) {
        self.insert_with_ttl(key, value, self.default_ttl).await;
    }

    /// Store `value` under `key`, retrievable for the next `ttl`.
    pub async fn insert_with_ttl(&self, key: String, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.insert(key, entry);
    }

    /// Remove every entry. Invoked as part of session teardown.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of entries currently stored, including not-yet-collected
    /// stale ones.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
