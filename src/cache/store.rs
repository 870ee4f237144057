// In-process KV store with per-key expiry.
// Mirrors the subset of Redis semantics the cache client relies on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::CacheError;
use super::client::KeyTtl;

/// A stored value with its optional deadline.
#[derive(Debug, Clone)]
struct StoredValue {
    /// Serialized value.
    value: String,
    /// When the value stops being visible. `None` means no expiry.
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(deadline),
        }
    }

    /// Check if this value has expired.
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Shared in-memory store. Clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, StoredValue>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value, or `None` if absent or expired.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        live_entry(&mut entries, key).map(|entry| entry.value.clone())
    }

    /// Store a value that expires after `ttl`.
    pub async fn set_ex(&self, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), StoredValue::new(value, Some(ttl)));
    }

    /// Remove a key. Returns true if a live value was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(key) {
            Some(entry) => !entry.is_expired(Instant::now()),
            None => false,
        }
    }

    /// Check whether a live value exists.
    pub async fn exists(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        live_entry(&mut entries, key).is_some()
    }

    /// Remaining lifetime of a key.
    pub async fn ttl(&self, key: &str) -> KeyTtl {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key) {
            None => KeyTtl::Missing,
            Some(StoredValue {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(StoredValue {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(Instant::now())),
        }
    }

    /// Add `amount` to an integer value, creating it without expiry if absent.
    ///
    /// An existing expiry is kept, as Redis INCRBY does.
    pub async fn incr_by(&self, key: &str, amount: i64) -> Result<i64, CacheError> {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key) {
            Some(entry) => {
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| CacheError::NotAnInteger(key.to_string()))?;
                let next = current
                    .checked_add(amount)
                    .ok_or_else(|| CacheError::Overflow(key.to_string()))?;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                entries.insert(key.to_string(), StoredValue::new(amount.to_string(), None));
                Ok(amount)
            }
        }
    }

    /// Set a new expiry on an existing key. Returns false if the key is absent.
    pub async fn expire(&self, key: &str, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = deadline(ttl);
                true
            }
            None => false,
        }
    }

    /// Number of live keys. Expired keys are purged as a side effect.
    pub async fn len(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.len()
    }

    /// Check whether the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Deadline `ttl` from now. A TTL past the clock's range never expires.
fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

/// Look up a key, dropping it first if it has expired.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, StoredValue>,
    key: &str,
) -> Option<&'a mut StoredValue> {
    if entries
        .get(key)
        .is_some_and(|entry| entry.is_expired(Instant::now()))
    {
        entries.remove(key);
        return None;
    }
    entries.get_mut(key)
}
