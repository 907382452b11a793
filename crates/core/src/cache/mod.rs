//! Generic TTL memoization cache.
//!
//! Every component that wants to avoid re-asking an upstream (store status
//! checks, indexer client construction, pull cooldowns) goes through a
//! `TtlCache`. Expiry is enforced lazily at read time; an entry is never
//! returned after its lifetime has elapsed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Keyed in-memory cache where every entry shares the cache's lifetime.
///
/// All operations are in-memory and O(1) amortized. The cache is safe for
/// concurrent use through `&self`. The `name` is used only for diagnostics,
/// never for keying.
pub struct TtlCache<K, V> {
    name: String,
    lifetime: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(name: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            name: name.into(),
            lifetime,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Diagnostics-only name of this cache instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `value` under `key`, overwriting any prior entry and its expiry.
    pub fn add(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.lifetime,
            },
        );
    }

    /// Look up `key`. Returns `None` if it was never set, was removed, or its
    /// lifetime has elapsed. Expired entries are dropped on access.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Invalidate an entry immediately, regardless of remaining lifetime.
    pub fn remove(&self, key: &K) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Drop every entry whose lifetime has elapsed and return how many were
    /// removed. Callers with long-lived caches can sweep opportunistically;
    /// the read contract does not depend on it.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(cache = %self.name, purged, "purged expired cache entries");
        }
        purged
    }

    /// Number of entries currently stored, including not-yet-collected
    /// expired ones.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
