//! Process-wide TTL caches for the external enricher.
//!
//! Plain `Mutex<HashMap>` with lazy eviction: every access sweeps expired
//! entries first. Caches can be disabled so tests always hit the
//! collaborators.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    enabled: bool,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            enabled: true,
        }
    }

    /// A cache that never stores anything. Used by tests to bypass caching.
    pub fn disabled() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    fn sweep(map: &mut HashMap<K, CacheEntry<V>>, now: Instant) {
        map.retain(|_, entry| entry.expires_at > now);
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Self::sweep(&mut map, Instant::now());
        map.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        if !self.enabled {
            return;
        }
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        Self::sweep(&mut map, now);
        map.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
