//! Bounded TTL cache keyed by request URL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache capacity bound: at most this many entries are retained at once.
pub const CAPACITY: usize = 500;
/// Time-to-live for a cached response.
pub const TTL: Duration = Duration::from_secs(60);

struct Entry {
    bytes: Arc<Vec<u8>>,
    inserted_at: Instant,
}

/// TTL-bounded response cache, keyed by the exact request URL.
#[derive(Default)]
pub struct TtlCache {
    entries: HashMap<String, Entry>,
}

impl TtlCache {
    /// Look up a cache entry, treating an expired one as absent.
    pub fn get(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.entries.get(url).and_then(|entry| {
            if entry.inserted_at.elapsed() < TTL {
                Some(Arc::clone(&entry.bytes))
            } else {
                None
            }
        })
    }

    /// Insert a response, evicting expired entries (and, if still full, the oldest one).
    pub fn insert(&mut self, url: String, bytes: Arc<Vec<u8>>) {
        if self.entries.len() >= CAPACITY && !self.entries.contains_key(&url) {
            self.evict_expired();
        }
        if self.entries.len() >= CAPACITY && !self.entries.contains_key(&url) {
            self.evict_oldest();
        }
        self.entries.insert(
            url,
            Entry {
                bytes,
                inserted_at: Instant::now(),
            },
        );
    }

    fn evict_expired(&mut self) {
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < TTL);
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone())
        {
            self.entries.remove(&oldest_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_identical_bytes() {
        let mut cache = TtlCache::default();
        let bytes = Arc::new(vec![1, 2, 3]);
        cache.insert("https://example/a".into(), Arc::clone(&bytes));
        assert_eq!(cache.get("https://example/a"), Some(bytes));
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = TtlCache::default();
        assert!(cache.get("https://example/missing").is_none());
    }

    #[test]
    fn eviction_drops_oldest_when_full_and_unexpired() {
        let mut cache = TtlCache::default();
        for i in 0..CAPACITY {
            cache.insert(format!("https://example/{i}"), Arc::new(vec![0]));
        }
        // Oldest key (index 0) should be the one sacrificed for a new insert.
        cache.insert("https://example/new".into(), Arc::new(vec![9]));
        assert!(cache.get("https://example/0").is_none());
        assert!(cache.get("https://example/new").is_some());
        assert_eq!(cache.entries.len(), CAPACITY);
    }
}
