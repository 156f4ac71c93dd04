//! Content-addressed caches with time-to-live and bounded size
//!
//! Shared by the semantic matcher (embeddings) and the reasoning analyzer.
//! Keys are SHA-256 hex digests of normalized content, so two writers racing
//! on the same miss store the same value.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Hash several content parts into one key. Parts are length-prefixed so
/// `("ab", "c")` and `("a", "bc")` hash differently.
pub fn content_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    sequence: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct ContentCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
    enabled: bool,
    sequence: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ContentCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            enabled: !ttl.is_zero(),
            sequence: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        let mut cache = Self::new(Duration::ZERO, 1);
        cache.enabled = false;
        cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &str) -> Option<V> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        let found = self
            .entries
            .read()
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone());

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, value: V) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write();

        entries.retain(|_, entry| entry.expires_at > now);

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.sequence)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
                sequence,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
