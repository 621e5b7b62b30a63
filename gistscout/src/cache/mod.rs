//! Optional content cache injected into the content fetcher.
//!
//! Only whole bodies are cached, keyed by raw URL. Streamed content never
//! enters the cache.

use dashmap::DashMap;
use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::config::CacheConfig;

/// Storage for fetched file bodies
pub trait ContentCache: Send + Sync + Debug {
    /// Returns a live body for `raw_url`, if any
    fn get(&self, raw_url: &str) -> Option<Arc<[u8]>>;

    /// Stores `body` for `raw_url`
    fn insert(&self, raw_url: &str, body: Arc<[u8]>);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Arc<[u8]>,
    inserted_at: Instant,
}

/// In-memory cache with a time-to-live and an entry bound.
///
/// Expired entries are never returned. When full, expired entries are
/// purged first; if none expired, the oldest insertion is evicted.
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: NonZeroUsize,
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: NonZeroUsize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl, config.max_entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) >= self.ttl
    }

    fn purge_expired(&self, now: Instant) {
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            trace!("Evicting cached body for {}", key);
            self.entries.remove(&key);
        }
    }
}

impl ContentCache for MemoryCache {
    fn get(&self, raw_url: &str) -> Option<Arc<[u8]>> {
        let now = Instant::now();
        let body = {
            let entry = self.entries.get(raw_url)?;
            if self.is_expired(&entry, now) {
                None
            } else {
                Some(Arc::clone(&entry.body))
            }
        };
        if body.is_none() {
            self.entries.remove(raw_url);
        }
        body
    }

    fn insert(&self, raw_url: &str, body: Arc<[u8]>) {
        let now = Instant::now();
        if !self.entries.contains_key(raw_url) && self.entries.len() >= self.max_entries.get() {
            self.purge_expired(now);
            if self.entries.len() >= self.max_entries.get() {
                self.evict_oldest();
            }
        }
        self.entries.insert(
            raw_url.to_string(),
            CacheEntry {
                body,
                inserted_at: now,
            },
        );
    }
}
