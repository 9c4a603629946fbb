//! Rendered page cache with LRU eviction
//!
//! Maps a document key to its full rendered page sequence. Rendered pages are
//! memory-heavy and browsing is a sliding window over neighbouring documents,
//! so the cache holds only a handful of entries.
//!
//! # Thread Safety
//!
//! The LRU is guarded by a `parking_lot::Mutex` that is never held across an
//! `.await`, so every operation is atomic with respect to other tasks.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use super::types::PageSequence;

/// Default number of documents kept in the cache
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(capacity) => capacity,
    None => panic!("default capacity must be non-zero"),
};

/// Thread-safe LRU cache of rendered page sequences
#[derive(Clone)]
pub struct PageCache {
    inner: Arc<Mutex<CacheInner>>,
}

struct CacheInner {
    entries: LruCache<String, PageSequence>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PageCache {
    /// Create a cache with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY.get())
    }

    /// Create a cache holding at most `capacity` documents
    ///
    /// A capacity of zero falls back to [`DEFAULT_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);

        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            })),
        }
    }

    /// Look up a document's pages, marking it most recently used
    pub fn get(&self, key: &str) -> Option<PageSequence> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key).cloned() {
            Some(pages) => {
                inner.hits += 1;
                Some(pages)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or replace a document's pages as the most recently used entry
    ///
    /// Replacing an existing key only refreshes its position. Inserting a new
    /// key into a full cache evicts the least recently used entry.
    pub fn set(&self, key: impl Into<String>, pages: PageSequence) {
        let key = key.into();
        let mut inner = self.inner.lock();

        if let Some((old_key, _)) = inner.entries.push(key.clone(), pages) {
            if old_key != key {
                inner.evictions += 1;
                tracing::debug!(evicted = %old_key, inserted = %key, "Evicted page cache entry");
            }
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        tracing::debug!(dropped, "Cleared page cache");
    }

    /// Check for a key without touching its recency
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Keys ordered from least to most recently used
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner.entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().entries.cap().get()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            capacity: inner.entries.cap().get(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of cached documents
    pub entries: usize,
    /// Maximum number of cached documents
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::PageImage;

    fn pages(name: &str) -> PageSequence {
        PageSequence::new(vec![PageImage::Url(format!("{}-1", name))])
    }

    #[test]
    fn test_default_capacity() {
        let cache = PageCache::new();
        assert_eq!(cache.capacity(), 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_falls_back_to_default() {
        let cache = PageCache::with_capacity(0);
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY.get());
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let cache = PageCache::new();
        for i in 0..25 {
            cache.set(format!("doc-{}", i), pages("p"));
            assert!(cache.len() <= cache.capacity());
        }
    }

    #[test]
    fn test_eleven_inserts_keep_ten_most_recent() {
        let cache = PageCache::new();
        for i in 0..11 {
            cache.set(format!("doc-{}", i), pages("p"));
        }

        assert_eq!(cache.len(), 10);
        assert!(cache.get("doc-0").is_none());
        for i in 1..11 {
            assert!(cache.contains(&format!("doc-{}", i)));
        }
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = PageCache::new();
        for key in ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"] {
            cache.set(key, pages(key));
        }

        assert!(cache.get("A").is_some());
        cache.set("K", pages("K"));

        assert!(cache.get("A").is_some());
        assert!(cache.get("B").is_none());
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_reset_replaces_without_eviction() {
        let cache = PageCache::with_capacity(3);
        cache.set("A", pages("p1"));
        cache.set("B", pages("b"));
        cache.set("C", pages("c"));

        cache.set("A", pages("p2"));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("A"), Some(pages("p2")));
        assert_eq!(cache.stats().evictions, 0);
        // A moved to the most recent position
        assert_eq!(cache.keys(), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_capacity_two_scenario() {
        let cache = PageCache::with_capacity(2);
        cache.set("A", pages("a1"));
        cache.set("B", pages("b1"));
        cache.set("C", pages("c1"));

        assert!(cache.get("A").is_none());
        assert_eq!(cache.get("B"), Some(pages("b1")));
        assert_eq!(cache.get("C"), Some(pages("c1")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_contains_does_not_refresh() {
        let cache = PageCache::with_capacity(2);
        cache.set("A", pages("a"));
        cache.set("B", pages("b"));

        assert!(cache.contains("A"));
        cache.set("C", pages("c"));

        assert!(!cache.contains("A"));
    }

    #[test]
    fn test_clear() {
        let cache = PageCache::new();
        cache.set("A", pages("a"));
        cache.set("B", pages("b"));

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get("A").is_none());
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let cache = PageCache::with_capacity(1);
        cache.set("A", pages("a"));
        cache.get("A");
        cache.get("B");
        cache.set("B", pages("b"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 1);
    }
}
