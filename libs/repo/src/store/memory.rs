//! In-memory cache store with size-bounded LRU eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::CacheStore;
use crate::entry::CacheEntry;
use crate::key::UrlKey;

/// Configuration for the in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum total body size in bytes.
    pub max_size_bytes: u64,
    /// High water mark that triggers eviction (fraction of max).
    pub high_water_mark: f64,
    /// Low water mark target after eviction (fraction of max).
    pub low_water_mark: f64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 64 * 1024 * 1024, // 64 MiB
            high_water_mark: 0.9,
            low_water_mark: 0.7,
        }
    }
}

impl MemoryCacheConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_size_bytes = std::env::var("URLCACHE_MEMORY_MAX_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_size_bytes);

        Self {
            max_size_bytes,
            ..defaults
        }
    }

    fn high_threshold(&self) -> u64 {
        (self.max_size_bytes as f64 * self.high_water_mark) as u64
    }

    fn low_threshold(&self) -> u64 {
        (self.max_size_bytes as f64 * self.low_water_mark) as u64
    }
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    last_accessed: Instant,
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_size_bytes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    current_size_bytes: AtomicU64,
}

/// In-memory [`CacheStore`].
///
/// When a write pushes the total body size past the high water mark, the
/// least recently accessed entries are dropped until the size falls to the
/// low water mark. The entry being written is never evicted by its own
/// write.
pub struct MemoryCacheStore {
    config: MemoryCacheConfig,
    entries: RwLock<HashMap<UrlKey, Slot>>,
    counters: Counters,
}

impl MemoryCacheStore {
    /// Create a new store.
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Check for an entry without touching its access time or the stats.
    pub async fn contains(&self, key: &UrlKey) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Remove one entry. Returns true if it was present.
    pub async fn remove(&self, key: &UrlKey) -> bool {
        let mut entries = self.entries.write().await;
        match entries.remove(key) {
            Some(slot) => {
                self.counters
                    .current_size_bytes
                    .fetch_sub(slot.entry.size_bytes(), Ordering::Relaxed);
                debug!(url = %key, "Removed cache entry");
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.counters.current_size_bytes.store(0, Ordering::Relaxed);
    }

    /// Get current total body size.
    pub fn current_size(&self) -> u64 {
        self.counters.current_size_bytes.load(Ordering::Relaxed)
    }

    /// Check if eviction is needed.
    pub fn needs_eviction(&self) -> bool {
        self.current_size() > self.config.high_threshold()
    }

    /// Get store statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            current_size_bytes: self.current_size(),
        }
    }

    /// Evict least recently accessed entries (except `keep`) down to the
    /// low water mark. Caller holds the write lock.
    fn evict_locked(&self, entries: &mut HashMap<UrlKey, Slot>, keep: &UrlKey) -> u64 {
        let target = self.config.low_threshold();
        let mut freed = 0u64;

        let mut candidates: Vec<(UrlKey, Instant)> = entries
            .iter()
            .filter(|(key, _)| *key != keep)
            .map(|(key, slot)| (key.clone(), slot.last_accessed))
            .collect();

        // Oldest first
        candidates.sort_by_key(|(_, accessed)| *accessed);

        for (key, _) in candidates {
            if self.current_size() <= target {
                break;
            }

            if let Some(slot) = entries.remove(&key) {
                let size = slot.entry.size_bytes();
                self.counters
                    .current_size_bytes
                    .fetch_sub(size, Ordering::Relaxed);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                freed += size;

                debug!(url = %key, size = size, "Evicted cache entry");
            }
        }

        freed
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn lookup(&self, key: &UrlKey) -> Option<CacheEntry> {
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(slot) => {
                slot.last_accessed = Instant::now();
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(slot.entry.clone())
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn store(&self, key: UrlKey, entry: CacheEntry) {
        let mut entries = self.entries.write().await;
        let size = entry.size_bytes();

        let previous = entries.insert(
            key.clone(),
            Slot {
                entry,
                last_accessed: Instant::now(),
            },
        );
        if let Some(previous) = previous {
            self.counters
                .current_size_bytes
                .fetch_sub(previous.entry.size_bytes(), Ordering::Relaxed);
        }
        self.counters
            .current_size_bytes
            .fetch_add(size, Ordering::Relaxed);

        debug!(url = %key, size = size, "Stored cache entry");

        if self.needs_eviction() {
            let freed = self.evict_locked(&mut entries, &key);
            info!(
                freed_bytes = freed,
                current_bytes = self.current_size(),
                "Memory cache eviction completed"
            );
        }
    }
}
