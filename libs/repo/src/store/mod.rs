//! Cache store contract and implementations.
//!
//! The repository only ever calls [`CacheStore::lookup`] and
//! [`CacheStore::store`]. Retention, eviction and persistence are the
//! store's own business and invisible to the caller.

mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::entry::CacheEntry;
use crate::key::UrlKey;

pub use memory::{CacheStats, MemoryCacheConfig, MemoryCacheStore};
pub use sqlite::SqliteCacheStore;

/// Errors from setting up or managing a store.
///
/// These never cross the [`CacheStore`] contract: a failing lookup reads
/// as a miss and a failing write is dropped.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Key to entry storage shared by concurrent workers.
///
/// Implementations must be safe to call from many tasks at once; the
/// repository adds no locking of its own.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the entry stored under `key`, if any.
    async fn lookup(&self, key: &UrlKey) -> Option<CacheEntry>;

    /// Stores `entry` under `key`, replacing any previous entry.
    async fn store(&self, key: UrlKey, entry: CacheEntry);
}
