//! SQLite-backed cache store.
//!
//! Entries survive process restarts. All statements run on the blocking
//! pool; the connection is shared behind a mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{CacheStore, StoreError};
use crate::entry::{CacheEntry, ResponseMetadata};
use crate::key::UrlKey;

/// SQLite [`CacheStore`].
///
/// Writes use `INSERT OR REPLACE`, so the last write for a key wins.
#[derive(Clone)]
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored entries.
    pub async fn len(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    /// Remove one entry. Returns true if it was present.
    pub async fn remove(&self, key: &UrlKey) -> Result<bool, StoreError> {
        let url = key.as_str().to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM cache_entries WHERE url = ?1", params![url])?;
            Ok(removed > 0)
        })
        .await
    }

    /// Drop every entry.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM cache_entries", [])?;
            Ok(())
        })
        .await
    }

    /// Read one entry, surfacing store errors.
    pub async fn get(&self, key: &UrlKey) -> Result<Option<CacheEntry>, StoreError> {
        let url = key.as_str().to_string();
        self.with_conn(move |conn| read_entry(conn, &url)).await
    }

    /// Write one entry, surfacing store errors.
    pub async fn put(&self, key: &UrlKey, entry: CacheEntry) -> Result<(), StoreError> {
        let url = key.as_str().to_string();
        self.with_conn(move |conn| write_entry(conn, &url, &entry))
            .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn lookup(&self, key: &UrlKey) -> Option<CacheEntry> {
        match self.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(url = %key, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, key: UrlKey, entry: CacheEntry) {
        let size = entry.size_bytes();
        match self.put(&key, entry).await {
            Ok(()) => debug!(url = %key, size = size, "Stored cache entry"),
            Err(e) => warn!(url = %key, error = %e, "Cache write failed, entry dropped"),
        }
    }
}

/// Initialize database schema.
fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            url TEXT PRIMARY KEY,
            status INTEGER NOT NULL,
            headers TEXT NOT NULL,
            body BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );
        "#,
    )?;

    debug!("Cache store schema initialized");
    Ok(())
}

fn read_entry(conn: &Connection, url: &str) -> Result<Option<CacheEntry>, StoreError> {
    let row = conn
        .query_row(
            "SELECT status, headers, body, created_at FROM cache_entries WHERE url = ?1",
            params![url],
            |row| {
                Ok((
                    row.get::<_, u16>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((status, headers, body, created_at_ms)) = row else {
        return Ok(None);
    };

    let metadata = ResponseMetadata {
        url: UrlKey::from(url),
        status,
        headers: serde_json::from_str(&headers)?,
    };
    let created_at: DateTime<Utc> =
        DateTime::from_timestamp_millis(created_at_ms).unwrap_or_default();

    Ok(Some(CacheEntry::with_created_at(
        metadata,
        Bytes::from(body),
        created_at,
    )))
}

fn write_entry(conn: &Connection, url: &str, entry: &CacheEntry) -> Result<(), StoreError> {
    let headers = serde_json::to_string(&entry.metadata().headers)?;

    conn.execute(
        r#"
        INSERT OR REPLACE INTO cache_entries (url, status, headers, body, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            url,
            entry.metadata().status,
            headers,
            entry.body().as_ref(),
            entry.created_at().timestamp_millis(),
        ],
    )?;

    Ok(())
}
