//! Immutable cache records.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::UrlKey;

/// Response metadata captured alongside a cached body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// URL the response was fetched from.
    pub url: UrlKey,

    /// HTTP status code.
    pub status: u16,

    /// Response headers in the order they were received.
    pub headers: Vec<(String, String)>,
}

impl ResponseMetadata {
    /// Returns the first header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the `Content-Type` header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// A cached response for one URL.
///
/// Entries are built once from a successful fetch and never mutated;
/// replacing an entry means storing a new one under the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    metadata: ResponseMetadata,
    body: Bytes,
    created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(metadata: ResponseMetadata, body: Bytes) -> Self {
        Self::with_created_at(metadata, body, Utc::now())
    }

    /// Creates an entry with an explicit creation time (used when loading
    /// persisted entries).
    pub fn with_created_at(
        metadata: ResponseMetadata,
        body: Bytes,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metadata,
            body,
            created_at,
        }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// Raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Body size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.body.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ResponseMetadata {
        ResponseMetadata {
            url: UrlKey::from("https://x/1.jpg"),
            status: 200,
            headers: vec![
                ("Content-Type".to_string(), "image/jpeg".to_string()),
                ("ETag".to_string(), "\"abc\"".to_string()),
            ],
        }
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let meta = metadata();
        assert_eq!(meta.content_type(), Some("image/jpeg"));
        assert_eq!(meta.header("etag"), Some("\"abc\""));
        assert_eq!(meta.header("cache-control"), None);
    }

    #[test]
    fn test_entry_reports_body_size() {
        let entry = CacheEntry::new(metadata(), Bytes::from_static(b"12345"));
        assert_eq!(entry.size_bytes(), 5);
        assert_eq!(entry.body().as_ref(), b"12345");
        assert_eq!(entry.metadata().status, 200);
    }
}
