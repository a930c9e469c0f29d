//! Cache-first image repository.
//!
//! Images are identified by URL. A request is served from the local cache
//! when an entry exists and from the network otherwise; a successful
//! download populates the cache before the caller sees the result.
//!
//! ## Architecture
//!
//! ```text
//! Repository
//! ├── CacheStore   (lookup / store, pluggable: memory, sqlite)
//! ├── Fetcher      (network request, pluggable: http, mock)
//! └── decode       (bytes -> Option<ImageAsset>)
//! ```
//!
//! Every repository operation runs on its own tokio task and resolves
//! exactly once through a [`PendingImage`] handle.
//!
//! ## Modules
//!
//! - `key`: cache key type
//! - `entry`: immutable cache records
//! - `store`: cache store contract and implementations
//! - `fetch`: fetcher contract, HTTP and mock implementations
//! - `decode`: image decoding
//! - `repository`: orchestration and the public contract

pub mod decode;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod key;
pub mod repository;
pub mod store;

// Re-export commonly used types
pub use decode::{decode, ImageAsset};
pub use entry::{CacheEntry, ResponseMetadata};
pub use error::{ImageError, TransportError};
pub use fetch::{
    FetchOutcome, Fetcher, HttpFetcher, HttpFetcherConfig, MockFetcher, MockResponse,
};
pub use key::UrlKey;
pub use repository::{ImageResult, ImageSource, PendingImage, Repository};
pub use store::{
    CacheStats, CacheStore, MemoryCacheConfig, MemoryCacheStore, SqliteCacheStore, StoreError,
};
