//! Command-line arguments and repository wiring.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use urlcache_repo::{
    CacheStore, HttpFetcher, HttpFetcherConfig, MemoryCacheConfig, MemoryCacheStore, Repository,
    SqliteCacheStore, UrlKey,
};

/// Cache backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
    /// Process-local, size-bounded.
    Memory,
    /// SQLite database on disk.
    Sqlite,
}

/// Fetch images by URL, preferring the local cache.
#[derive(Debug, Parser)]
#[command(name = "urlcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Image URLs to fetch.
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Cache backend.
    #[arg(long, value_enum, default_value_t = CacheBackend::Memory, env = "URLCACHE_CACHE")]
    pub cache: CacheBackend,

    /// Database path for the sqlite backend.
    #[arg(long, default_value = "urlcache.db", env = "URLCACHE_DB")]
    pub db: PathBuf,

    /// Concurrent requests per URL in the first round.
    #[arg(long, default_value_t = 2, env = "URLCACHE_REPEAT")]
    pub repeat: usize,

    /// Total HTTP request timeout in seconds.
    #[arg(long, env = "URLCACHE_HTTP_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// User-Agent header for HTTP requests.
    #[arg(long, env = "URLCACHE_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Size bound for the memory backend, in bytes.
    #[arg(long, env = "URLCACHE_MEMORY_MAX_BYTES")]
    pub max_memory_bytes: Option<u64>,
}

impl Cli {
    /// URLs as cache keys, in argument order.
    pub fn urls(&self) -> Vec<UrlKey> {
        self.urls.iter().map(|u| UrlKey::from(u.as_str())).collect()
    }

    /// HTTP fetcher configuration: environment defaults, then flags.
    pub fn fetcher_config(&self) -> HttpFetcherConfig {
        let mut config = HttpFetcherConfig::from_env();
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }

    /// Memory store configuration: environment defaults, then flags.
    pub fn memory_config(&self) -> MemoryCacheConfig {
        let mut config = MemoryCacheConfig::from_env();
        if let Some(max) = self.max_memory_bytes {
            config.max_size_bytes = max;
        }
        config
    }

    /// Open the selected store.
    pub fn build_store(&self) -> Result<Arc<dyn CacheStore>> {
        let store: Arc<dyn CacheStore> = match self.cache {
            CacheBackend::Memory => {
                let config = self.memory_config();
                info!(max_size_bytes = config.max_size_bytes, "Using memory cache");
                Arc::new(MemoryCacheStore::new(config))
            }
            CacheBackend::Sqlite => {
                info!(path = %self.db.display(), "Using sqlite cache");
                Arc::new(
                    SqliteCacheStore::open(&self.db)
                        .with_context(|| format!("Failed to open cache at {:?}", self.db))?,
                )
            }
        };
        Ok(store)
    }

    /// Build the repository over the selected store and an HTTP fetcher.
    pub fn build_repository(&self) -> Result<Repository> {
        let store = self.build_store()?;
        let fetcher =
            HttpFetcher::new(self.fetcher_config()).context("Failed to build HTTP client")?;
        Ok(Repository::new(store, Arc::new(fetcher)))
    }
}
