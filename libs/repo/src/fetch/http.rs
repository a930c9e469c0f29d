//! HTTP fetcher backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{FetchOutcome, Fetcher};
use crate::error::TransportError;
use crate::key::UrlKey;

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Total request timeout.
    pub timeout: Duration,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("urlcache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpFetcherConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout = std::env::var("URLCACHE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let connect_timeout = std::env::var("URLCACHE_HTTP_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        let user_agent = std::env::var("URLCACHE_USER_AGENT").unwrap_or(defaults.user_agent);

        Self {
            timeout,
            connect_timeout,
            user_agent,
        }
    }
}

/// [`Fetcher`] issuing plain GET requests.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher.
    pub fn new(config: HttpFetcherConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &UrlKey) -> FetchOutcome {
        debug!(url = %url, "Sending GET request");

        let response = match self.client.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                return FetchOutcome::TransportFailure {
                    status: None,
                    cause: e.into(),
                }
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        match response.bytes().await {
            Ok(body) => {
                debug!(url = %url, status = status, size = body.len(), "Response received");
                FetchOutcome::Success {
                    status,
                    headers,
                    body,
                }
            }
            Err(e) => FetchOutcome::TransportFailure {
                status: Some(status),
                cause: e.into(),
            },
        }
    }
}
