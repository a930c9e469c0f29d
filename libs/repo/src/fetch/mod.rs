//! Fetcher contract and implementations.
//!
//! A fetcher runs one network request to completion and reports what
//! happened as a [`FetchOutcome`]. It never retries and cannot be
//! cancelled once issued.

mod http;
mod mock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::key::UrlKey;

pub use http::{HttpFetcher, HttpFetcherConfig};
pub use mock::{MockFetcher, MockResponse};

/// Result of one network attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The server answered and the full body was received. The status may
    /// still be outside the success range.
    Success {
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    },

    /// The transfer failed. `status` is set when a status line arrived
    /// before the failure.
    TransportFailure {
        status: Option<u16>,
        cause: TransportError,
    },
}

impl FetchOutcome {
    /// Status code observed on the wire, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } => Some(*status),
            Self::TransportFailure { status, .. } => *status,
        }
    }
}

/// Performs network requests for the repository.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the resource at `url`.
    async fn fetch(&self, url: &UrlKey) -> FetchOutcome;
}
