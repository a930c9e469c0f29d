//! Scripted fetcher for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{FetchOutcome, Fetcher};
use crate::error::TransportError;
use crate::key::UrlKey;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Server answers with a status, headers and body.
    Reply {
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    },

    /// The transfer breaks, optionally after a status line.
    Broken { status: Option<u16>, message: String },
}

impl MockResponse {
    /// A 200 reply carrying `body`.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::status(200, body)
    }

    /// A reply with an arbitrary status.
    pub fn status(status: u16, body: impl Into<Bytes>) -> Self {
        Self::Reply {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A transfer failure.
    pub fn broken(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Broken {
            status,
            message: message.into(),
        }
    }

    /// Add a header to a reply. No effect on broken transfers.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Reply { headers, .. } = &mut self {
            headers.push((name.into(), value.into()));
        }
        self
    }

    fn into_outcome(self) -> FetchOutcome {
        match self {
            Self::Reply {
                status,
                headers,
                body,
            } => FetchOutcome::Success {
                status,
                headers,
                body,
            },
            Self::Broken { status, message } => FetchOutcome::TransportFailure {
                status,
                cause: TransportError::Connection(message),
            },
        }
    }
}

/// Mock [`Fetcher`] with per-URL scripted responses.
///
/// Each URL holds a queue of responses. Calls consume the queue front to
/// back and the last response repeats once the queue is down to one.
/// Unscripted URLs answer 404 with an empty body.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<UrlKey, VecDeque<MockResponse>>>,
    calls: Mutex<HashMap<UrlKey, u64>>,
    total_calls: AtomicU64,
    latency: Option<Duration>,
}

impl MockFetcher {
    /// Create a mock fetcher with no scripted routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Append a response to the queue for `url`.
    pub fn with_response(self, url: impl Into<UrlKey>, response: MockResponse) -> Self {
        self.push_response(url, response);
        self
    }

    /// Append a response to the queue for `url` on a shared fetcher.
    pub fn push_response(&self, url: impl Into<UrlKey>, response: MockResponse) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.into())
            .or_default()
            .push_back(response);
    }

    /// Number of fetches issued for `url`.
    pub fn calls_for(&self, url: &UrlKey) -> u64 {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Number of fetches issued in total.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &UrlKey) -> MockResponse {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);

        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }
}

fn not_found() -> MockResponse {
    MockResponse::status(404, Bytes::new())
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &UrlKey) -> FetchOutcome {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.clone())
            .or_default() += 1;

        let response = self.next_response(url);
        debug!(url = %url, response = ?response, "[MOCK] Fetch");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        response.into_outcome()
    }
}
