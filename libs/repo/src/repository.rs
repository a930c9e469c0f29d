//! Cache-first image repository.
//!
//! The repository decides between the cache and the network, populates the
//! cache after a successful download and decodes bodies into
//! [`ImageAsset`]s. Every operation is spawned onto the tokio runtime and
//! resolves exactly once through a [`PendingImage`].
//!
//! Operations are independent of each other and of the repository value:
//! a spawned task owns its own handles to the store and fetcher, so
//! dropping the repository or the [`PendingImage`] does not abort work that
//! is already in flight. Concurrent requests for the same URL are not
//! coalesced; each one fetches and stores on its own and the last write
//! wins.

use std::future::Future;
use std::ops::Range;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::decode::{decode, ImageAsset};
use crate::entry::{CacheEntry, ResponseMetadata};
use crate::error::{ImageError, TransportError};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::key::UrlKey;
use crate::store::CacheStore;

/// Status codes accepted as a successful download.
const SUCCESS_STATUS: Range<u16> = 200..300;

/// Status reported when no response was received at all.
const NO_RESPONSE_STATUS: u16 = 400;

/// Outcome of a repository operation. `Ok(None)` means the bytes were
/// obtained but did not decode.
pub type ImageResult = Result<Option<ImageAsset>, ImageError>;

/// The public contract: three one-shot image operations.
pub trait ImageSource: Send + Sync {
    /// Serve from the cache when an entry exists, else download.
    fn get_image(&self, url: &UrlKey) -> PendingImage;

    /// Fetch from the network and populate the cache on success.
    fn download(&self, url: &UrlKey) -> PendingImage;

    /// Decode the cached entry, failing with [`ImageError::CacheMiss`] if
    /// there is none.
    fn load_from_cache(&self, url: &UrlKey) -> PendingImage;
}

/// Handle to a spawned repository operation.
///
/// Resolves exactly once. Dropping the handle detaches the task; it still
/// runs to completion and its result is discarded. A panic inside the task
/// is resumed on the awaiting task.
#[must_use = "the result of an image operation is only observable by awaiting it"]
pub struct PendingImage {
    handle: JoinHandle<ImageResult>,
}

impl PendingImage {
    fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ImageResult> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    /// Returns true once the operation has produced its result.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for PendingImage {
    type Output = ImageResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ImageError::Interrupted)),
        }
    }
}

/// Cache-first image repository.
///
/// Cloning is cheap and clones share the same store and fetcher.
///
/// Operations spawn onto the current tokio runtime and panic if called
/// outside one.
#[derive(Clone)]
pub struct Repository {
    worker: Worker,
}

impl Repository {
    /// Create a repository over an explicit store and fetcher.
    pub fn new(store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            worker: Worker { store, fetcher },
        }
    }

    /// The store this repository reads from and writes to.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.worker.store
    }

    /// Serve `url` from the cache when an entry exists, else download it.
    ///
    /// The presence check and the subsequent cache read are not atomic: an
    /// entry evicted in between surfaces as [`ImageError::CacheMiss`].
    pub fn get_image(&self, url: impl Into<UrlKey>) -> PendingImage {
        let worker = self.worker.clone();
        let url = url.into();
        PendingImage::spawn(async move { worker.get_image(url).await })
    }

    /// Fetch `url` from the network. On a 2xx response with a non-empty
    /// body the entry is stored before the result is delivered.
    pub fn download(&self, url: impl Into<UrlKey>) -> PendingImage {
        let worker = self.worker.clone();
        let url = url.into();
        PendingImage::spawn(async move { worker.download(url).await })
    }

    /// Decode the cached entry for `url`.
    pub fn load_from_cache(&self, url: impl Into<UrlKey>) -> PendingImage {
        let worker = self.worker.clone();
        let url = url.into();
        PendingImage::spawn(async move { worker.load_from_cache(url).await })
    }
}

impl ImageSource for Repository {
    fn get_image(&self, url: &UrlKey) -> PendingImage {
        Repository::get_image(self, url)
    }

    fn download(&self, url: &UrlKey) -> PendingImage {
        Repository::download(self, url)
    }

    fn load_from_cache(&self, url: &UrlKey) -> PendingImage {
        Repository::load_from_cache(self, url)
    }
}

/// State owned by each spawned operation.
#[derive(Clone)]
struct Worker {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl Worker {
    async fn get_image(&self, url: UrlKey) -> ImageResult {
        if self.store.lookup(&url).await.is_some() {
            self.load_from_cache(url).await
        } else {
            self.download(url).await
        }
    }

    async fn download(&self, url: UrlKey) -> ImageResult {
        info!(url = %url, "Downloading image");
        let start = Instant::now();

        let outcome = self.fetcher.fetch(&url).await;
        let (status, headers, body) = match accept(outcome) {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!(url = %url, error = %e, "Download failed");
                return Err(e);
            }
        };

        let size = body.len();
        let entry = CacheEntry::new(
            ResponseMetadata {
                url: url.clone(),
                status,
                headers,
            },
            body.clone(),
        );
        self.store.store(url.clone(), entry).await;

        info!(
            url = %url,
            status = status,
            size_bytes = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "Image downloaded and cached"
        );

        Ok(decode(&body))
    }

    async fn load_from_cache(&self, url: UrlKey) -> ImageResult {
        debug!(url = %url, "Loading image from cache");

        match self.store.lookup(&url).await {
            Some(entry) => Ok(decode(entry.body())),
            None => {
                debug!(url = %url, "Cache miss");
                Err(ImageError::CacheMiss)
            }
        }
    }
}

/// Split a fetch outcome into the parts worth caching, or the error to
/// report. Status is checked before the transfer itself.
fn accept(outcome: FetchOutcome) -> Result<(u16, Vec<(String, String)>, Bytes), ImageError> {
    match outcome.status() {
        Some(code) if SUCCESS_STATUS.contains(&code) => {}
        other => {
            return Err(ImageError::BadStatusCode {
                code: other.unwrap_or(NO_RESPONSE_STATUS),
            })
        }
    }

    match outcome {
        FetchOutcome::Success { body, .. } if body.is_empty() => {
            Err(TransportError::EmptyBody.into())
        }
        FetchOutcome::Success {
            status,
            headers,
            body,
        } => Ok((status, headers, body)),
        FetchOutcome::TransportFailure { cause, .. } => Err(cause.into()),
    }
}
