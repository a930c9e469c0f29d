//! Integration tests for the cache-first repository.
//!
//! These drive `Repository` through scripted fetchers and real stores and
//! check what ends up in the cache after each outcome.


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rstest::rstest;

use harness::{memory_repository, png_bytes, wait_for_entry, VanishingStore};
use urlcache_repo::{
    decode, CacheEntry, CacheStore, FetchOutcome, Fetcher, ImageError, ImageSource,
    MemoryCacheStore, MockFetcher, MockResponse, Repository, ResponseMetadata, SqliteCacheStore,
    TransportError, UrlKey,
};

struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch(&self, _url: &UrlKey) -> FetchOutcome {
        panic!("fetcher exploded")
    }
}

fn cached(url: &UrlKey, body: Vec<u8>) -> CacheEntry {
    CacheEntry::new(
        ResponseMetadata {
            url: url.clone(),
            status: 200,
            headers: Vec::new(),
        },
        Bytes::from(body),
    )
}

#[tokio::test]
async fn test_uncached_download_then_cache_hit() {
    let url = UrlKey::from("https://x/1.jpg");
    let body = png_bytes(4, 3, 120);
    let (repo, store, fetcher) =
        memory_repository(MockFetcher::new().with_response(&url, MockResponse::ok(body.clone())));

    let first = repo.get_image(&url).await.unwrap();
    assert_eq!(first, decode(&body));
    assert_eq!(first.as_ref().map(|a| (a.width(), a.height())), Some((4, 3)));

    let from_cache = repo.load_from_cache(&url).await.unwrap();
    assert_eq!(from_cache, first);

    // Served from the cache, no second fetch
    let second = repo.get_image(&url).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(fetcher.calls_for(&url), 1);

    let entry = store.lookup(&url).await.expect("entry stored");
    assert_eq!(entry.body().as_ref(), body.as_slice());
}

#[tokio::test]
async fn test_not_found_leaves_cache_untouched() {
    let url = UrlKey::from("https://x/2.jpg");
    let (repo, store, fetcher) = memory_repository(
        MockFetcher::new().with_response(&url, MockResponse::status(404, "missing")),
    );

    let err = repo.get_image(&url).await.unwrap_err();

    assert!(matches!(err, ImageError::BadStatusCode { code: 404 }));
    assert!(!store.contains(&url).await);
    assert_eq!(fetcher.calls_for(&url), 1);
}

#[tokio::test]
async fn test_concurrent_requests_for_same_url() {
    let url = UrlKey::from("https://x/3.jpg");
    let body_a = png_bytes(2, 2, 10);
    let body_b = png_bytes(2, 2, 200);
    let (repo, store, fetcher) = memory_repository(
        MockFetcher::new()
            .with_latency(Duration::from_millis(50))
            .with_response(&url, MockResponse::ok(body_a.clone()))
            .with_response(&url, MockResponse::ok(body_b.clone())),
    );

    let (a, b) = tokio::join!(repo.get_image(&url), repo.get_image(&url));

    let a = a.unwrap().expect("decodes");
    let b = b.unwrap().expect("decodes");
    let expected = [decode(&body_a).unwrap(), decode(&body_b).unwrap()];
    assert!(expected.contains(&a));
    assert!(expected.contains(&b));

    // No coalescing: both requests went to the network
    assert_eq!(fetcher.calls_for(&url), 2);

    assert_eq!(store.len().await, 1);
    let stored = store.lookup(&url).await.unwrap();
    assert!(
        stored.body().as_ref() == body_a.as_slice() || stored.body().as_ref() == body_b.as_slice()
    );
}

#[tokio::test]
async fn test_undecodable_cached_body_is_success_without_asset() {
    let url = UrlKey::from("https://x/4.jpg");
    let (repo, store, fetcher) = memory_repository(MockFetcher::new());
    store
        .store(url.clone(), cached(&url, b"not an image".to_vec()))
        .await;

    let result = repo.get_image(&url).await;

    assert!(matches!(result, Ok(None)));
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn test_load_from_cache_miss() {
    let url = UrlKey::from("https://x/never-stored.jpg");
    let (repo, _store, fetcher) = memory_repository(MockFetcher::new());

    let err = repo.load_from_cache(&url).await.unwrap_err();

    assert!(err.is_cache_miss());
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn test_entry_evicted_between_check_and_read() {
    let url = UrlKey::from("https://x/race.jpg");
    let store = Arc::new(VanishingStore::new(1));
    store.store(url.clone(), cached(&url, png_bytes(1, 1, 0))).await;
    let fetcher = Arc::new(MockFetcher::new());
    let repo = Repository::new(store, fetcher.clone());

    let err = repo.get_image(&url).await.unwrap_err();

    assert!(matches!(err, ImageError::CacheMiss));
    assert_eq!(fetcher.total_calls(), 0);
}

#[rstest]
#[case(200)]
#[case(201)]
#[case(203)]
#[case(299)]
#[tokio::test]
async fn test_success_status_stores_fetched_body(#[case] status: u16) {
    let url = UrlKey::from(format!("https://x/{status}.bin"));
    let body = b"opaque bytes".to_vec();
    let (repo, store, _fetcher) = memory_repository(MockFetcher::new().with_response(
        &url,
        MockResponse::status(status, body.clone()).with_header("Content-Type", "image/jpeg"),
    ));

    // Not an image: success without an asset
    let result = repo.download(&url).await.unwrap();
    assert!(result.is_none());

    let entry = store.lookup(&url).await.expect("entry stored");
    assert_eq!(entry.body().as_ref(), body.as_slice());
    assert_eq!(entry.metadata().status, status);
    assert_eq!(entry.metadata().content_type(), Some("image/jpeg"));
}

#[rstest]
#[case(199)]
#[case(301)]
#[case(304)]
#[case(403)]
#[case(500)]
#[case(503)]
#[tokio::test]
async fn test_error_status_never_stores(#[case] status: u16) {
    let url = UrlKey::from("https://x/error.png");
    let (repo, store, _fetcher) = memory_repository(
        MockFetcher::new().with_response(&url, MockResponse::status(status, png_bytes(1, 1, 1))),
    );

    let err = repo.get_image(&url).await.unwrap_err();

    assert_eq!(err.status_code(), Some(status));
    assert!(!store.contains(&url).await);
}

#[tokio::test]
async fn test_no_response_is_bad_status_400() {
    let url = UrlKey::from("https://x/offline.png");
    let (repo, store, _fetcher) = memory_repository(
        MockFetcher::new().with_response(&url, MockResponse::broken(None, "connection refused")),
    );

    let err = repo.download(&url).await.unwrap_err();

    assert!(matches!(err, ImageError::BadStatusCode { code: 400 }));
    assert!(!store.contains(&url).await);
}

#[tokio::test]
async fn test_broken_body_is_transport_failure() {
    let url = UrlKey::from("https://x/broken.png");
    let (repo, store, _fetcher) = memory_repository(
        MockFetcher::new().with_response(&url, MockResponse::broken(Some(200), "reset by peer")),
    );

    let err = repo.download(&url).await.unwrap_err();

    assert!(matches!(
        err,
        ImageError::TransportFailure {
            cause: TransportError::Connection(_)
        }
    ));
    assert!(!store.contains(&url).await);
}

#[tokio::test]
async fn test_empty_body_is_transport_failure() {
    let url = UrlKey::from("https://x/empty.png");
    let (repo, store, _fetcher) =
        memory_repository(MockFetcher::new().with_response(&url, MockResponse::ok(Bytes::new())));

    let err = repo.download(&url).await.unwrap_err();

    assert!(matches!(
        err,
        ImageError::TransportFailure {
            cause: TransportError::EmptyBody
        }
    ));
    assert!(!store.contains(&url).await);
}

#[tokio::test]
async fn test_download_bypasses_existing_entry() {
    let url = UrlKey::from("https://x/refresh.png");
    let fresh = png_bytes(5, 5, 90);
    let (repo, store, fetcher) =
        memory_repository(MockFetcher::new().with_response(&url, MockResponse::ok(fresh.clone())));
    store.store(url.clone(), cached(&url, png_bytes(1, 1, 1))).await;

    let asset = repo.download(&url).await.unwrap().expect("decodes");

    assert_eq!(asset.width(), 5);
    assert_eq!(fetcher.calls_for(&url), 1);
    assert_eq!(store.lookup(&url).await.unwrap().body().as_ref(), fresh.as_slice());
}

#[tokio::test]
async fn test_in_flight_download_survives_dropped_repository() {
    let url = UrlKey::from("https://x/detached.png");
    let body = png_bytes(2, 2, 33);
    let (repo, store, _fetcher) = memory_repository(
        MockFetcher::new()
            .with_latency(Duration::from_millis(30))
            .with_response(&url, MockResponse::ok(body.clone())),
    );

    let pending = repo.download(&url);
    drop(repo);
    drop(pending);

    assert!(wait_for_entry(&store, &url, Duration::from_secs(2)).await);
    assert_eq!(store.lookup(&url).await.unwrap().body().as_ref(), body.as_slice());
}

#[tokio::test]
async fn test_pending_result_outlives_repository() {
    let url = UrlKey::from("https://x/owned.png");
    let (repo, _store, _fetcher) = memory_repository(
        MockFetcher::new()
            .with_latency(Duration::from_millis(10))
            .with_response(&url, MockResponse::ok(png_bytes(3, 1, 7))),
    );

    let pending = repo.get_image(&url);
    // Nothing has run yet on the current-thread runtime
    assert!(!pending.is_finished());
    drop(repo);

    let asset = pending.await.unwrap().expect("decodes");
    assert_eq!((asset.width(), asset.height()), (3, 1));
}

#[tokio::test]
async fn test_image_source_trait_object() {
    let url = UrlKey::from("https://x/dyn.png");
    let (repo, _store, _fetcher) = memory_repository(
        MockFetcher::new().with_response(&url, MockResponse::ok(png_bytes(1, 2, 3))),
    );
    let store = Arc::clone(repo.store());
    let source: Arc<dyn ImageSource> = Arc::new(repo);

    assert!(source.load_from_cache(&url).await.unwrap_err().is_cache_miss());
    assert!(source.get_image(&url).await.unwrap().is_some());
    assert!(source.load_from_cache(&url).await.unwrap().is_some());
    assert!(store.lookup(&url).await.is_some());
}

#[tokio::test]
async fn test_sqlite_backed_repository() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("cache.db");
    let url = UrlKey::from("https://x/persisted.png");
    let body = png_bytes(6, 4, 50);

    {
        let store = Arc::new(SqliteCacheStore::open(&db).unwrap());
        let fetcher = Arc::new(
            MockFetcher::new().with_response(&url, MockResponse::ok(body.clone())),
        );
        let repo = Repository::new(store, fetcher.clone());
        repo.get_image(&url).await.unwrap();
        assert_eq!(fetcher.calls_for(&url), 1);
    }

    // A new process over the same database serves from disk
    let store = Arc::new(SqliteCacheStore::open(&db).unwrap());
    let fetcher = Arc::new(MockFetcher::new());
    let repo = Repository::new(store, fetcher.clone());

    let asset = repo.get_image(&url).await.unwrap().expect("decodes");
    assert_eq!((asset.width(), asset.height()), (6, 4));
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn test_each_uncached_url_fetches_once() {
    let urls: Vec<UrlKey> = (0..8)
        .map(|i| UrlKey::from(format!("https://x/avatar/{i}.png")))
        .collect();
    let fetcher = urls.iter().fold(MockFetcher::new(), |f, url| {
        f.with_response(url, MockResponse::ok(png_bytes(1, 1, 9)))
    });
    let store = Arc::new(MemoryCacheStore::default());
    let fetcher = Arc::new(fetcher);
    let repo = Repository::new(store.clone(), fetcher.clone());

    let results = futures_util::future::join_all(urls.iter().map(|u| repo.get_image(u))).await;

    assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));
    for url in &urls {
        assert_eq!(fetcher.calls_for(url), 1);
        assert!(store.contains(url).await);
    }
}

#[test]
fn test_runtime_shutdown_interrupts_pending_download() {
    let url = UrlKey::from("https://x/shutdown.png");
    let (repo, store, _fetcher) = memory_repository(
        MockFetcher::new()
            .with_latency(Duration::from_secs(5))
            .with_response(&url, MockResponse::ok(png_bytes(1, 1, 1))),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let pending = runtime.block_on(async { repo.download(&url) });
    drop(runtime);

    let fallback = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let result = fallback.block_on(pending);

    assert!(matches!(result, Err(ImageError::Interrupted)));
    assert!(!fallback.block_on(store.contains(&url)));
}

#[tokio::test]
async fn test_worker_panic_resumes_on_awaiting_task() {
    let url = UrlKey::from("https://x/panic.png");
    let store = Arc::new(MemoryCacheStore::default());
    let repo = Repository::new(store.clone(), Arc::new(PanickingFetcher));

    let pending = repo.download(&url);
    let err = tokio::spawn(pending).await.unwrap_err();

    assert!(err.is_panic());
    let payload = err.into_panic();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"fetcher exploded"));
    assert!(!store.contains(&url).await);
}
