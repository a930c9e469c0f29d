//! One fetch session: a concurrent round per URL, then a cached round.

use futures_util::future::join_all;
use tracing::{error, info, warn};

use urlcache_repo::{ImageResult, PendingImage, Repository, UrlKey};

/// Outcome counts for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub undecodable: usize,
    pub failed: usize,
}

impl Summary {
    fn record(&mut self, url: &UrlKey, result: &ImageResult) {
        match result {
            Ok(Some(asset)) => {
                self.succeeded += 1;
                info!(
                    url = %url,
                    width = asset.width(),
                    height = asset.height(),
                    "Got image"
                );
            }
            Ok(None) => {
                self.undecodable += 1;
                warn!(url = %url, "Response is not a decodable image");
            }
            Err(e) => {
                self.failed += 1;
                error!(url = %url, error = %e, "Image error");
            }
        }
    }
}

/// Issue `repeat` concurrent requests for every URL, wait for all of them,
/// then request every URL once more.
pub async fn run(repository: &Repository, urls: &[UrlKey], repeat: usize) -> Summary {
    let mut summary = Summary::default();

    let (keys, pending): (Vec<UrlKey>, Vec<PendingImage>) = urls
        .iter()
        .flat_map(|url| std::iter::repeat(url).take(repeat))
        .map(|url| (url.clone(), repository.get_image(url)))
        .unzip();
    for (url, result) in keys.iter().zip(join_all(pending).await) {
        summary.record(url, &result);
    }

    info!(count = urls.len(), "Requesting every URL again");
    for url in urls {
        let result = repository.get_image(url).await;
        summary.record(url, &result);
    }

    summary
}
