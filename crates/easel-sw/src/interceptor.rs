//! Cache-first resource interception.

use std::sync::Arc;

use easel_net::{Fetcher, NetError, Request, Response};
use tracing::{debug, trace, warn};

use crate::cache::{CacheEntry, CacheHandle, CacheStorage};

/// Where an intercepted response came from.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Served from the current cache version; the network was not touched.
    Cache(Response),
    /// Fetched from the network on a cache miss.
    Network(Response),
    /// The network fetch failed. The caller sees an empty load.
    Failed(NetError),
}

impl FetchOutcome {
    /// The response handed to the page, if any.
    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchOutcome::Cache(response) | FetchOutcome::Network(response) => Some(response),
            FetchOutcome::Failed(_) => None,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, FetchOutcome::Cache(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Serves requests from the current cache version, falling back to the network.
///
/// Hits are returned without revalidation. Misses are fetched, a copy is
/// stored under the current version, and the original goes to the caller.
pub struct CacheFirst {
    storage: Arc<CacheStorage>,
    current: CacheHandle,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheFirst {
    pub fn new(storage: Arc<CacheStorage>, current: CacheHandle, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            storage,
            current,
            fetcher,
        }
    }

    pub async fn intercept(&self, request: &Request) -> FetchOutcome {
        let key = request.key();

        if let Some(entry) = self.storage.lookup(&self.current, &key).await {
            debug!(url = %request.url, "Cache hit");
            return FetchOutcome::Cache(entry.to_response());
        }

        trace!(url = %request.url, "Cache miss");
        let response = match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network request failed");
                return FetchOutcome::Failed(e);
            }
        };

        let snapshot = CacheEntry::snapshot(key, &response);
        match self.storage.put(&self.current, snapshot).await {
            Ok(()) => debug!(url = %request.url, "Added to cache"),
            Err(e) => warn!(url = %request.url, error = %e, "Cache put error"),
        }

        FetchOutcome::Network(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_core::{CacheVersion, ResourceKey};
    use easel_net::MockFetcher;
    use url::Url;

    const INDEX: &str = "https://paint.local/index.html";

    async fn setup(fetcher: Arc<MockFetcher>) -> (Arc<CacheStorage>, CacheFirst) {
        let storage = Arc::new(CacheStorage::new());
        let handle = storage.open(&CacheVersion::new("v1")).await.unwrap();
        let interceptor = CacheFirst::new(storage.clone(), handle, fetcher);
        (storage, interceptor)
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let fetcher = Arc::new(MockFetcher::new().with_route(INDEX, "<html>"));
        let (storage, interceptor) = setup(fetcher.clone()).await;

        let outcome = interceptor.intercept(&get(INDEX)).await;
        assert!(matches!(outcome, FetchOutcome::Network(_)));
        assert_eq!(outcome.into_response().unwrap().text().unwrap(), "<html>");

        let handle = storage.open(&CacheVersion::new("v1")).await.unwrap();
        let key = ResourceKey::get(&Url::parse(INDEX).unwrap());
        assert!(storage.lookup(&handle, &key).await.is_some());
    }

    #[tokio::test]
    async fn test_hit_skips_network() {
        let fetcher = Arc::new(MockFetcher::new().with_route(INDEX, "<html>"));
        let (_storage, interceptor) = setup(fetcher.clone()).await;

        interceptor.intercept(&get(INDEX)).await;
        let second = interceptor.intercept(&get(INDEX)).await;

        assert!(second.is_cache_hit());
        assert_eq!(fetcher.calls_for(INDEX), 1);
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_and_not_cached() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_offline(true);
        let (storage, interceptor) = setup(fetcher.clone()).await;

        let outcome = interceptor.intercept(&get(INDEX)).await;
        assert!(outcome.is_failed());
        assert!(outcome.into_response().is_none());

        let handle = storage.open(&CacheVersion::new("v1")).await.unwrap();
        assert!(storage.keys(&handle).await.is_empty());
    }

    #[tokio::test]
    async fn test_put_failure_still_returns_response() {
        let fetcher = Arc::new(MockFetcher::new().with_route(INDEX, "a body larger than quota"));
        let storage = Arc::new(CacheStorage::with_quota(4));
        let handle = storage.open(&CacheVersion::new("v1")).await.unwrap();
        let interceptor = CacheFirst::new(storage.clone(), handle.clone(), fetcher);

        let outcome = interceptor.intercept(&get(INDEX)).await;

        assert!(matches!(outcome, FetchOutcome::Network(_)));
        assert!(storage.keys(&handle).await.is_empty());
    }
}
