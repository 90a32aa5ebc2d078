//! In-memory [`Fetcher`] for tests and offline demos.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tracing::trace;

use crate::{Fetcher, NetError, Request, Response};

/// Scripted fetcher: serves registered bodies, 404 for anything else, and can
/// be switched offline or told to fail individual URLs.
#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, (StatusCode, Bytes)>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    calls_by_url: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url`.
    pub fn with_route(self, url: &str, body: impl Into<Bytes>) -> Self {
        self.route(url, StatusCode::OK, body);
        self
    }

    pub fn route(&self, url: &str, status: StatusCode, body: impl Into<Bytes>) {
        lock(&self.routes).insert(url.to_string(), (status, body.into()));
    }

    /// Make requests for `url` fail with a network error.
    pub fn fail(&self, url: &str) {
        lock(&self.failing).insert(url.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total fetches attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetches attempted for one URL.
    pub fn calls_for(&self, url: &str) -> usize {
        lock(&self.calls_by_url).get(url).copied().unwrap_or(0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        let url = request.url.as_str().to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.calls_by_url).entry(url.clone()).or_insert(0) += 1;
        trace!(url = %url, "Mock fetch");

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::Offline);
        }
        if lock(&self.failing).contains(&url) {
            return Err(NetError::RequestFailed(format!("scripted failure for {url}")));
        }

        let (status, body) = lock(&self.routes)
            .get(&url)
            .cloned()
            .unwrap_or((StatusCode::NOT_FOUND, Bytes::new()));
        Ok(Response::new(request.url.clone(), status, HeaderMap::new(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_routes_and_counts() {
        let fetcher = MockFetcher::new().with_route("https://paint.local/index.html", "<html>");

        let hit = fetcher.fetch(&get("https://paint.local/index.html")).await.unwrap();
        assert!(hit.ok());
        let miss = fetcher.fetch(&get("https://paint.local/nope")).await.unwrap();
        assert_eq!(miss.status, StatusCode::NOT_FOUND);

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(fetcher.calls_for("https://paint.local/index.html"), 1);
    }

    #[tokio::test]
    async fn test_offline_and_scripted_failures() {
        let fetcher = MockFetcher::new().with_route("https://paint.local/a.js", "x");
        fetcher.fail("https://paint.local/a.js");
        assert!(matches!(
            fetcher.fetch(&get("https://paint.local/a.js")).await,
            Err(NetError::RequestFailed(_))
        ));

        fetcher.set_offline(true);
        assert!(matches!(
            fetcher.fetch(&get("https://paint.local/b.js")).await,
            Err(NetError::Offline)
        ));
    }
}
