//! Versioned cache storage.
//!
//! Each [`CacheVersion`] owns an independent set of entries. Installing a new
//! release populates a fresh version; activation deletes every other one.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use easel_core::{CacheVersion, ResourceKey};
use easel_net::{Fetcher, Request, Response};
use futures::future::join_all;
use hashbrown::HashMap;
use http::{HeaderMap, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::ServiceWorkerError;

/// Immutable snapshot of a response taken at store time.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request key.
    pub key: ResourceKey,

    /// Final response URL.
    pub url: Url,

    /// Response status.
    pub status: StatusCode,

    /// Response headers.
    pub headers: HeaderMap,

    /// Response body.
    body: Bytes,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Copy a response into a new entry. The response stays readable.
    pub fn snapshot(key: ResourceKey, response: &Response) -> Self {
        let copy = response.duplicate();
        Self {
            key,
            url: copy.url.clone(),
            status: copy.status,
            headers: copy.headers.clone(),
            body: copy.bytes(),
            cached_at: now_millis(),
        }
    }

    /// Size counted against the storage quota.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// A fresh, independently readable response.
    pub fn to_response(&self) -> Response {
        Response::new(
            self.url.clone(),
            self.status,
            self.headers.clone(),
            self.body.clone(),
        )
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Entries belonging to one version.
#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<ResourceKey, CacheEntry>,
}

impl Cache {
    fn size(&self) -> u64 {
        self.entries.values().map(CacheEntry::size).sum()
    }
}

/// Handle returned by [`CacheStorage::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHandle {
    version: CacheVersion,
}

impl CacheHandle {
    pub fn version(&self) -> &CacheVersion {
        &self.version
    }
}

/// All cache versions known to the worker.
///
/// Mutations are serialized by an internal lock; lookups may run concurrently.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: RwLock<HashMap<CacheVersion, Cache>>,
    quota_bytes: Option<u64>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage limited to `quota_bytes` of cached bodies across all versions.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            caches: RwLock::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Open a version, creating it if absent.
    pub async fn open(&self, version: &CacheVersion) -> Result<CacheHandle, ServiceWorkerError> {
        let mut caches = self.caches.write().await;
        if !caches.contains_key(version) {
            debug!(version = %version, "Creating cache version");
            caches.insert(version.clone(), Cache::default());
        }
        Ok(CacheHandle {
            version: version.clone(),
        })
    }

    /// Fetch every URL and store the responses, or store nothing.
    ///
    /// Fails with [`ServiceWorkerError::Populate`] if any fetch errors or
    /// returns a non-2xx status.
    pub async fn populate(
        &self,
        handle: &CacheHandle,
        fetcher: &dyn Fetcher,
        urls: &[Url],
    ) -> Result<(), ServiceWorkerError> {
        let requests: Vec<Request> = urls.iter().cloned().map(Request::get).collect();
        let results = join_all(requests.iter().map(|r| fetcher.fetch(r))).await;

        let mut fetched = Vec::with_capacity(requests.len());
        for (request, result) in requests.iter().zip(results) {
            let response = result.map_err(|e| ServiceWorkerError::Populate {
                url: request.url.to_string(),
                reason: e.to_string(),
            })?;
            if !response.ok() {
                return Err(ServiceWorkerError::Populate {
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            fetched.push(CacheEntry::snapshot(request.key(), &response));
        }

        let mut caches = self.caches.write().await;
        let replaced: u64 = caches
            .get(&handle.version)
            .map(|cache| {
                fetched
                    .iter()
                    .filter_map(|e| cache.entries.get(&e.key).map(CacheEntry::size))
                    .sum()
            })
            .unwrap_or(0);
        let added: u64 = fetched.iter().map(CacheEntry::size).sum();
        self.check_quota(&caches, added, replaced)?;

        let cache = caches.entry(handle.version.clone()).or_default();
        for entry in fetched {
            cache.entries.insert(entry.key.clone(), entry);
        }
        info!(version = %handle.version, count = urls.len(), "Cache populated");
        Ok(())
    }

    /// Find the entry for `key` in one version.
    pub async fn lookup(&self, handle: &CacheHandle, key: &ResourceKey) -> Option<CacheEntry> {
        self.caches
            .read()
            .await
            .get(&handle.version)
            .and_then(|cache| cache.entries.get(key))
            .cloned()
    }

    /// Insert or overwrite an entry. A deleted version is recreated.
    pub async fn put(&self, handle: &CacheHandle, entry: CacheEntry) -> Result<(), ServiceWorkerError> {
        if entry.status == StatusCode::PARTIAL_CONTENT {
            return Err(ServiceWorkerError::CachePut(format!(
                "partial response for {} cannot be cached",
                entry.key
            )));
        }

        let mut caches = self.caches.write().await;
        let replaced = caches
            .get(&handle.version)
            .and_then(|cache| cache.entries.get(&entry.key))
            .map(CacheEntry::size)
            .unwrap_or(0);
        self.check_quota(&caches, entry.size(), replaced)?;

        caches
            .entry(handle.version.clone())
            .or_default()
            .entries
            .insert(entry.key.clone(), entry);
        Ok(())
    }

    /// Keys stored under one version.
    pub async fn keys(&self, handle: &CacheHandle) -> Vec<ResourceKey> {
        self.caches
            .read()
            .await
            .get(&handle.version)
            .map(|cache| cache.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn list_versions(&self) -> BTreeSet<CacheVersion> {
        self.caches.read().await.keys().cloned().collect()
    }

    pub async fn has(&self, version: &CacheVersion) -> bool {
        self.caches.read().await.contains_key(version)
    }

    /// Remove a version and all of its entries.
    pub async fn delete(&self, version: &CacheVersion) -> bool {
        self.caches.write().await.remove(version).is_some()
    }

    /// Delete every version except `current`; returns the removed versions.
    ///
    /// Runs under one write lock, so no lookup observes a half-evicted store.
    pub async fn retain_only(&self, current: &CacheVersion) -> Vec<CacheVersion> {
        let mut caches = self.caches.write().await;
        let stale: Vec<CacheVersion> = caches.keys().filter(|v| *v != current).cloned().collect();
        for version in &stale {
            info!(version = %version, "Deleting old cache");
            caches.remove(version);
        }
        stale
    }

    /// Total cached body bytes across all versions.
    pub async fn usage(&self) -> u64 {
        self.caches.read().await.values().map(Cache::size).sum()
    }

    fn check_quota(
        &self,
        caches: &HashMap<CacheVersion, Cache>,
        added: u64,
        replaced: u64,
    ) -> Result<(), ServiceWorkerError> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let used: u64 = caches.values().map(Cache::size).sum();
        let needed = used.saturating_sub(replaced) + added;
        if needed > quota {
            return Err(ServiceWorkerError::Storage(format!(
                "quota exceeded: {needed} bytes needed, {quota} available"
            )));
        }
        Ok(())
    }
}
