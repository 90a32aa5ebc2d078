//! # Easel Offline Worker
//!
//! Offline resource cache and deferred-save worker for the Easel paint app.
//!
//! ## Features
//!
//! - **Versioned cache**: install-time population, activation-time eviction
//! - **Cache-first interception**: hits never touch the network
//! - **Deferred save**: `"save-image"` queued offline, run on reconnect
//! - **Notifications**: completion notice with an "open" action
//! - **Event table**: every lifecycle step is an explicit, replaceable handler
//!
//! ## Architecture
//!
//! ```text
//! OfflineWorker
//!     ├── EventDispatcher (EventKind → EventHandler)
//!     └── WorkerScope
//!             ├── CacheStorage
//!             │       └── CacheVersion → ResourceKey → CacheEntry
//!             ├── Fetcher (network)
//!             ├── SyncManager ── TaskExecutor ── SaveTask
//!             │                        └── NotificationCenter
//!             └── Clients
//! ```

use std::sync::Arc;

use easel_common::EaselError;
use easel_core::{ConfigError, WorkerConfig};
use easel_net::{Connectivity, Fetcher, Request};
use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub mod cache;
pub mod clients;
pub mod dispatch;
pub mod handlers;
pub mod interceptor;
pub mod notify;
pub mod sync;

pub use cache::{CacheEntry, CacheHandle, CacheStorage};
pub use clients::{Client, ClientId, Clients};
pub use dispatch::{EventDispatcher, EventHandler, EventKind, EventOutcome, WorkerEvent};
pub use interceptor::{CacheFirst, FetchOutcome};
pub use notify::{
    Notification, NotificationCenter, NotificationId, NotificationPermission, Notifier,
};
pub use sync::{Registration, SaveTask, SimulatedSave, SyncManager, TaskExecutor, TaskState};

// ==================== Errors ====================

/// Errors that can occur in worker operations.
#[derive(Error, Debug)]
pub enum ServiceWorkerError {
    /// Storage unavailable or quota exceeded.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An install-time asset could not be fetched.
    #[error("Populate failed for {url}: {reason}")]
    Populate { url: String, reason: String },

    /// A fetched response could not be written to the cache.
    #[error("Cache put error: {0}")]
    CachePut(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ServiceWorkerError> for EaselError {
    fn from(err: ServiceWorkerError) -> Self {
        match err {
            ServiceWorkerError::Storage(message) | ServiceWorkerError::CachePut(message) => {
                EaselError::storage(message)
            }
            err @ ServiceWorkerError::Populate { .. } => EaselError::network(err.to_string()),
            ServiceWorkerError::StateError(message) => EaselError::config(message),
            ServiceWorkerError::NotFound(what) => EaselError::NotFound(what),
            ServiceWorkerError::Config(err) => err.into(),
        }
    }
}

// ==================== Lifecycle ====================

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Created, not installed yet.
    #[default]
    Parsed,
    /// Populating the cache.
    Installing,
    /// Cache populated, waiting for activation.
    Installed,
    /// Evicting stale cache versions.
    Activating,
    /// Serving requests cache-first.
    Activated,
    /// Install failed.
    Redundant,
}

// ==================== Scope ====================

/// State shared by all handlers.
pub struct WorkerScope {
    config: WorkerConfig,
    caches: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    sync: SyncManager,
    executor: TaskExecutor,
    notifications: Arc<NotificationCenter>,
    clients: RwLock<Clients>,
    state: RwLock<WorkerState>,
    current: RwLock<Option<CacheHandle>>,
}

impl WorkerScope {
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn caches(&self) -> &Arc<CacheStorage> {
        &self.caches
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn sync(&self) -> &SyncManager {
        &self.sync
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    pub fn clients(&self) -> &RwLock<Clients> {
        &self.clients
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: WorkerState) {
        debug!(?state, "Worker state changed");
        *self.state.write().await = state;
    }

    /// Handle of the version being served, once installed.
    pub async fn current(&self) -> Option<CacheHandle> {
        self.current.read().await.clone()
    }

    pub async fn set_current(&self, handle: CacheHandle) {
        *self.current.write().await = Some(handle);
    }
}

// ==================== Worker ====================

/// The offline worker: a scope plus the handler table driving it.
pub struct OfflineWorker {
    scope: WorkerScope,
    dispatcher: EventDispatcher,
    sync_requested: Notify,
}

/// Builder for [`OfflineWorker`].
pub struct OfflineWorkerBuilder {
    config: WorkerConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    save_task: Option<Arc<dyn SaveTask>>,
    permission: NotificationPermission,
}

impl OfflineWorkerBuilder {
    /// Network used for install-time population and cache misses.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Work performed by the deferred save. Defaults to [`SimulatedSave`]
    /// with the configured latency.
    pub fn save_task(mut self, task: Arc<dyn SaveTask>) -> Self {
        self.save_task = Some(task);
        self
    }

    pub fn notification_permission(mut self, permission: NotificationPermission) -> Self {
        self.permission = permission;
        self
    }

    pub fn build(self) -> Result<OfflineWorker, ServiceWorkerError> {
        self.config.validate()?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| ServiceWorkerError::StateError("no fetcher configured".into()))?;

        let caches = Arc::new(match self.config.storage_quota_bytes {
            Some(quota) => CacheStorage::with_quota(quota),
            None => CacheStorage::new(),
        });
        let notifications = Arc::new(NotificationCenter::new(self.permission));
        let save_task = self
            .save_task
            .unwrap_or_else(|| Arc::new(SimulatedSave::new(self.config.task_latency())) as Arc<dyn SaveTask>);
        let executor = TaskExecutor::new(
            save_task,
            notifications.clone(),
            self.config.notification.clone(),
            self.config.retry_policy(),
        );

        let mut dispatcher = EventDispatcher::new();
        dispatcher.on(EventKind::Install, Arc::new(handlers::InstallHandler));
        dispatcher.on(EventKind::Activate, Arc::new(handlers::ActivateHandler));
        dispatcher.on(EventKind::Fetch, Arc::new(handlers::FetchHandler));
        dispatcher.on(EventKind::Sync, Arc::new(handlers::SyncHandler));
        dispatcher.on(
            EventKind::NotificationClick,
            Arc::new(handlers::NotificationClickHandler),
        );

        Ok(OfflineWorker {
            scope: WorkerScope {
                config: self.config,
                caches,
                fetcher,
                sync: SyncManager::new(),
                executor,
                notifications,
                clients: RwLock::new(Clients::new()),
                state: RwLock::new(WorkerState::Parsed),
                current: RwLock::new(None),
            },
            dispatcher,
            sync_requested: Notify::new(),
        })
    }
}

impl OfflineWorker {
    pub fn builder(config: WorkerConfig) -> OfflineWorkerBuilder {
        OfflineWorkerBuilder {
            config,
            fetcher: None,
            save_task: None,
            permission: NotificationPermission::Granted,
        }
    }

    pub fn scope(&self) -> &WorkerScope {
        &self.scope
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.scope.config
    }

    pub fn caches(&self) -> &Arc<CacheStorage> {
        &self.scope.caches
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.scope.notifications
    }

    pub fn sync(&self) -> &SyncManager {
        &self.scope.sync
    }

    pub async fn state(&self) -> WorkerState {
        self.scope.state().await
    }

    /// Replace the handler for one event kind.
    pub fn on(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.dispatcher.on(kind, handler);
    }

    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        self.dispatcher.dispatch(&self.scope, event).await
    }

    /// Install then activate.
    pub async fn start(&self) -> Result<(), ServiceWorkerError> {
        self.dispatch(WorkerEvent::Install).await?;
        self.dispatch(WorkerEvent::Activate).await?;
        Ok(())
    }

    /// Route a resource request through the worker.
    pub async fn fetch(&self, request: Request) -> FetchOutcome {
        match self.dispatch(WorkerEvent::Fetch(request.clone())).await {
            Ok(EventOutcome::Fetched(outcome)) => outcome,
            // Without a fetch handler the request goes straight to the network.
            Ok(_) | Err(_) => match self.scope.fetcher.fetch(&request).await {
                Ok(response) => FetchOutcome::Network(response),
                Err(e) => FetchOutcome::Failed(e),
            },
        }
    }

    /// Queue a deferred task. Call only when the client is offline.
    ///
    /// A connectivity watcher runs it as soon as the connection is up, even
    /// if the connection came back before the registration landed.
    pub fn enqueue(&self, tag: &str) -> Registration {
        let registration = self.scope.sync.register(tag);
        self.sync_requested.notify_one();
        registration
    }

    /// Fire a sync event for every pending tag.
    pub async fn flush_pending_sync(&self) -> Vec<(String, Option<TaskState>)> {
        let mut results = Vec::new();
        for tag in self.scope.sync.pending_tags() {
            let state = match self.dispatch(WorkerEvent::Sync { tag: tag.clone() }).await {
                Ok(EventOutcome::Synced(state)) => state,
                Ok(_) => None,
                Err(e) => {
                    warn!(tag = %tag, error = %e, "Sync dispatch failed");
                    None
                }
            };
            results.push((tag, state));
        }
        results
    }

    /// Flush until nothing runnable is left.
    ///
    /// A tag registered again while it was running is picked up by the next
    /// pass. Stops once a pass runs nothing, so unhandled tags stay pending.
    pub async fn drain_pending_sync(&self) -> Vec<(String, Option<TaskState>)> {
        let mut results = Vec::new();
        loop {
            let pass = self.flush_pending_sync().await;
            let ran = pass.iter().any(|(_, state)| state.is_some());
            results.extend(pass);
            if !ran || self.scope.sync.pending_tags().is_empty() {
                return results;
            }
        }
    }

    /// Run pending tags while online: on every offline → online transition,
    /// and on every `enqueue` that lands while already online.
    pub fn watch_connectivity(self: Arc<Self>, connectivity: &Connectivity) -> JoinHandle<()> {
        let mut rx = connectivity.subscribe();
        let mut online = *rx.borrow_and_update();
        tokio::spawn(async move {
            if online {
                self.drain_pending_sync().await;
            }
            loop {
                let flush = tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let now_online = *rx.borrow_and_update();
                        let reconnected = now_online && !online;
                        online = now_online;
                        if reconnected {
                            info!("Back online, running pending sync");
                        }
                        reconnected
                    }
                    _ = self.sync_requested.notified() => online,
                };
                if flush {
                    self.drain_pending_sync().await;
                }
            }
        })
    }

    /// Click a notification, optionally on one of its actions.
    pub async fn click_notification(
        &self,
        notification: NotificationId,
        action: Option<&str>,
    ) -> Result<EventOutcome, ServiceWorkerError> {
        self.dispatch(WorkerEvent::NotificationClick {
            notification,
            action: action.map(str::to_string),
        })
        .await
    }

    /// Snapshot of all known windows.
    pub async fn clients(&self) -> Vec<Client> {
        self.scope
            .clients
            .read()
            .await
            .match_all(true)
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_core::SAVE_IMAGE_TASK;
    use easel_net::MockFetcher;
    use std::time::Duration;
    use url::Url;

    fn config() -> WorkerConfig {
        WorkerConfig {
            origin: Url::parse("https://paint.local/").unwrap(),
            asset_manifest: vec!["/index.html".into(), "/assets/script.js".into()],
            task_latency_ms: 5,
            ..Default::default()
        }
    }

    fn fetcher() -> Arc<MockFetcher> {
        Arc::new(
            MockFetcher::new()
                .with_route("https://paint.local/index.html", "<html>")
                .with_route("https://paint.local/assets/script.js", "js"),
        )
    }

    #[test]
    fn test_build_requires_fetcher() {
        assert!(matches!(
            OfflineWorker::builder(config()).build(),
            Err(ServiceWorkerError::StateError(_))
        ));
    }

    #[test]
    fn test_build_validates_config() {
        let bad = WorkerConfig {
            asset_manifest: vec!["relative.html".into()],
            ..config()
        };
        assert!(matches!(
            OfflineWorker::builder(bad).fetcher(fetcher()).build(),
            Err(ServiceWorkerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_start_installs_and_activates() {
        let worker = OfflineWorker::builder(config()).fetcher(fetcher()).build().unwrap();
        worker.start().await.unwrap();

        assert_eq!(worker.state().await, WorkerState::Activated);
        let handle = worker.caches().open(&config().cache_version).await.unwrap();
        assert_eq!(worker.caches().keys(&handle).await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_install_marks_redundant() {
        let net = fetcher();
        net.fail("https://paint.local/assets/script.js");
        let worker = OfflineWorker::builder(config()).fetcher(net).build().unwrap();

        let err = worker.dispatch(WorkerEvent::Install).await.unwrap_err();
        assert!(matches!(err, ServiceWorkerError::Populate { .. }));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(worker.dispatch(WorkerEvent::Activate).await.is_err());
    }

    #[tokio::test]
    async fn test_install_over_quota_is_a_storage_error() {
        let small = WorkerConfig {
            storage_quota_bytes: Some(1),
            ..config()
        };
        let worker = OfflineWorker::builder(small).fetcher(fetcher()).build().unwrap();

        let err = EaselError::from(worker.start().await.unwrap_err());
        assert!(matches!(err, EaselError::Storage { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_worker_errors_convert() {
        let populate = ServiceWorkerError::Populate {
            url: "https://paint.local/a.js".into(),
            reason: "status 500".into(),
        };
        assert_eq!(EaselError::from(populate).category(), "network");
        assert_eq!(
            EaselError::from(ServiceWorkerError::StateError("no fetcher configured".into()))
                .category(),
            "config"
        );
        assert!(matches!(
            EaselError::from(ServiceWorkerError::NotFound("notification 7".into())),
            EaselError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let net = fetcher();
        let worker = OfflineWorker::builder(config()).fetcher(net.clone()).build().unwrap();
        let url = Url::parse("https://paint.local/index.html").unwrap();

        let outcome = worker.fetch(Request::get(url.clone())).await;

        assert!(matches!(outcome, FetchOutcome::Network(_)));
        assert!(worker.caches().list_versions().await.is_empty());
        assert_eq!(net.calls_for(url.as_str()), 1);
    }

    #[tokio::test]
    async fn test_unknown_sync_tag_is_ignored() {
        let worker = OfflineWorker::builder(config()).fetcher(fetcher()).build().unwrap();
        worker.enqueue("other");

        let outcome = worker
            .dispatch(WorkerEvent::Sync { tag: "other".into() })
            .await
            .unwrap();

        assert!(matches!(outcome, EventOutcome::Unhandled));
        assert!(worker.sync().is_pending("other"));
    }

    #[tokio::test]
    async fn test_watch_connectivity_flushes_on_reconnect() {
        let worker = Arc::new(OfflineWorker::builder(config()).fetcher(fetcher()).build().unwrap());
        let connectivity = Connectivity::new(false);
        let watcher = worker.clone().watch_connectivity(&connectivity);

        worker.enqueue(SAVE_IMAGE_TASK);
        connectivity.set_online(true);

        tokio::time::timeout(Duration::from_secs(2), async {
            while worker.notifications().history().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("notification after reconnect");

        assert!(!worker.sync().is_pending(SAVE_IMAGE_TASK));
        watcher.abort();
    }

    async fn wait_for_notifications(worker: &OfflineWorker, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while worker.notifications().history().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected notifications");
    }

    #[tokio::test]
    async fn test_enqueue_while_online_runs_immediately() {
        let worker = Arc::new(OfflineWorker::builder(config()).fetcher(fetcher()).build().unwrap());
        let connectivity = Connectivity::new(false);
        let watcher = worker.clone().watch_connectivity(&connectivity);

        // Connection comes back before the save registers.
        connectivity.set_online(true);
        tokio::time::sleep(Duration::from_millis(20)).await;
        worker.enqueue(SAVE_IMAGE_TASK);

        wait_for_notifications(&worker, 1).await;
        assert!(!worker.sync().is_pending(SAVE_IMAGE_TASK));
        watcher.abort();
    }

    #[tokio::test]
    async fn test_watcher_started_online_drains_existing_registrations() {
        let worker = Arc::new(OfflineWorker::builder(config()).fetcher(fetcher()).build().unwrap());
        worker.enqueue(SAVE_IMAGE_TASK);

        let watcher = worker.clone().watch_connectivity(&Connectivity::new(true));

        wait_for_notifications(&worker, 1).await;
        watcher.abort();
    }

    #[tokio::test]
    async fn test_registration_during_run_is_executed() {
        let slow = WorkerConfig {
            task_latency_ms: 100,
            ..config()
        };
        let worker = Arc::new(OfflineWorker::builder(slow).fetcher(fetcher()).build().unwrap());
        let connectivity = Connectivity::new(true);
        let watcher = worker.clone().watch_connectivity(&connectivity);

        worker.enqueue(SAVE_IMAGE_TASK);
        tokio::time::timeout(Duration::from_secs(2), async {
            while worker.sync().state_of(SAVE_IMAGE_TASK) != Some(TaskState::Running) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("task should start");
        assert_eq!(worker.enqueue(SAVE_IMAGE_TASK), Registration::Queued);

        wait_for_notifications(&worker, 2).await;
        assert_eq!(worker.sync().state_of(SAVE_IMAGE_TASK), None);
        watcher.abort();
    }

    #[tokio::test]
    async fn test_drain_leaves_unhandled_tags_pending() {
        let worker = OfflineWorker::builder(config()).fetcher(fetcher()).build().unwrap();
        worker.enqueue(SAVE_IMAGE_TASK);
        worker.enqueue("other");

        let results = worker.drain_pending_sync().await;

        assert!(results.contains(&(SAVE_IMAGE_TASK.to_string(), Some(TaskState::Completed))));
        assert!(worker.sync().is_pending("other"));
    }

    #[tokio::test]
    async fn test_click_unknown_notification_is_not_found() {
        let worker = OfflineWorker::builder(config()).fetcher(fetcher()).build().unwrap();
        worker.enqueue(SAVE_IMAGE_TASK);
        worker.flush_pending_sync().await;
        let id = worker.notifications().open()[0].id;

        worker.click_notification(id, Some("open")).await.unwrap();
        assert!(matches!(
            worker.click_notification(id, Some("open")).await,
            Err(ServiceWorkerError::NotFound(_))
        ));
    }
}
