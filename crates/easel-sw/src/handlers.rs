//! Default handlers for the worker's lifecycle and runtime events.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::dispatch::{EventHandler, EventOutcome, WorkerEvent};
use crate::interceptor::{CacheFirst, FetchOutcome};
use crate::{ServiceWorkerError, WorkerScope, WorkerState};

/// Opens the current version and pre-populates the asset manifest.
pub struct InstallHandler;

#[async_trait]
impl EventHandler for InstallHandler {
    async fn handle(
        &self,
        scope: &WorkerScope,
        _event: WorkerEvent,
    ) -> Result<EventOutcome, ServiceWorkerError> {
        scope.set_state(WorkerState::Installing).await;
        let config = scope.config();
        let version = &config.cache_version;

        let result = async {
            let urls = config.manifest_urls()?;
            let handle = scope.caches().open(version).await?;
            scope
                .caches()
                .populate(&handle, scope.fetcher().as_ref(), &urls)
                .await?;
            Ok::<_, ServiceWorkerError>(handle)
        }
        .await;

        match result {
            Ok(handle) => {
                scope.set_current(handle).await;
                scope.set_state(WorkerState::Installed).await;
                info!(version = %version, "Worker installed");
                Ok(EventOutcome::Installed)
            }
            Err(e) => {
                error!(version = %version, error = %e, "Install failed");
                scope.set_state(WorkerState::Redundant).await;
                Err(e)
            }
        }
    }
}

/// Deletes every cache version but the current one, then claims clients.
pub struct ActivateHandler;

#[async_trait]
impl EventHandler for ActivateHandler {
    async fn handle(
        &self,
        scope: &WorkerScope,
        _event: WorkerEvent,
    ) -> Result<EventOutcome, ServiceWorkerError> {
        match scope.state().await {
            WorkerState::Installed | WorkerState::Activated => {}
            other => {
                return Err(ServiceWorkerError::StateError(format!(
                    "cannot activate a worker in state {other:?}"
                )))
            }
        }

        scope.set_state(WorkerState::Activating).await;
        let evicted = scope
            .caches()
            .retain_only(&scope.config().cache_version)
            .await;
        let claimed = scope.clients().write().await.claim();
        scope.set_state(WorkerState::Activated).await;

        info!(evicted = evicted.len(), claimed, "Worker activated");
        Ok(EventOutcome::Activated { evicted })
    }
}

/// Cache-first once active; plain network pass-through before that.
pub struct FetchHandler;

#[async_trait]
impl EventHandler for FetchHandler {
    async fn handle(
        &self,
        scope: &WorkerScope,
        event: WorkerEvent,
    ) -> Result<EventOutcome, ServiceWorkerError> {
        let WorkerEvent::Fetch(request) = event else {
            return Ok(EventOutcome::Unhandled);
        };

        let current = match (scope.state().await, scope.current().await) {
            (WorkerState::Activated, Some(current)) => current,
            _ => {
                debug!(url = %request.url, "Worker not active, passing through");
                let outcome = match scope.fetcher().fetch(&request).await {
                    Ok(response) => FetchOutcome::Network(response),
                    Err(e) => FetchOutcome::Failed(e),
                };
                return Ok(EventOutcome::Fetched(outcome));
            }
        };

        let interceptor = CacheFirst::new(scope.caches().clone(), current, scope.fetcher().clone());
        Ok(EventOutcome::Fetched(interceptor.intercept(&request).await))
    }
}

/// Runs the deferred save when its tag fires.
pub struct SyncHandler;

#[async_trait]
impl EventHandler for SyncHandler {
    async fn handle(
        &self,
        scope: &WorkerScope,
        event: WorkerEvent,
    ) -> Result<EventOutcome, ServiceWorkerError> {
        let WorkerEvent::Sync { tag } = event else {
            return Ok(EventOutcome::Unhandled);
        };

        if tag != scope.config().sync_task_name {
            warn!(tag = %tag, "Unknown sync tag");
            return Ok(EventOutcome::Unhandled);
        }

        let state = scope.executor().run(scope.sync(), &tag).await;
        Ok(EventOutcome::Synced(state))
    }
}

/// Closes the clicked notification and opens the application root.
pub struct NotificationClickHandler;

#[async_trait]
impl EventHandler for NotificationClickHandler {
    async fn handle(
        &self,
        scope: &WorkerScope,
        event: WorkerEvent,
    ) -> Result<EventOutcome, ServiceWorkerError> {
        let WorkerEvent::NotificationClick {
            notification,
            action,
        } = event
        else {
            return Ok(EventOutcome::Unhandled);
        };

        if scope.notifications().close(notification).is_none() {
            return Err(ServiceWorkerError::NotFound(format!(
                "notification {notification:?}"
            )));
        }
        debug!(?action, "Notification clicked");

        let root = scope.config().resolve("/")?;
        let client = scope.clients().write().await.open_window(root);
        Ok(EventOutcome::WindowOpened(client))
    }
}
