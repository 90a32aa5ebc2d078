//! Event table: one handler per event kind.

use std::sync::Arc;

use async_trait::async_trait;
use easel_core::CacheVersion;
use easel_net::Request;
use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::clients::Client;
use crate::interceptor::FetchOutcome;
use crate::notify::NotificationId;
use crate::sync::TaskState;
use crate::{ServiceWorkerError, WorkerScope};

/// Events delivered to the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Populate the current cache version.
    Install,
    /// Evict stale versions and take control of clients.
    Activate,
    /// A resource request from the application.
    Fetch(Request),
    /// Connectivity is back and `tag` is due.
    Sync { tag: String },
    /// The user clicked a notification (body or one of its actions).
    NotificationClick {
        notification: NotificationId,
        action: Option<String>,
    },
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
            WorkerEvent::Sync { .. } => EventKind::Sync,
            WorkerEvent::NotificationClick { .. } => EventKind::NotificationClick,
        }
    }
}

/// Key of the handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Sync,
    NotificationClick,
}

/// What a handler produced.
#[derive(Debug)]
pub enum EventOutcome {
    Installed,
    Activated { evicted: Vec<CacheVersion> },
    Fetched(FetchOutcome),
    /// `None` when no registration was runnable.
    Synced(Option<TaskState>),
    WindowOpened(Client),
    /// No handler registered, or the handler ignored the event.
    Unhandled,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        scope: &WorkerScope,
        event: WorkerEvent,
    ) -> Result<EventOutcome, ServiceWorkerError>;
}

/// Maps event kinds to handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `kind`, replacing any previous one.
    pub fn on(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub async fn dispatch(
        &self,
        scope: &WorkerScope,
        event: WorkerEvent,
    ) -> Result<EventOutcome, ServiceWorkerError> {
        let kind = event.kind();
        match self.handlers.get(&kind) {
            Some(handler) => {
                trace!(?kind, "Dispatching event");
                handler.handle(scope, event).await
            }
            None => {
                debug!(?kind, "No handler registered");
                Ok(EventOutcome::Unhandled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_event_kinds() {
        let fetch = WorkerEvent::Fetch(Request::get(Url::parse("https://paint.local/").unwrap()));
        assert_eq!(fetch.kind(), EventKind::Fetch);
        assert_eq!(
            WorkerEvent::Sync { tag: "save-image".into() }.kind(),
            EventKind::Sync
        );
    }

    #[test]
    fn test_empty_table() {
        let dispatcher = EventDispatcher::new();
        assert!(!dispatcher.has_handler(EventKind::Install));
    }
}
