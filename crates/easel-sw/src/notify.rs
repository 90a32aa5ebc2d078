//! User-visible notifications.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use easel_core::NotificationPayload;
use hashbrown::HashMap;
use tracing::{debug, info, warn};

/// Displayed notifications remembered by [`NotificationCenter::history`].
pub const HISTORY_LIMIT: usize = 64;

/// Unique identifier for a shown notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

impl NotificationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Permission granted by the user for showing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPermission {
    /// Not asked yet; treated like denied.
    #[default]
    Default,
    Granted,
    Denied,
}

/// A notification currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub payload: NotificationPayload,
}

/// Fire-and-forget notification sink. Display failures are never reported back.
pub trait Notifier: Send + Sync {
    fn notify(&self, payload: &NotificationPayload);
}

/// Notifier that tracks open notifications and honours the permission state.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    inner: Mutex<CenterState>,
}

#[derive(Debug, Default)]
struct CenterState {
    permission: NotificationPermission,
    open: HashMap<NotificationId, Notification>,
    history: VecDeque<Notification>,
}

impl NotificationCenter {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            inner: Mutex::new(CenterState {
                permission,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, CenterState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn permission(&self) -> NotificationPermission {
        self.state().permission
    }

    pub fn set_permission(&self, permission: NotificationPermission) {
        debug!(?permission, "Notification permission changed");
        self.state().permission = permission;
    }

    /// Notifications still on screen.
    pub fn open(&self) -> Vec<Notification> {
        self.state().open.values().cloned().collect()
    }

    /// The last [`HISTORY_LIMIT`] notifications displayed, oldest first.
    pub fn history(&self) -> Vec<Notification> {
        self.state().history.iter().cloned().collect()
    }

    /// Dismiss a notification. Returns it if it was open.
    pub fn close(&self, id: NotificationId) -> Option<Notification> {
        self.state().open.remove(&id)
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, payload: &NotificationPayload) {
        let mut state = self.state();
        if state.permission != NotificationPermission::Granted {
            warn!(title = %payload.title, permission = ?state.permission, "Notification suppressed");
            return;
        }

        let notification = Notification {
            id: NotificationId::new(),
            payload: payload.clone(),
        };
        info!(id = ?notification.id, title = %payload.title, body = %payload.body, "Notification shown");
        state.open.insert(notification.id, notification.clone());
        if state.history.len() == HISTORY_LIMIT {
            state.history.pop_front();
        }
        state.history.push_back(notification);
    }
}
