//! Online/offline state and the reconnect signal.

use tokio::sync::watch;
use tracing::info;

/// Shared connectivity flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the state. Returns `true` when this call is an offline → online transition.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.tx.send_replace(online);
        if previous != online {
            info!(online, "Connectivity changed");
        }
        !previous && online
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Wait until the state is online.
    pub async fn wait_online(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|online| *online).await;
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
