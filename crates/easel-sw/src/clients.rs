//! Windows controlled by the worker.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use tracing::info;
use url::Url;

/// Unique identifier for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An application window.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,

    pub url: Url,

    /// Whether the worker currently controls this window.
    pub controlled: bool,

    pub focused: bool,
}

/// Known application windows.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<ClientId, Client>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Register a window that was opened outside the worker.
    pub fn attach(&mut self, url: Url) -> ClientId {
        let client = Client {
            id: ClientId::new(),
            url,
            controlled: false,
            focused: false,
        };
        let id = client.id;
        self.clients.insert(id, client);
        id
    }

    /// Open and focus a new window at `url`. The worker controls it from the start.
    pub fn open_window(&mut self, url: Url) -> Client {
        for client in self.clients.values_mut() {
            client.focused = false;
        }
        let client = Client {
            id: ClientId::new(),
            url,
            controlled: true,
            focused: true,
        };
        info!(url = %client.url, "Opening window");
        self.clients.insert(client.id, client.clone());
        client
    }

    /// Take control of every window. Returns how many were newly claimed.
    pub fn claim(&mut self) -> usize {
        let mut claimed = 0;
        for client in self.clients.values_mut().filter(|c| !c.controlled) {
            client.controlled = true;
            claimed += 1;
        }
        claimed
    }

    /// All windows, optionally only the controlled ones.
    pub fn match_all(&self, include_uncontrolled: bool) -> Vec<&Client> {
        self.clients
            .values()
            .filter(|c| include_uncontrolled || c.controlled)
            .collect()
    }

    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        self.clients.remove(&id)
    }
}
