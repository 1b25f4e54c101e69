//! Window clients
//!
//! The worker-side view of open pages: enumerated for notification
//! click routing and claimed on activation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// An open window-type client
#[derive(Debug, Clone)]
pub struct WindowClient {
    pub id: u32,
    pub url: String,
    pub focused: bool,
    /// Whether the active worker controls this client's fetches
    pub controlled: bool,
}

/// Registry of open window clients
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<WindowClient>>,
    next_id: AtomicU32,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// A page the user opened; uncontrolled until a worker claims it
    pub fn open(&self, url: &str) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.clients.lock().unwrap().push(WindowClient {
            id,
            url: url.to_string(),
            focused: false,
            controlled: false,
        });
        id
    }

    /// Worker-initiated window; opens focused
    pub fn open_window(&self, url: &str) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut clients = self.clients.lock().unwrap();
        for client in clients.iter_mut() {
            client.focused = false;
        }
        clients.push(WindowClient {
            id,
            url: url.to_string(),
            focused: true,
            controlled: true,
        });
        log::debug!("Opened new window {} at {}", id, url);
        id
    }

    /// Snapshot of all open window clients
    pub fn match_all(&self) -> Vec<WindowClient> {
        self.clients.lock().unwrap().clone()
    }

    pub fn get(&self, id: u32) -> Option<WindowClient> {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Navigate a client to a new URL
    pub fn navigate(&self, id: u32, url: &str) -> bool {
        let mut clients = self.clients.lock().unwrap();
        if let Some(client) = clients.iter_mut().find(|c| c.id == id) {
            client.url = url.to_string();
            true
        } else {
            false
        }
    }

    /// Focus one client, unfocusing the rest
    pub fn focus(&self, id: u32) -> bool {
        let mut clients = self.clients.lock().unwrap();
        let exists = clients.iter().any(|c| c.id == id);
        if exists {
            for client in clients.iter_mut() {
                client.focused = client.id == id;
            }
        }
        exists
    }

    /// Take control of every open client (activation claim); no reload.
    pub fn claim(&self) {
        let mut clients = self.clients.lock().unwrap();
        for client in clients.iter_mut() {
            client.controlled = true;
        }
        log::debug!("Claimed {} client(s)", clients.len());
    }

    pub fn close(&self, id: u32) -> bool {
        let mut clients = self.clients.lock().unwrap();
        let before = clients.len();
        clients.retain(|c| c.id != id);
        clients.len() < before
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_match_all() {
        let registry = ClientRegistry::new();
        registry.open("https://app.test/");
        registry.open("https://app.test/#/favorites");
        assert_eq!(registry.match_all().len(), 2);
    }

    #[test]
    fn focus_is_exclusive() {
        let registry = ClientRegistry::new();
        let a = registry.open("https://app.test/");
        let b = registry.open("https://app.test/#/settings");

        assert!(registry.focus(a));
        assert!(registry.focus(b));

        let clients = registry.match_all();
        assert!(!clients.iter().find(|c| c.id == a).unwrap().focused);
        assert!(clients.iter().find(|c| c.id == b).unwrap().focused);
    }

    #[test]
    fn navigate_rewrites_url() {
        let registry = ClientRegistry::new();
        let id = registry.open("https://app.test/");
        assert!(registry.navigate(id, "https://app.test/detail/42"));
        assert_eq!(registry.get(id).unwrap().url, "https://app.test/detail/42");
        assert!(!registry.navigate(999, "https://app.test/"));
    }

    #[test]
    fn claim_controls_every_client() {
        let registry = ClientRegistry::new();
        registry.open("https://app.test/");
        registry.open("https://app.test/#/favorites");
        registry.claim();
        assert!(registry.match_all().iter().all(|c| c.controlled));
    }

    #[test]
    fn open_window_starts_focused_and_controlled() {
        let registry = ClientRegistry::new();
        let id = registry.open_window("https://app.test/detail/42");
        let client = registry.get(id).unwrap();
        assert!(client.focused);
        assert!(client.controlled);
    }
}
