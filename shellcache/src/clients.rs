//! Open foreground clients and the notices posted to them.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use shellcache_core::GenerationId;
use tokio::sync::broadcast;
use tracing::debug;

use crate::CacheVersionRegistry;

const NOTICE_CAPACITY: usize = 32;

/// Identifier of an open client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Numeric value of the id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Notice posted to every subscribed client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientNotice {
    /// Clients are now controlled by `generation`.
    GenerationChanged {
        /// The generation now in control.
        generation: GenerationId,
    },
}

/// Tracks which generation controls each open client.
///
/// A client connected before the first activation is uncontrolled until the
/// first [`claim`](Self::claim).
#[derive(Debug)]
pub struct ClientRegistry {
    registry: Arc<CacheVersionRegistry>,
    clients: DashMap<ClientId, Option<GenerationId>>,
    next_id: AtomicU64,
    notices: broadcast::Sender<ClientNotice>,
}

impl ClientRegistry {
    /// Creates an empty client registry.
    pub fn new(registry: Arc<CacheVersionRegistry>) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            registry,
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
            notices,
        }
    }

    /// Registers a client controlled by the current generation.
    pub fn connect(&self) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let controller = self.registry.current_generation();
        debug!(client = %id, controller = controller.as_ref().map(|g| g.as_str()), "client connected");
        self.clients.insert(id, controller);
        id
    }

    /// Unregisters a client. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    /// Generation controlling `id`. `None` for unknown or uncontrolled
    /// clients.
    pub fn controller(&self, id: ClientId) -> Option<GenerationId> {
        self.clients.get(&id).and_then(|c| c.clone())
    }

    /// Number of open clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is open.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Puts every open client under `generation` and notifies subscribers.
    /// Returns the number of clients claimed.
    pub fn claim(&self, generation: &GenerationId) -> usize {
        let mut claimed = 0;
        for mut client in self.clients.iter_mut() {
            *client.value_mut() = Some(generation.clone());
            claimed += 1;
        }
        debug!(%generation, claimed, "clients claimed");
        let _ = self.notices.send(ClientNotice::GenerationChanged {
            generation: generation.clone(),
        });
        claimed
    }

    /// Subscribes to client notices.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientNotice> {
        self.notices.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_moves_every_client() {
        let registry = Arc::new(CacheVersionRegistry::with_current(GenerationId::new("v1")));
        let clients = ClientRegistry::new(Arc::clone(&registry));
        let a = clients.connect();
        let b = clients.connect();
        assert_ne!(a, b);
        assert_eq!(clients.controller(a), Some(GenerationId::new("v1")));

        let mut notices = clients.subscribe();
        assert_eq!(clients.claim(&GenerationId::new("v2")), 2);
        assert_eq!(clients.controller(b), Some(GenerationId::new("v2")));
        assert_eq!(
            notices.recv().await.unwrap(),
            ClientNotice::GenerationChanged {
                generation: GenerationId::new("v2")
            }
        );
    }

    #[test]
    fn test_uncontrolled_before_activation() {
        let clients = ClientRegistry::new(Arc::new(CacheVersionRegistry::new()));
        let id = clients.connect();
        assert!(clients.controller(id).is_none());
        assert!(clients.disconnect(id));
        assert!(!clients.disconnect(id));
        assert!(clients.is_empty());
    }
}
