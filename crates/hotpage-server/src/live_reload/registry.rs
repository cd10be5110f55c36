//! Connected browser sessions.
//!
//! Each session owns a bounded channel; the registry keeps the sending half
//! and the transport handler drains the receiving half into its response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use super::transport::Transport;

/// Messages queued per client before it is considered stalled.
const CLIENT_BUFFER: usize = 8;

/// Message delivered to a browser session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadMessage {
    /// The channel is live.
    Connected,
    /// Something relevant changed, reload the page.
    Reload,
}

impl ReloadMessage {
    /// Wire token for this message.
    pub fn token(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Reload => "reload",
        }
    }
}

/// Failed delivery to one client.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The client's connection is gone.
    #[error("client disconnected")]
    Disconnected,
    /// The client stopped draining its messages.
    #[error("client backlog full")]
    Backlogged,
}

impl<T> From<TrySendError<T>> for DeliveryError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => Self::Backlogged,
            TrySendError::Closed(_) => Self::Disconnected,
        }
    }
}

/// A registered browser session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectedClient {
    /// Session identifier.
    pub id: Uuid,
    /// Transport the session connected with.
    pub transport: Transport,
    /// When the channel opened.
    pub connected_at: DateTime<Utc>,
}

struct ClientEntry {
    client: ConnectedClient,
    handle: mpsc::Sender<ReloadMessage>,
}

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients that accepted the message.
    pub delivered: usize,
    /// Clients removed because delivery failed.
    pub dropped: usize,
}

/// Set of connected browser sessions.
///
/// Owned by one live reload installation; clones share the same set.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<HashMap<Uuid, ClientEntry>>>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.len())
            .finish()
    }
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// The `Connected` acknowledgment is queued before the session becomes
    /// visible to broadcasts. Dropping the returned [`Registration`]
    /// deregisters the session.
    pub fn register(&self, transport: Transport) -> (Registration, mpsc::Receiver<ReloadMessage>) {
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        // Fresh channel with spare capacity, cannot fail
        let _ = tx.try_send(ReloadMessage::Connected);

        let client = ConnectedClient {
            id: Uuid::new_v4(),
            transport,
            connected_at: Utc::now(),
        };
        let id = client.id;

        let count = {
            let mut clients = self.clients.lock().unwrap();
            clients.insert(id, ClientEntry { client, handle: tx });
            clients.len()
        };
        tracing::debug!(client = %id, ?transport, clients = count, "Client connected");

        (
            Registration {
                id,
                registry: self.clone(),
            },
            rx,
        )
    }

    /// Remove a session. Returns false if it was already gone.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.clients.lock().unwrap().remove(&id).is_some();
        if removed {
            tracing::debug!(client = %id, "Client disconnected");
        }
        removed
    }

    /// Number of connected sessions.
    pub fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    /// Returns true when nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the connected sessions.
    pub fn clients(&self) -> Vec<ConnectedClient> {
        self.clients
            .lock()
            .unwrap()
            .values()
            .map(|entry| entry.client.clone())
            .collect()
    }

    /// Deliver `message` to every session registered right now.
    ///
    /// A failed delivery removes that session and does not affect the others.
    pub fn broadcast(&self, message: ReloadMessage) -> BroadcastReport {
        let handles: Vec<(Uuid, mpsc::Sender<ReloadMessage>)> = self
            .clients
            .lock()
            .unwrap()
            .iter()
            .map(|(id, entry)| (*id, entry.handle.clone()))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, handle) in handles {
            match deliver(&handle, message) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!(client = %id, error = %e, "Delivery failed, dropping client");
                    if self.remove(id) {
                        report.dropped += 1;
                    }
                }
            }
        }

        report
    }
}

fn deliver(handle: &mpsc::Sender<ReloadMessage>, message: ReloadMessage) -> Result<(), DeliveryError> {
    handle.try_send(message)?;
    Ok(())
}

/// Keeps a session registered for as long as it is alive.
///
/// Transports hold it inside their response future or body stream, so a
/// closed or failed connection drops it and deregisters the session.
pub struct Registration {
    id: Uuid,
    registry: ClientRegistry,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

impl Registration {
    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_queues_connected_ack() {
        let registry = ClientRegistry::new();

        let (_registration, mut rx) = registry.register(Transport::Push);

        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Connected);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_broadcast_reaches_registered_clients() {
        let registry = ClientRegistry::new();
        let (_a, mut rx_a) = registry.register(Transport::Push);
        let (_b, mut rx_b) = registry.register(Transport::Poll);

        let report = registry.broadcast(ReloadMessage::Reload);

        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Connected);
            assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
        }
    }

    #[test]
    fn test_broadcast_empty_registry_is_noop() {
        let registry = ClientRegistry::new();

        assert_eq!(registry.broadcast(ReloadMessage::Reload), BroadcastReport::default());
    }

    #[test]
    fn test_dropped_registration_deregisters() {
        let registry = ClientRegistry::new();
        let (registration, _rx) = registry.register(Transport::Push);

        drop(registration);

        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ClientRegistry::new();
        let (registration, _rx) = registry.register(Transport::Push);
        let id = registration.id();

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        // Guard drop after explicit removal must not disturb anything
        drop(registration);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_delivery_isolated_and_pruned() {
        let registry = ClientRegistry::new();
        let (_alive, mut rx_alive) = registry.register(Transport::Push);
        let (_dead, rx_dead) = registry.register(Transport::Push);

        // Connection gone without the transport noticing yet
        drop(rx_dead);

        let report = registry.broadcast(ReloadMessage::Reload);

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert_eq!(registry.len(), 1);
        assert_eq!(rx_alive.try_recv().unwrap(), ReloadMessage::Connected);
        assert_eq!(rx_alive.try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[test]
    fn test_stalled_client_pruned() {
        let registry = ClientRegistry::new();
        let (_stalled, _rx) = registry.register(Transport::Push);

        // One slot is taken by the connected ack
        for _ in 1..CLIENT_BUFFER {
            assert_eq!(registry.broadcast(ReloadMessage::Reload).delivered, 1);
        }
        let report = registry.broadcast(ReloadMessage::Reload);

        assert_eq!(report, BroadcastReport { delivered: 0, dropped: 1 });
        assert!(registry.is_empty());
    }

    #[test]
    fn test_late_client_misses_earlier_broadcast() {
        let registry = ClientRegistry::new();
        registry.broadcast(ReloadMessage::Reload);

        let (_late, mut rx) = registry.register(Transport::Push);

        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Connected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_independent_registries_do_not_share_clients() {
        let first = ClientRegistry::new();
        let second = ClientRegistry::new();
        let (_a, _rx) = first.register(Transport::Push);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn test_clients_snapshot() {
        let registry = ClientRegistry::new();
        let (registration, _rx) = registry.register(Transport::Poll);

        let clients = registry.clients();

        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, registration.id());
        assert_eq!(clients[0].transport, Transport::Poll);
    }

    #[test]
    fn test_message_tokens() {
        assert_eq!(ReloadMessage::Connected.token(), "connected");
        assert_eq!(ReloadMessage::Reload.token(), "reload");
    }
}
