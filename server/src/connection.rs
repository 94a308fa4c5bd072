//! Client connection tracking for the arena server
//!
//! This module owns the server-side view of every live connection:
//! - Connection lifecycle (register on channel open, unregister on close)
//! - Send-handle ownership: the registry holds each client's outbound
//!   channel exclusively and drops it on removal, which closes the writer
//! - Capacity enforcement so resource exhaustion turns into rejection
//!   instead of a crash
//!
//! The registry never knows about sessions; session membership cleanup on
//! disconnect is driven by the arena, which calls into the session store
//! after `unregister` reports a removal.

use log::{info, warn};
use shared::{ClientId, ServerMessage};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc;

/// Bound on each client's outbound queue. A peer that stops reading fills
/// its queue and is treated as unreachable instead of growing memory.
pub const SEND_QUEUE_CAPACITY: usize = 1000;

/// Outbound handle for one client. The paired receiver is drained by that
/// client's writer task.
pub type ClientSender = mpsc::Sender<ServerMessage>;

/// A connected client as the registry sees it.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the registry.
    pub id: ClientId,
    /// Channel to the client's writer task. Dropping it closes the writer.
    sender: ClientSender,
    /// When the connection was registered.
    pub connected_at: Instant,
}

/// Tracks all live client connections and their send-handles.
///
/// IDs start from 1 and are never reused, so a stale ID held by a session
/// can only miss, never alias a different client.
pub struct ConnectionRegistry {
    clients: HashMap<ClientId, Client>,
    next_client_id: ClientId,
    max_clients: usize,
}

impl ConnectionRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection and returns its client ID, or `None` if
    /// the server is at capacity. A refused registration drops the sender,
    /// closing the connection's writer.
    pub fn register(&mut self, sender: ClientSender) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            warn!(
                "Rejecting connection: at capacity ({} clients)",
                self.max_clients
            );
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        self.clients.insert(
            client_id,
            Client {
                id: client_id,
                sender,
                connected_at: Instant::now(),
            },
        );
        info!("Client {} connected", client_id);

        Some(client_id)
    }

    /// Removes a client, releasing its send-handle. Returns true if the
    /// client was present; calling again for the same ID is a no-op, which
    /// makes disconnect handling idempotent.
    pub fn unregister(&mut self, client_id: ClientId) -> bool {
        if self.clients.remove(&client_id).is_some() {
            info!("Client {} disconnected", client_id);
            true
        } else {
            false
        }
    }

    /// Queues a message for one client. Fails if the client is gone, its
    /// writer task has shut down, or its outbound queue is full because the
    /// peer stopped reading; the caller treats all three as a disconnect.
    pub fn send(&self, client_id: ClientId, message: ServerMessage) -> Result<(), ClientId> {
        match self.clients.get(&client_id) {
            Some(client) => client.sender.try_send(message).map_err(|_| client_id),
            None => Err(client_id),
        }
    }

    /// Best-effort fan-out to the given clients. Delivery to one recipient
    /// is independent of the others; the IDs that could not be reached are
    /// returned so the caller can run their disconnect path.
    pub fn broadcast(&self, client_ids: &[ClientId], message: &ServerMessage) -> Vec<ClientId> {
        let mut failed = Vec::new();

        for &client_id in client_ids {
            if self.send(client_id, message.clone()).is_err() {
                warn!("Failed to send to client {}", client_id);
                failed.push(client_id);
            }
        }

        failed
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Returns the number of currently connected clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (ClientSender, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(8)
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut registry = ConnectionRegistry::new(4);
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert_eq!(registry.register(tx1), Some(1));
        assert_eq!(registry.register(tx2), Some(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_at_capacity() {
        let mut registry = ConnectionRegistry::new(1);
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert!(registry.register(tx1).is_some());
        assert!(registry.register(tx2).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new(2);
        let (tx, _rx) = channel();

        let id = registry.register(tx).unwrap();
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_connected_client() {
        let mut registry = ConnectionRegistry::new(2);
        let (tx, mut rx) = channel();

        let id = registry.register(tx).unwrap();
        registry.send(id, ServerMessage::Pong).unwrap();

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Pong);
    }

    #[test]
    fn test_send_to_unknown_client_fails() {
        let registry = ConnectionRegistry::new(2);
        assert_eq!(registry.send(99, ServerMessage::Pong), Err(99));
    }

    #[test]
    fn test_full_queue_is_send_failure() {
        let mut registry = ConnectionRegistry::new(2);
        // Capacity one and a receiver that never drains: the second send
        // finds the queue full.
        let (tx, _rx) = mpsc::channel(1);

        let id = registry.register(tx).unwrap();
        registry.send(id, ServerMessage::Pong).unwrap();

        assert_eq!(registry.send(id, ServerMessage::Pong), Err(id));
    }

    #[test]
    fn test_send_after_receiver_dropped_fails() {
        let mut registry = ConnectionRegistry::new(2);
        let (tx, rx) = channel();

        let id = registry.register(tx).unwrap();
        drop(rx);

        assert_eq!(registry.send(id, ServerMessage::Pong), Err(id));
    }

    #[test]
    fn test_broadcast_continues_past_failures() {
        let mut registry = ConnectionRegistry::new(4);
        let (tx1, mut rx1) = channel();
        let (tx2, rx2) = channel();
        let (tx3, mut rx3) = channel();

        let a = registry.register(tx1).unwrap();
        let b = registry.register(tx2).unwrap();
        let c = registry.register(tx3).unwrap();
        drop(rx2); // b's writer is gone

        let failed = registry.broadcast(&[a, b, c], &ServerMessage::Pong);

        assert_eq!(failed, vec![b]);
        assert_eq!(rx1.try_recv().unwrap(), ServerMessage::Pong);
        assert_eq!(rx3.try_recv().unwrap(), ServerMessage::Pong);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut registry = ConnectionRegistry::new(2);
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let first = registry.register(tx1).unwrap();
        registry.unregister(first);
        let second = registry.register(tx2).unwrap();

        assert!(second > first);
    }
}
