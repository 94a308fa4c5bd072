//! The arena: wiring between connections, sessions, broadcast and
//! persistence.
//!
//! Everything the transport layer and the bot front-end can do goes through
//! this struct. It owns the connection registry and session store, runs the
//! disconnect cascade (a failed send is a disconnect, a disconnect is a
//! leave, a leave may end a session whose final broadcast may fail for
//! someone else), and fires the best-effort persistence attempt when a
//! session ends.
//!
//! The create/join/move/stats methods double as the command interface for
//! external front-ends: they are keyed by client id and return results (or
//! the shared error taxonomy) synchronously, with state updates flowing to
//! the affected clients' send-handles.

use crate::broadcast::BroadcastRouter;
use crate::connection::{ClientSender, ConnectionRegistry, SEND_QUEUE_CAPACITY};
use crate::error::ArenaError;
use crate::persist::GameStore;
use crate::session::{EndedSession, OpOutput, SessionStore};
use log::{debug, warn};
use shared::{ClientId, GameKind, PlayerStats, ServerMessage, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Tunables for one arena instance.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Maximum concurrent connections before new ones are rejected.
    pub max_clients: usize,
    /// Grace window before an Ended session is reaped.
    pub reap_grace: Duration,
    /// Upper bound on a single persistence call.
    pub persist_timeout: Duration,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_clients: 256,
            reap_grace: Duration::from_secs(30),
            persist_timeout: Duration::from_secs(2),
        }
    }
}

pub struct Arena {
    registry: Arc<RwLock<ConnectionRegistry>>,
    store: SessionStore,
    router: BroadcastRouter,
    persistence: Arc<dyn GameStore>,
    config: ArenaConfig,
}

impl Arena {
    pub fn new(config: ArenaConfig, persistence: Arc<dyn GameStore>) -> Arc<Self> {
        let registry = Arc::new(RwLock::new(ConnectionRegistry::new(config.max_clients)));
        let router = BroadcastRouter::new(Arc::clone(&registry));

        Arc::new(Self {
            registry,
            store: SessionStore::new(),
            router,
            persistence,
            config,
        })
    }

    pub fn reap_grace(&self) -> Duration {
        self.config.reap_grace
    }

    /// Registers a new connection and greets it. `None` means the server is
    /// at capacity and the caller should close the channel.
    pub async fn connect(&self, sender: ClientSender) -> Option<ClientId> {
        let client_id = self.registry.write().await.register(sender)?;
        // The welcome can only fail if the writer died immediately; the
        // reader side will notice and disconnect.
        let _ = self
            .registry
            .read()
            .await
            .send(client_id, ServerMessage::Welcome { client_id });
        Some(client_id)
    }

    /// Mints an identity without a websocket behind it: the front-end (or a
    /// test) drains the returned receiver itself.
    pub async fn connect_external(
        &self,
    ) -> Option<(ClientId, mpsc::Receiver<ServerMessage>)> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let client_id = self.connect(tx).await?;
        Some((client_id, rx))
    }

    /// Tears down a client: unregister exactly once, leave its session,
    /// and chase any further clients whose sends failed along the way.
    /// Safe to call multiple times for the same id.
    pub async fn disconnect(self: Arc<Self>, client_id: ClientId) {
        let mut queue = vec![client_id];

        while let Some(id) = queue.pop() {
            if !self.registry.write().await.unregister(id) {
                continue; // already gone
            }
            if let Some(output) = self.store.leave_session(id, &self.router).await {
                queue.extend(output.failed_sends.iter());
                if let Some(ended) = output.ended {
                    self.spawn_persist(ended);
                }
            }
        }
    }

    /// Command interface: create a session. The creator receives the
    /// initial snapshot (which carries the session id) on its send-handle.
    /// A creator still occupying a session leaves it first; creation itself
    /// never fails for a connected client.
    pub async fn create_game(
        self: &Arc<Self>,
        client_id: ClientId,
        game_kind: GameKind,
    ) -> Result<SessionId, ArenaError> {
        if !self.registry.read().await.contains(client_id) {
            return Err(ArenaError::ClientNotFound(client_id));
        }
        let output = self
            .store
            .create_session(game_kind, client_id, &self.router)
            .await;
        Ok(self.follow_up(output))
    }

    /// Command interface: join a session.
    pub async fn join_game(
        self: &Arc<Self>,
        client_id: ClientId,
        session_id: SessionId,
    ) -> Result<SessionId, ArenaError> {
        if !self.registry.read().await.contains(client_id) {
            return Err(ArenaError::ClientNotFound(client_id));
        }
        let output = self
            .store
            .join_session(session_id, client_id, &self.router)
            .await?;
        Ok(self.follow_up(output))
    }

    /// Command interface: apply a move.
    pub async fn submit_move(
        self: &Arc<Self>,
        client_id: ClientId,
        session_id: SessionId,
        payload: &serde_json::Value,
    ) -> Result<(), ArenaError> {
        let output = self
            .store
            .apply_move(session_id, client_id, payload, &self.router)
            .await?;
        self.follow_up(output);
        Ok(())
    }

    /// Command interface: per-player stats from the persistence store.
    /// Fails with `Unavailable` when the store is down; game paths are
    /// unaffected.
    pub async fn player_stats(&self, player_id: ClientId) -> Result<PlayerStats, ArenaError> {
        match tokio::time::timeout(
            self.config.persist_timeout,
            self.persistence.load_stats(player_id),
        )
        .await
        {
            Ok(Ok(stats)) => Ok(stats),
            Ok(Err(_)) | Err(_) => Err(ArenaError::Unavailable),
        }
    }

    /// Queues a message for one client; a dead handle triggers that
    /// client's disconnect.
    pub async fn send(self: &Arc<Self>, client_id: ClientId, message: ServerMessage) {
        if self.registry.read().await.send(client_id, message).is_err() {
            tokio::spawn(Arc::clone(self).disconnect(client_id));
        }
    }

    /// One server tick: advances continuous games and broadcasts changes.
    pub async fn tick(self: &Arc<Self>) {
        for output in self.store.tick_sessions(&self.router).await {
            self.follow_up(output);
        }
    }

    /// One reap sweep over Ended sessions.
    pub async fn sweep(&self) {
        self.store.reap_ended(self.config.reap_grace).await;
    }

    /// Number of live connections.
    pub async fn client_count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Number of sessions still in the table (any status).
    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }

    /// Session the client currently occupies.
    pub async fn session_of(&self, client_id: ClientId) -> Option<SessionId> {
        self.store.session_of(client_id).await
    }

    pub async fn session_status(&self, session_id: SessionId) -> Option<shared::SessionStatus> {
        self.store.status_of(session_id).await
    }

    /// Post-processing common to every session-store operation: unreachable
    /// participants enter the disconnect cascade, an ended session gets its
    /// one persistence attempt.
    fn follow_up(self: &Arc<Self>, output: OpOutput) -> SessionId {
        for &failed in &output.failed_sends {
            tokio::spawn(Arc::clone(self).disconnect(failed));
        }
        if let Some(ended) = output.ended {
            self.spawn_persist(ended);
        }
        output.session_id
    }

    /// Fires the single, bounded, non-blocking persistence attempt for an
    /// ended session. Teardown never waits for this.
    fn spawn_persist(&self, ended: EndedSession) {
        let store = Arc::clone(&self.persistence);
        let timeout = self.config.persist_timeout;

        tokio::spawn(async move {
            let session_id = ended.record.session_id;
            match tokio::time::timeout(timeout, store.save(&ended.record)).await {
                Ok(Ok(())) => {
                    ended.session.lock().await.persisted = true;
                    debug!("Persisted record for session {}", session_id);
                }
                Ok(Err(e)) => {
                    warn!("Session {} left unpersisted: {}", session_id, e);
                }
                Err(_) => {
                    warn!("Persistence attempt for session {} timed out", session_id);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;
    use shared::SessionStatus;

    fn arena_with_store() -> (Arc<Arena>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let arena = Arena::new(ArenaConfig::default(), store.clone());
        (arena, store)
    }

    #[tokio::test]
    async fn test_connect_sends_welcome() {
        let (arena, _store) = arena_with_store();
        let (id, mut rx) = arena.connect_external().await.unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::Welcome { client_id: id }
        );
    }

    #[tokio::test]
    async fn test_capacity_rejects_connections() {
        let store = Arc::new(MemoryStore::new());
        let arena = Arena::new(
            ArenaConfig {
                max_clients: 1,
                ..Default::default()
            },
            store,
        );

        assert!(arena.connect_external().await.is_some());
        assert!(arena.connect_external().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (arena, _store) = arena_with_store();
        let (id, _rx) = arena.connect_external().await.unwrap();

        Arc::clone(&arena).disconnect(id).await;
        Arc::clone(&arena).disconnect(id).await;
        assert_eq!(arena.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_abandons_running_session_and_persists_once() {
        let (arena, store) = arena_with_store();
        let (a, _rx_a) = arena.connect_external().await.unwrap();
        let (b, _rx_b) = arena.connect_external().await.unwrap();

        let sid = arena.create_game(a, GameKind::Pong).await.unwrap();
        arena.join_game(b, sid).await.unwrap();

        Arc::clone(&arena).disconnect(a).await;

        assert_eq!(
            arena.session_status(sid).await,
            Some(SessionStatus::Ended)
        );

        // The persistence attempt runs on a spawned task.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.save_attempts(), 1);
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records()[0].session_id, sid);
    }

    #[tokio::test]
    async fn test_create_requires_connection() {
        let (arena, _store) = arena_with_store();
        let err = arena.create_game(42, GameKind::Snake).await.unwrap_err();
        assert_eq!(err, ArenaError::ClientNotFound(42));
    }

    #[tokio::test]
    async fn test_stats_pass_through_and_unavailable() {
        let (arena, store) = arena_with_store();
        let (a, _rx_a) = arena.connect_external().await.unwrap();

        assert_eq!(
            arena.player_stats(a).await.unwrap(),
            PlayerStats::default()
        );

        store.set_reachable(false);
        assert_eq!(arena.player_stats(a).await, Err(ArenaError::Unavailable));
    }

    #[tokio::test]
    async fn test_backed_up_client_is_disconnected() {
        let (arena, _store) = arena_with_store();
        let (a, _rx_a) = arena.connect_external().await.unwrap();

        // b's queue holds one message and is never drained; the welcome
        // already fills it.
        let (tx, _rx_b) = mpsc::channel(1);
        let b = arena.connect(tx).await.unwrap();

        let sid = arena.create_game(a, GameKind::Snake).await.unwrap();
        arena.join_game(b, sid).await.unwrap();

        // The join broadcast could not be queued for b, so b enters the
        // disconnect cascade and the session is abandoned.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(arena.client_count().await, 1);
        assert_eq!(
            arena.session_status(sid).await,
            Some(SessionStatus::Ended)
        );
    }

    #[tokio::test]
    async fn test_create_replaces_current_session() {
        let (arena, store) = arena_with_store();
        let (a, _rx_a) = arena.connect_external().await.unwrap();
        let (b, _rx_b) = arena.connect_external().await.unwrap();

        let first = arena.create_game(a, GameKind::Pong).await.unwrap();
        arena.join_game(b, first).await.unwrap();

        let second = arena.create_game(a, GameKind::Snake).await.unwrap();

        assert_ne!(second, first);
        assert_eq!(arena.session_of(a).await, Some(second));
        assert_eq!(
            arena.session_status(first).await,
            Some(SessionStatus::Ended)
        );

        // The abandoned session still gets its persistence attempt.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.save_attempts(), 1);
        assert_eq!(store.records()[0].session_id, first);
    }

    #[tokio::test]
    async fn test_dropped_receiver_triggers_cleanup_on_broadcast() {
        let (arena, _store) = arena_with_store();
        let (a, _rx_a) = arena.connect_external().await.unwrap();
        let (b, rx_b) = arena.connect_external().await.unwrap();

        let sid = arena.create_game(a, GameKind::Snake).await.unwrap();
        arena.join_game(b, sid).await.unwrap();

        // b's writer vanishes without a clean disconnect; the next
        // broadcast discovers it.
        drop(rx_b);
        arena
            .submit_move(a, sid, &serde_json::json!({"direction": "UP"}))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(arena.client_count().await, 1);
        assert_eq!(
            arena.session_status(sid).await,
            Some(SessionStatus::Ended)
        );
    }

    #[tokio::test]
    async fn test_sweep_reaps_after_grace() {
        let store = Arc::new(MemoryStore::new());
        let arena = Arena::new(
            ArenaConfig {
                reap_grace: Duration::ZERO,
                ..Default::default()
            },
            store,
        );
        let (a, _rx_a) = arena.connect_external().await.unwrap();
        let (b, _rx_b) = arena.connect_external().await.unwrap();

        let sid = arena.create_game(a, GameKind::Pong).await.unwrap();
        arena.join_game(b, sid).await.unwrap();
        Arc::clone(&arena).disconnect(b).await;

        assert_eq!(arena.session_count().await, 1);
        arena.sweep().await;
        assert_eq!(arena.session_count().await, 0);
    }
}
