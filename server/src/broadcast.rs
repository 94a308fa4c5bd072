//! Fan-out of session snapshots to participants.
//!
//! The router turns a session's current state into wire messages and pushes
//! them through the connection registry. Each recipient is independent: one
//! unreachable participant never blocks delivery to the rest, and the ids
//! that failed are returned so the arena can run their disconnect path.
//!
//! Per-session ordering: callers invoke the router while holding the
//! session's lock, and every client's outbound channel is FIFO, so a single
//! session's broadcasts arrive at every participant in production order.

use crate::connection::ConnectionRegistry;
use crate::session::Session;
use shared::{ClientId, Outcome, ServerMessage};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct BroadcastRouter {
    registry: Arc<RwLock<ConnectionRegistry>>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<RwLock<ConnectionRegistry>>) -> Self {
        Self { registry }
    }

    /// Pushes the session's current snapshot to every participant. Returns
    /// the ids that could not be reached.
    pub async fn state_update(&self, session: &Session) -> Vec<ClientId> {
        let message = ServerMessage::State {
            session_id: session.id,
            state: session.snapshot(),
        };
        self.registry
            .read()
            .await
            .broadcast(&session.participants, &message)
    }

    /// Pushes the final snapshot for a session that reached Ended.
    pub async fn session_ended(&self, session: &Session) -> Vec<ClientId> {
        let message = ServerMessage::SessionEnded {
            session_id: session.id,
            outcome: session.outcome.unwrap_or(Outcome::Abandoned),
            state: session.snapshot(),
        };
        self.registry
            .read()
            .await
            .broadcast(&session.participants, &message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::GameKind;
    use tokio::sync::mpsc;

    fn setup() -> (
        Arc<RwLock<ConnectionRegistry>>,
        BroadcastRouter,
    ) {
        let registry = Arc::new(RwLock::new(ConnectionRegistry::new(8)));
        let router = BroadcastRouter::new(Arc::clone(&registry));
        (registry, router)
    }

    #[tokio::test]
    async fn test_state_update_reaches_all_participants() {
        let (registry, router) = setup();

        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let (a, b) = {
            let mut reg = registry.write().await;
            (reg.register(tx1).unwrap(), reg.register(tx2).unwrap())
        };

        let mut session = Session::new(1, GameKind::Pong, a);
        session.participants.push(b);

        let failed = router.state_update(&session).await;
        assert!(failed.is_empty());

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv().unwrap() {
                ServerMessage::State { session_id, state } => {
                    assert_eq!(session_id, 1);
                    assert_eq!(state["game_kind"], "pong");
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_unreachable_participant_reported_not_fatal() {
        let (registry, router) = setup();

        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, rx2) = mpsc::channel(8);
        let (a, b) = {
            let mut reg = registry.write().await;
            (reg.register(tx1).unwrap(), reg.register(tx2).unwrap())
        };
        drop(rx2);

        let mut session = Session::new(1, GameKind::Snake, a);
        session.participants.push(b);

        let failed = router.state_update(&session).await;
        assert_eq!(failed, vec![b]);
        assert!(rx1.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_session_ended_defaults_to_abandoned() {
        let (registry, router) = setup();

        let (tx, mut rx) = mpsc::channel(8);
        let a = registry.write().await.register(tx).unwrap();

        let session = Session::new(4, GameKind::Tetris, a);
        router.session_ended(&session).await;

        match rx.try_recv().unwrap() {
            ServerMessage::SessionEnded {
                session_id,
                outcome,
                ..
            } => {
                assert_eq!(session_id, 4);
                assert_eq!(outcome, Outcome::Abandoned);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
