//! Inbound message dispatch.
//!
//! Turns one raw text frame into a typed command and routes it into the
//! arena. Anything unparseable is a `BadCommand` error answered to the
//! sender only; other clients and sessions never see it.

use crate::arena::Arena;
use crate::error::ArenaError;
use log::debug;
use shared::{ClientId, ClientMessage, ServerMessage};
use std::sync::Arc;

/// Handles one inbound frame from `client_id`. Every failure path ends in
/// an error response to that client; nothing propagates to the caller.
pub async fn handle_text(arena: &Arc<Arena>, client_id: ClientId, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Bad command from client {}: {}", client_id, e);
            let err = ArenaError::BadCommand(e.to_string());
            arena.send(client_id, err.to_message()).await;
            return;
        }
    };

    let result = match message {
        ClientMessage::Create { game_kind } => {
            arena.create_game(client_id, game_kind).await.map(|_| ())
        }
        ClientMessage::Join { session_id } => {
            arena.join_game(client_id, session_id).await.map(|_| ())
        }
        ClientMessage::Move {
            session_id,
            payload,
        } => arena.submit_move(client_id, session_id, &payload).await,
        ClientMessage::Ping => {
            arena.send(client_id, ServerMessage::Pong).await;
            Ok(())
        }
    };

    if let Err(e) = result {
        arena.send(client_id, e.to_message()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;
    use crate::persist::MemoryStore;
    use shared::ErrorCode;
    use tokio::sync::mpsc::Receiver;

    async fn setup() -> (Arc<Arena>, ClientId, Receiver<ServerMessage>) {
        let arena = Arena::new(ArenaConfig::default(), Arc::new(MemoryStore::new()));
        let (id, mut rx) = arena.connect_external().await.unwrap();
        rx.try_recv().unwrap(); // welcome
        (arena, id, rx)
    }

    #[tokio::test]
    async fn test_ping_answers_pong() {
        let (arena, id, mut rx) = setup().await;

        handle_text(&arena, id, r#"{"type":"ping"}"#).await;
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Pong);
    }

    #[tokio::test]
    async fn test_create_responds_with_state() {
        let (arena, id, mut rx) = setup().await;

        handle_text(&arena, id, r#"{"type":"create","game_kind":"tetris"}"#).await;

        match rx.try_recv().unwrap() {
            ServerMessage::State { state, .. } => {
                assert_eq!(state["game_kind"], "tetris");
                assert_eq!(state["status"], "waiting_for_players");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_yields_bad_command_to_sender_only() {
        let (arena, id, mut rx) = setup().await;
        let (other, mut rx_other) = arena.connect_external().await.unwrap();
        rx_other.try_recv().unwrap(); // welcome
        let _ = other;

        handle_text(&arena, id, "}{ definitely not json").await;

        match rx.try_recv().unwrap() {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::BadCommand),
            other => panic!("unexpected message {:?}", other),
        }
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_type_is_bad_command() {
        let (arena, id, mut rx) = setup().await;

        handle_text(&arena, id, r#"{"type":"teleport"}"#).await;

        match rx.try_recv().unwrap() {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::BadCommand),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_operation_errors_become_responses() {
        let (arena, id, mut rx) = setup().await;

        handle_text(&arena, id, r#"{"type":"join","session_id":12345}"#).await;

        match rx.try_recv().unwrap() {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotFound),
            other => panic!("unexpected message {:?}", other),
        }
    }
}
