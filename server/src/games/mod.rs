//! Game rule variants hosted by the arena.
//!
//! Every variant shares one external contract (apply a participant's move,
//! advance time, produce a broadcastable snapshot, report a winner) while
//! keeping its rules to itself. The session store drives games exclusively
//! through [`GameState`], so adding a variant means adding an enum arm and
//! nothing else.
//!
//! Rule fidelity note: an invalid or malformed move is an error for the
//! sender only. It never mutates state and never ends the session.

pub mod pong;
pub mod snake;
pub mod tetris;

use crate::error::ArenaError;
use shared::{ClientId, GameKind};

pub use pong::PongGame;
pub use snake::SnakeGame;
pub use tetris::TetrisGame;

/// Tagged union over the supported game rule sets.
#[derive(Debug, Clone)]
pub enum GameState {
    Snake(SnakeGame),
    Pong(PongGame),
    Tetris(TetrisGame),
}

impl GameState {
    /// Builds the initial state for a session that just started running.
    /// `players` is the session's participant list in join order; its length
    /// must match the kind's arity.
    pub fn new(kind: GameKind, players: &[ClientId]) -> Self {
        assert_eq!(
            players.len(),
            kind.max_players(),
            "participant count must match the game's arity"
        );
        let players = [players[0], players[1]];
        match kind {
            GameKind::Snake => GameState::Snake(SnakeGame::new(players)),
            GameKind::Pong => GameState::Pong(PongGame::new(players)),
            GameKind::Tetris => GameState::Tetris(TetrisGame::new(players)),
        }
    }

    /// Applies one player's move. `InvalidMove` leaves the state untouched.
    pub fn apply_move(
        &mut self,
        client_id: ClientId,
        payload: &serde_json::Value,
    ) -> Result<(), ArenaError> {
        match self {
            GameState::Snake(game) => game.apply_move(client_id, payload),
            GameState::Pong(game) => game.apply_move(client_id, payload),
            GameState::Tetris(game) => game.apply_move(client_id, payload),
        }
    }

    /// Advances time-driven rules by one server tick, returning whether the
    /// state changed. Only Pong has continuous motion; the move-driven games
    /// report no change.
    pub fn tick(&mut self) -> bool {
        match self {
            GameState::Pong(game) if game.winner().is_none() => {
                game.update_ball();
                true
            }
            _ => false,
        }
    }

    /// Complete game-specific state, suitable for broadcast to every
    /// participant.
    pub fn snapshot(&self) -> serde_json::Value {
        match self {
            GameState::Snake(game) => game.snapshot(),
            GameState::Pong(game) => game.snapshot(),
            GameState::Tetris(game) => game.snapshot(),
        }
    }

    /// The winning participant, once the game's own rules have decided one.
    pub fn winner(&self) -> Option<ClientId> {
        match self {
            GameState::Snake(game) => game.winner(),
            GameState::Pong(game) => game.winner(),
            GameState::Tetris(game) => game.winner(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.winner().is_some()
    }
}

/// Extracts a required string field from a move payload.
pub(crate) fn payload_str<'a>(
    payload: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, ArenaError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ArenaError::InvalidMove(format!("missing or non-string '{}'", field)))
}
