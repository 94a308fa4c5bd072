//! Wire protocol and common types shared between the arena server and clients.
//!
//! The protocol is textual: one JSON object per logical event, tagged by a
//! `type` field. Clients send [`ClientMessage`] values, the server answers
//! with [`ServerMessage`] values. Game state travels as an opaque
//! `serde_json::Value` snapshot; only the game modules on the server
//! interpret its contents.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque identifier for one client connection. Never reused within a
/// server's lifetime.
pub type ClientId = u64;

/// Identifier for one game session.
pub type SessionId = u64;

/// The game variants the arena can host.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Snake,
    Pong,
    Tetris,
}

impl GameKind {
    /// Minimum participants required before a session starts running.
    pub fn min_players(&self) -> usize {
        2
    }

    /// Maximum participants a session of this kind may hold.
    ///
    /// All three variants are head-to-head duels; the bound is per-kind so
    /// that other arities can be added without touching session logic.
    pub fn max_players(&self) -> usize {
        2
    }

    pub fn label(&self) -> &'static str {
        match self {
            GameKind::Snake => "snake",
            GameKind::Pong => "pong",
            GameKind::Tetris => "tetris",
        }
    }
}

/// Lifecycle state of a session. Transitions are one-way:
/// WaitingForPlayers -> Running -> Ended.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    WaitingForPlayers,
    Running,
    Ended,
}

/// How a session concluded.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A participant won under the game's own rules.
    Winner { client_id: ClientId },
    /// The session dropped below its minimum viable participant count.
    Abandoned,
}

/// Machine-readable error codes reported to clients and command-interface
/// callers. One code per failure class; the server's error module maps its
/// internal errors onto these.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    CapacityExceeded,
    AlreadyFull,
    AlreadyStarted,
    NotParticipant,
    NotRunning,
    InvalidMove,
    SendFailed,
    Unavailable,
    BadCommand,
}

/// Messages a client sends to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new session of the given kind; the sender becomes the first
    /// participant.
    Create { game_kind: GameKind },
    /// Join an existing session.
    Join { session_id: SessionId },
    /// Submit a move for a running session. The payload shape is
    /// game-specific and validated by the game module.
    Move {
        session_id: SessionId,
        payload: serde_json::Value,
    },
    /// Liveness probe; answered with `pong`.
    Ping,
}

/// Messages the server sends to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection; tells the client its identity.
    Welcome { client_id: ClientId },
    /// A session's current state snapshot.
    State {
        session_id: SessionId,
        state: serde_json::Value,
    },
    /// Final broadcast for a session that reached Ended.
    SessionEnded {
        session_id: SessionId,
        outcome: Outcome,
        state: serde_json::Value,
    },
    /// An operation failed; delivered only to the client that caused it.
    Error { code: ErrorCode, message: String },
    Pong,
}

/// Durable summary of one completed session, handed to the persistence
/// adapter at teardown. Its absence never blocks teardown.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PersistenceRecord {
    pub session_id: SessionId,
    pub game_kind: GameKind,
    pub participants: Vec<ClientId>,
    pub outcome: Outcome,
    pub duration: Duration,
}

/// Aggregated per-player statistics served by the persistence adapter.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerStats {
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
}
