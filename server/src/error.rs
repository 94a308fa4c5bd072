//! Arena error taxonomy.
//!
//! Every failure the session core can produce is one of these variants, and
//! none of them is allowed to terminate the process. Errors are reported to
//! the caller that provoked them (and only that caller); `SendFailed` also
//! feeds the offending client's disconnect path.

use shared::{ClientId, ErrorCode, ServerMessage, SessionId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArenaError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("client {0} not found")]
    ClientNotFound(ClientId),

    #[error("client {0} already occupies a session")]
    AlreadyInSession(ClientId),

    #[error("session {0} is already full")]
    AlreadyFull(SessionId),

    #[error("session {0} has already started")]
    AlreadyStarted(SessionId),

    #[error("client {client_id} is not a participant of session {session_id}")]
    NotParticipant {
        session_id: SessionId,
        client_id: ClientId,
    },

    #[error("session {0} is not running")]
    NotRunning(SessionId),

    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("failed to send to client {0}")]
    SendFailed(ClientId),

    #[error("persistence store unavailable")]
    Unavailable,

    #[error("bad command: {0}")]
    BadCommand(String),
}

impl ArenaError {
    /// Wire-level code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ArenaError::SessionNotFound(_) | ArenaError::ClientNotFound(_) => ErrorCode::NotFound,
            ArenaError::AlreadyInSession(_) => ErrorCode::CapacityExceeded,
            ArenaError::AlreadyFull(_) => ErrorCode::AlreadyFull,
            ArenaError::AlreadyStarted(_) => ErrorCode::AlreadyStarted,
            ArenaError::NotParticipant { .. } => ErrorCode::NotParticipant,
            ArenaError::NotRunning(_) => ErrorCode::NotRunning,
            ArenaError::InvalidMove(_) => ErrorCode::InvalidMove,
            ArenaError::SendFailed(_) => ErrorCode::SendFailed,
            ArenaError::Unavailable => ErrorCode::Unavailable,
            ArenaError::BadCommand(_) => ErrorCode::BadCommand,
        }
    }

    /// Error response addressed to the client that caused this failure.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Error {
            code: self.code(),
            message: self.to_string(),
        }
    }
}
