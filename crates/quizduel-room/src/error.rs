//! Error types for the room layer.

use quizduel_protocol::{ErrorKind, RoomCode, UserId};
use quizduel_questions::GenerationError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The user is not a player in this room.
    #[error("player {0} is not in room {1}")]
    PlayerNotFound(UserId, RoomCode),

    /// The room is full; no more player slots available.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The room has left the waiting state and takes no new players.
    #[error("game in room {0} has already started")]
    GameAlreadyStarted(RoomCode),

    /// A host-only action was requested by someone else.
    #[error("only the host can do that")]
    NotHost,

    /// Not enough players to start a game.
    #[error("at least {required} players are needed to start")]
    InsufficientPlayers { required: usize },

    /// The room is in a state that doesn't allow this operation.
    /// For example, submitting an answer while the room is still waiting.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    #[error("already answered round {0}")]
    AlreadyAnswered(u32),

    /// The submission names a round other than the current one.
    #[error("round {got} is not the current round ({current})")]
    StaleRound { got: u32, current: u32 },

    /// A manual advance before everyone answered and before time ran out.
    #[error("round {0} is still running")]
    RoundNotReady(u32),

    /// The submission breaks the current question's answer rules.
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    /// Questions for the game could not be produced.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The room's actor has stopped (room deleted while the call was in flight).
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// Wire classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoomNotFound(_) | Self::Unavailable(_) => ErrorKind::RoomNotFound,
            Self::PlayerNotFound(..) => ErrorKind::PlayerNotFound,
            Self::RoomFull(_) => ErrorKind::RoomFull,
            Self::GameAlreadyStarted(_) => ErrorKind::GameAlreadyStarted,
            Self::NotHost => ErrorKind::NotHost,
            Self::InsufficientPlayers { .. } => ErrorKind::InsufficientPlayers,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::AlreadyAnswered(_) => ErrorKind::AlreadyAnswered,
            Self::StaleRound { .. } => ErrorKind::StaleRound,
            Self::RoundNotReady(_) => ErrorKind::RoundNotReady,
            Self::InvalidSubmission(_) => ErrorKind::InvalidInput,
            Self::Generation(e) => e.kind(),
        }
    }
}
