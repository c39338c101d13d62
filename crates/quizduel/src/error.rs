//! Unified error type for the quizduel server.

use quizduel_protocol::{ErrorBody, ErrorKind, ProtocolError};
use quizduel_questions::GenerationError;
use quizduel_room::RoomError;
use quizduel_session::SessionError;
use quizduel_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizduelError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An identity error (unknown user, bad username).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The question generator gave up.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A room-level error (full, not found, wrong state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Startup configuration is malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The connection has no identity bound to it yet.
    #[error("connection is not authenticated")]
    Unauthenticated,
}

impl QuizduelError {
    /// The wire taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Session(e) => e.kind(),
            Self::Generation(e) => e.kind(),
            Self::Room(e) => e.kind(),
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Protocol(_) | Self::Transport(_) | Self::Config(_) => ErrorKind::InvalidInput,
        }
    }

    /// The `{kind, code, message}` body sent to the caller.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use quizduel_protocol::{RoomCode, UserId};

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let quizduel_err: QuizduelError = err.into();
        assert!(matches!(quizduel_err, QuizduelError::Transport(_)));
        assert!(quizduel_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_session_error_keeps_kind() {
        let err: QuizduelError = SessionError::UnknownUser(UserId::new("ghost")).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_room_error_body_carries_code() {
        let err: QuizduelError = RoomError::RoomFull(RoomCode::new("ABC123")).into();
        let body = err.to_body();
        assert_eq!(body.kind, ErrorKind::RoomFull);
        assert_eq!(body.code, 409);
        assert!(body.message.contains("ABC123"));
    }

    #[test]
    fn test_generation_error_maps_to_bad_gateway() {
        let err: QuizduelError = GenerationError::MissingCredential.into();
        assert_eq!(err.to_body().code, 502);
    }

    #[test]
    fn test_unauthenticated_body() {
        let body = QuizduelError::Unauthenticated.to_body();
        assert_eq!(body.kind, ErrorKind::Unauthenticated);
        assert_eq!(body.code, 401);
    }
}
