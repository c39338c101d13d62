//! Error types for the session layer.

use quizduel_protocol::{ErrorKind, UserId};

/// Errors that can occur while managing users.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No user with this id was ever registered in this process.
    /// Clients that see this after a server restart must authenticate again.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// The requested display name breaks the length rules.
    #[error("invalid username: {0}")]
    InvalidUsername(String),
}

impl SessionError {
    /// Wire classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownUser(_) => ErrorKind::NotFound,
            Self::InvalidUsername(_) => ErrorKind::InvalidInput,
        }
    }
}
