//! The user record and display-name rules.

use quizduel_protocol::UserId;
use quizduel_transport::ConnectionId;

use crate::SessionError;

/// Shortest display name a user may pick explicitly.
pub const MIN_USERNAME_LEN: usize = 3;

/// Longest display name kept; longer names are rejected on rename and
/// truncated on register.
pub const MAX_USERNAME_LEN: usize = 24;

/// A user known to this process.
///
/// Users are never deleted; only their live connection comes and goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    /// At most one live connection. `None` while the user is offline.
    pub connection: Option<ConnectionId>,
}

impl User {
    /// Whether a live connection is currently attached.
    pub fn is_online(&self) -> bool {
        self.connection.is_some()
    }
}

/// Checks an explicitly chosen display name and returns it trimmed.
///
/// # Errors
/// [`SessionError::InvalidUsername`] if the trimmed name has fewer than
/// [`MIN_USERNAME_LEN`] or more than [`MAX_USERNAME_LEN`] characters.
pub fn validate_username(name: &str) -> Result<String, SessionError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len < MIN_USERNAME_LEN {
        return Err(SessionError::InvalidUsername(format!(
            "must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if len > MAX_USERNAME_LEN {
        return Err(SessionError::InvalidUsername(format!(
            "must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_trims() {
        assert_eq!(validate_username("  alice ").unwrap(), "alice");
    }

    #[test]
    fn test_validate_username_too_short() {
        assert!(matches!(
            validate_username(" ab "),
            Err(SessionError::InvalidUsername(_))
        ));
    }

    #[test]
    fn test_validate_username_too_long() {
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(validate_username(&long).is_err());
    }
}
