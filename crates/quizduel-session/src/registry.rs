//! The user registry: every anonymous identity issued by this process.
//!
//! # Concurrency note
//!
//! `UserRegistry` is NOT thread-safe by itself; it uses plain `HashMap`s.
//! The server owns one instance behind a mutex and never holds that lock
//! across an await on a room.

use std::collections::HashMap;

use quizduel_protocol::UserId;
use quizduel_transport::ConnectionId;
use rand::Rng;

use crate::user::{MAX_USERNAME_LEN, User};
use crate::SessionError;

/// Maps user ids to users, and live connections back to users.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ attach(conn) ──→ detach(conn) ──→ attach(conn')
///     │               │                │                │
///     ▼               ▼                ▼                ▼
///  [offline]       [online]        [offline]        [online]
/// ```
///
/// Users are kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct UserRegistry {
    /// All known users, keyed by id.
    users: HashMap<UserId, User>,

    /// Reverse index from a live connection to its owner, kept in sync with
    /// `User::connection`. Lets `detach` find the owner without scanning.
    connections: HashMap<ConnectionId, UserId>,
}

impl UserRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues or refreshes an anonymous identity.
    ///
    /// If `candidate` names a known user, that user is returned and its
    /// display name updated when a different, non-empty one is given.
    /// Otherwise a fresh id is minted. A user without any name gets a
    /// `Guest-NNNN` name. Never fails.
    pub fn register(&mut self, candidate: Option<&UserId>, display_name: Option<&str>) -> &User {
        let name = display_name.and_then(clean_display_name);
        let known = candidate.filter(|id| self.users.contains_key(*id)).cloned();

        let id = match known {
            Some(id) => {
                if let (Some(name), Some(user)) = (name, self.users.get_mut(&id)) {
                    if user.display_name != name {
                        tracing::info!(user = %id, from = %user.display_name, to = %name, "display name updated");
                        user.display_name = name;
                    }
                }
                id
            }
            None => {
                let id = self.mint_id();
                let user = User {
                    id: id.clone(),
                    display_name: name.unwrap_or_else(guest_name),
                    connection: None,
                };
                tracing::info!(user = %id, name = %user.display_name, "user registered");
                self.users.insert(id.clone(), user);
                id
            }
        };

        &self.users[&id]
    }

    /// Sets a validated display name on an existing user.
    ///
    /// # Errors
    /// - [`SessionError::UnknownUser`] if the id was never issued
    /// - [`SessionError::InvalidUsername`] if the name fails validation
    pub fn rename(&mut self, user_id: &UserId, name: &str) -> Result<&User, SessionError> {
        let name = crate::validate_username(name)?;
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| SessionError::UnknownUser(user_id.clone()))?;
        user.display_name = name;
        Ok(user)
    }

    /// Binds a live connection to a user.
    ///
    /// A user has at most one live connection; attaching a new one replaces
    /// the previous one (reconnect). A connection belongs to at most one
    /// user; re-attaching it to someone else unbinds the old owner.
    ///
    /// # Errors
    /// [`SessionError::UnknownUser`] if the id is unknown. The caller should
    /// ask the client to authenticate again.
    pub fn attach(&mut self, user_id: &UserId, connection: ConnectionId) -> Result<&User, SessionError> {
        if !self.users.contains_key(user_id) {
            tracing::warn!(user = %user_id, %connection, "attach for unknown user");
            return Err(SessionError::UnknownUser(user_id.clone()));
        }

        if let Some(previous_owner) = self.connections.insert(connection, user_id.clone()) {
            if &previous_owner != user_id {
                if let Some(owner) = self.users.get_mut(&previous_owner) {
                    if owner.connection == Some(connection) {
                        owner.connection = None;
                    }
                }
            }
        }

        if let Some(user) = self.users.get_mut(user_id) {
            if let Some(replaced) = user.connection.replace(connection) {
                if replaced != connection {
                    self.connections.remove(&replaced);
                    tracing::debug!(user = %user_id, %replaced, %connection, "connection replaced");
                }
            }
        }

        tracing::debug!(user = %user_id, %connection, "connection attached");
        Ok(&self.users[user_id])
    }

    /// Unbinds a connection that went away.
    ///
    /// Returns the user that owned it so the caller can run disconnect
    /// handling, or `None` if the connection was never attached (or was
    /// already replaced by a newer one).
    pub fn detach(&mut self, connection: ConnectionId) -> Option<UserId> {
        let user_id = self.connections.remove(&connection)?;
        if let Some(user) = self.users.get_mut(&user_id) {
            if user.connection == Some(connection) {
                user.connection = None;
            }
        }
        tracing::debug!(user = %user_id, %connection, "connection detached");
        Some(user_id)
    }

    /// The user currently bound to `connection`, if any.
    pub fn user_for_connection(&self, connection: ConnectionId) -> Option<&User> {
        self.connections
            .get(&connection)
            .and_then(|id| self.users.get(id))
    }

    /// Looks up a user by id.
    pub fn get(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id)
    }

    /// Number of users issued so far.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if no user was ever registered.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn mint_id(&self) -> UserId {
        loop {
            let id = UserId::new(generate_token());
            if !self.users.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Trims a client-supplied name; empty names are ignored and overlong
/// ones truncated, because `register` must never fail.
fn clean_display_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_USERNAME_LEN).collect())
}

fn guest_name() -> String {
    let n: u16 = rand::rng().random_range(1000..10000);
    format!("Guest-{n}")
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    //! Naming: `test_{function}_{scenario}_{expected}`.

    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[test]
    fn test_register_without_candidate_mints_id_and_guest_name() {
        let mut reg = UserRegistry::new();

        let user = reg.register(None, None).clone();

        assert_eq!(user.id.as_str().len(), 32);
        assert!(user.display_name.starts_with("Guest-"));
        assert!(!user.is_online());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_unknown_candidate_mints_new_id() {
        let mut reg = UserRegistry::new();
        let stale = UserId::new("from-before-restart");

        let user = reg.register(Some(&stale), Some("alice")).clone();

        assert_ne!(user.id, stale);
        assert_eq!(user.display_name, "alice");
    }

    #[test]
    fn test_register_known_candidate_is_idempotent() {
        let mut reg = UserRegistry::new();
        let id = reg.register(None, Some("alice")).id.clone();

        let again = reg.register(Some(&id), None).clone();

        assert_eq!(again.id, id);
        assert_eq!(again.display_name, "alice");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_known_candidate_updates_name() {
        let mut reg = UserRegistry::new();
        let id = reg.register(None, Some("alice")).id.clone();

        let user = reg.register(Some(&id), Some("  alicia ")).clone();

        assert_eq!(user.display_name, "alicia");
    }

    #[test]
    fn test_register_blank_name_falls_back_to_guest() {
        let mut reg = UserRegistry::new();
        let user = reg.register(None, Some("   ")).clone();
        assert!(user.display_name.starts_with("Guest-"));
    }

    #[test]
    fn test_register_truncates_long_name() {
        let mut reg = UserRegistry::new();
        let user = reg.register(None, Some(&"n".repeat(100))).clone();
        assert_eq!(user.display_name.chars().count(), MAX_USERNAME_LEN);
    }

    // =====================================================================
    // rename()
    // =====================================================================

    #[test]
    fn test_rename_unknown_user_returns_unknown_user() {
        let mut reg = UserRegistry::new();
        let result = reg.rename(&UserId::new("nobody"), "alice");
        assert!(matches!(result, Err(SessionError::UnknownUser(_))));
    }

    #[test]
    fn test_rename_short_name_returns_invalid_username() {
        let mut reg = UserRegistry::new();
        let id = reg.register(None, None).id.clone();
        let err = reg.rename(&id, "ab").unwrap_err();
        assert_eq!(err.kind(), quizduel_protocol::ErrorKind::InvalidInput);
    }

    // =====================================================================
    // attach() / detach()
    // =====================================================================

    #[test]
    fn test_attach_unknown_user_returns_error() {
        let mut reg = UserRegistry::new();
        let result = reg.attach(&UserId::new("ghost"), conn(1));
        assert!(matches!(result, Err(SessionError::UnknownUser(_))));
        assert!(reg.user_for_connection(conn(1)).is_none());
    }

    #[test]
    fn test_attach_then_lookup_by_connection() {
        let mut reg = UserRegistry::new();
        let id = reg.register(None, Some("alice")).id.clone();

        reg.attach(&id, conn(1)).unwrap();

        assert_eq!(reg.user_for_connection(conn(1)).unwrap().id, id);
        assert!(reg.get(&id).unwrap().is_online());
    }

    #[test]
    fn test_attach_new_connection_replaces_previous() {
        let mut reg = UserRegistry::new();
        let id = reg.register(None, None).id.clone();
        reg.attach(&id, conn(1)).unwrap();

        reg.attach(&id, conn(2)).unwrap();

        assert_eq!(reg.get(&id).unwrap().connection, Some(conn(2)));
        assert!(reg.user_for_connection(conn(1)).is_none());
        // The replaced socket closing later must not take the user offline.
        assert_eq!(reg.detach(conn(1)), None);
        assert!(reg.get(&id).unwrap().is_online());
    }

    #[test]
    fn test_attach_connection_to_other_user_unbinds_previous_owner() {
        let mut reg = UserRegistry::new();
        let a = reg.register(None, None).id.clone();
        let b = reg.register(None, None).id.clone();
        reg.attach(&a, conn(1)).unwrap();

        reg.attach(&b, conn(1)).unwrap();

        assert!(!reg.get(&a).unwrap().is_online());
        assert_eq!(reg.user_for_connection(conn(1)).unwrap().id, b);
    }

    #[test]
    fn test_detach_returns_owner_and_clears_connection() {
        let mut reg = UserRegistry::new();
        let id = reg.register(None, None).id.clone();
        reg.attach(&id, conn(5)).unwrap();

        assert_eq!(reg.detach(conn(5)), Some(id.clone()));
        assert!(!reg.get(&id).unwrap().is_online());
    }

    #[test]
    fn test_detach_unknown_connection_is_noop() {
        let mut reg = UserRegistry::new();
        reg.register(None, None);
        assert_eq!(reg.detach(conn(99)), None);
    }

    #[test]
    fn test_detach_twice_is_noop_second_time() {
        let mut reg = UserRegistry::new();
        let id = reg.register(None, None).id.clone();
        reg.attach(&id, conn(3)).unwrap();

        assert!(reg.detach(conn(3)).is_some());
        assert!(reg.detach(conn(3)).is_none());
    }
}
