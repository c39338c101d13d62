//! Room store: the live rooms, keyed by code.

use std::collections::{HashMap, HashSet};

use quizduel_protocol::{RoomCode, UserId};
use rand::Rng;

use crate::{RoomError, RoomHandle};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

struct Entry {
    handle: RoomHandle,
    members: HashSet<UserId>,
}

/// In-memory collection of live rooms plus a membership index.
///
/// A plain keyed container: the [`crate::RoomManager`] serializes access
/// with a mutex, and each room serializes its own mutations in its actor.
#[derive(Default)]
pub struct RoomStore {
    rooms: HashMap<RoomCode, Entry>,
    /// Which rooms each user is seated in. Kept in sync with
    /// `Entry::members`.
    memberships: HashMap<UserId, HashSet<RoomCode>>,
    code_length: usize,
}

impl RoomStore {
    pub fn new(code_length: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            code_length,
        }
    }

    /// Allocates an unused code and registers the room `spawn` starts for it.
    pub fn create(&mut self, spawn: impl FnOnce(RoomCode) -> RoomHandle) -> RoomHandle {
        let length = self.code_length;
        self.create_with(|| random_code(length), spawn)
    }

    fn create_with(
        &mut self,
        mut next_code: impl FnMut() -> RoomCode,
        spawn: impl FnOnce(RoomCode) -> RoomHandle,
    ) -> RoomHandle {
        let code = loop {
            let candidate = next_code();
            match self.rooms.get(&candidate) {
                Some(entry) if !entry.handle.is_closed() => {
                    tracing::debug!(code = %candidate, "room code collision, retrying");
                }
                Some(_) => {
                    // A stopped room's code is free again.
                    self.remove(&candidate);
                    break candidate;
                }
                None => break candidate,
            }
        };

        let handle = spawn(code.clone());
        self.rooms.insert(
            code.clone(),
            Entry {
                handle: handle.clone(),
                members: HashSet::new(),
            },
        );
        tracing::info!(room = %code, rooms = self.rooms.len(), "room created");
        handle
    }

    /// Looks up a live room.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`] if no room has this code, or its actor
    /// has stopped (the stale entry is purged).
    pub fn get(&mut self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        match self.rooms.get(code) {
            Some(entry) if !entry.handle.is_closed() => Ok(entry.handle.clone()),
            Some(_) => {
                self.remove(code);
                Err(RoomError::RoomNotFound(code.clone()))
            }
            None => Err(RoomError::RoomNotFound(code.clone())),
        }
    }

    /// Deletes a room and its membership entries. Idempotent.
    pub fn remove(&mut self, code: &RoomCode) -> bool {
        let Some(entry) = self.rooms.remove(code) else {
            return false;
        };
        for user in &entry.members {
            self.unindex(user, code);
        }
        tracing::info!(room = %code, rooms = self.rooms.len(), "room removed");
        true
    }

    /// Records that `user` is seated in `code`.
    pub fn add_member(&mut self, code: &RoomCode, user: UserId) {
        if let Some(entry) = self.rooms.get_mut(code) {
            entry.members.insert(user.clone());
            self.memberships.entry(user).or_default().insert(code.clone());
        }
    }

    /// Records that `user` left `code`.
    pub fn remove_member(&mut self, code: &RoomCode, user: &UserId) {
        if let Some(entry) = self.rooms.get_mut(code) {
            entry.members.remove(user);
        }
        self.unindex(user, code);
    }

    fn unindex(&mut self, user: &UserId, code: &RoomCode) {
        if let Some(codes) = self.memberships.get_mut(user) {
            codes.remove(code);
            if codes.is_empty() {
                self.memberships.remove(user);
            }
        }
    }

    /// Codes of the live rooms `user` is seated in, sorted.
    pub fn rooms_of(&self, user: &UserId) -> Vec<RoomCode> {
        let mut codes: Vec<RoomCode> = self
            .memberships
            .get(user)
            .into_iter()
            .flatten()
            .filter(|code| self.rooms.get(*code).is_some_and(|e| !e.handle.is_closed()))
            .cloned()
            .collect();
        codes.sort();
        codes
    }

    /// Drops every room whose actor has stopped. Returns how many went.
    pub fn purge_closed(&mut self) -> usize {
        let closed: Vec<RoomCode> = self
            .rooms
            .iter()
            .filter(|(_, e)| e.handle.is_closed())
            .map(|(code, _)| code.clone())
            .collect();
        for code in &closed {
            self.remove(code);
        }
        closed.len()
    }

    /// Number of rooms in the store, including any not yet purged.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Every live room's handle.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms
            .values()
            .filter(|e| !e.handle.is_closed())
            .map(|e| e.handle.clone())
            .collect()
    }
}

fn random_code(length: usize) -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode::new(code)
}
