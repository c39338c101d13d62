//! Room manager: creates rooms, routes operations to them, and keeps the
//! store's membership index in step with what the rooms report.

use std::sync::Arc;

use quizduel_protocol::{Difficulty, RoomCode, RoomSnapshot, UserId};
use quizduel_questions::{QuestionSetProvider, QuestionSource};
use tokio::sync::Mutex;

use crate::actor::spawn_room;
use crate::room::LeaveOutcome;
use crate::{PlayerSender, RoomConfig, RoomError, RoomHandle, RoomStore};

/// Entry point for room operations from the connection layer.
///
/// The store lock is only held for lookups and index updates, never
/// while waiting on a room actor, so a slow room cannot stall the others.
pub struct RoomManager<Q: QuestionSource> {
    store: Mutex<RoomStore>,
    provider: Arc<QuestionSetProvider<Q>>,
    config: RoomConfig,
}

impl<Q: QuestionSource> RoomManager<Q> {
    pub fn new(provider: QuestionSetProvider<Q>, config: RoomConfig) -> Self {
        let config = config.validated();
        Self {
            store: Mutex::new(RoomStore::new(config.code_length)),
            provider: Arc::new(provider),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    async fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.store.lock().await.get(code)
    }

    /// Creates a waiting room with `host` seated as its host.
    pub async fn create_room(
        &self,
        host: UserId,
        display_name: String,
        difficulty: Difficulty,
        sender: PlayerSender,
    ) -> Result<RoomCode, RoomError> {
        let mut store = self.store.lock().await;
        let handle = store.create(|code| {
            spawn_room(
                code,
                host.clone(),
                display_name,
                sender,
                difficulty,
                self.config.clone(),
                Arc::clone(&self.provider),
            )
        });
        let code = handle.code().clone();
        store.add_member(&code, host);
        Ok(code)
    }

    /// Seats `user` in the room. Re-joining a room you are in only
    /// re-attaches your connection.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        user: UserId,
        display_name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let handle = self.handle(code).await?;
        handle.join(user.clone(), display_name, sender).await?;
        self.store.lock().await.add_member(code, user);
        Ok(())
    }

    /// Removes `user` from the room, deleting the room if it emptied.
    pub async fn leave_room(&self, code: &RoomCode, user: &UserId) -> Result<LeaveOutcome, RoomError> {
        let handle = self.handle(code).await?;
        let result = handle.leave(user.clone()).await;

        let mut store = self.store.lock().await;
        match &result {
            Ok(LeaveOutcome::Emptied) => {
                store.remove(code);
            }
            Ok(LeaveOutcome::Left { .. }) | Err(RoomError::PlayerNotFound(..)) => {
                store.remove_member(code, user);
            }
            Err(_) => {}
        }
        result
    }

    pub async fn start_game(&self, code: &RoomCode, requester: &UserId) -> Result<(), RoomError> {
        self.handle(code).await?.start(requester.clone()).await
    }

    /// Scores a submission; returns the points earned.
    pub async fn submit_answer(
        &self,
        code: &RoomCode,
        user: &UserId,
        round: u32,
        submission: Vec<String>,
    ) -> Result<u32, RoomError> {
        self.handle(code)
            .await?
            .submit(user.clone(), round, submission)
            .await
    }

    pub async fn advance_round(&self, code: &RoomCode, requester: &UserId) -> Result<(), RoomError> {
        self.handle(code).await?.advance(requester.clone()).await
    }

    pub async fn snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot, RoomError> {
        self.handle(code).await?.snapshot().await
    }

    /// Removes a disconnected user from every room they sit in.
    ///
    /// Safe to call more than once; a second call finds nothing to do.
    /// Returns the codes of the rooms that were left.
    pub async fn handle_disconnect(&self, user: &UserId) -> Vec<RoomCode> {
        let codes = self.rooms_of(user).await;
        let mut left = Vec::with_capacity(codes.len());
        for code in codes {
            match self.leave_room(&code, user).await {
                Ok(_) => left.push(code),
                Err(e) => {
                    tracing::debug!(room = %code, user = %user, error = %e, "disconnect cleanup skipped room");
                }
            }
        }
        if !left.is_empty() {
            tracing::info!(user = %user, rooms = left.len(), "removed disconnected user from rooms");
        }
        left
    }

    /// Points every room `user` sits in at a new connection.
    /// Returns the codes of the rooms that accepted it.
    pub async fn reattach(&self, user: &UserId, sender: PlayerSender) -> Vec<RoomCode> {
        let handles: Vec<RoomHandle> = {
            let mut store = self.store.lock().await;
            let codes = store.rooms_of(user);
            codes.iter().filter_map(|code| store.get(code).ok()).collect()
        };

        let mut attached = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(true) = handle.attach(user.clone(), sender.clone()).await {
                attached.push(handle.code().clone());
            }
        }
        attached
    }

    /// Codes of the live rooms `user` sits in.
    pub async fn rooms_of(&self, user: &UserId) -> Vec<RoomCode> {
        self.store.lock().await.rooms_of(user)
    }

    /// Number of live rooms. Rooms whose actor stopped on its own (a
    /// finished room expiring) are purged first.
    pub async fn room_count(&self) -> usize {
        let mut store = self.store.lock().await;
        let purged = store.purge_closed();
        if purged > 0 {
            tracing::debug!(purged, "purged stopped rooms");
        }
        store.len()
    }

    /// Shuts every room down, notifying their players.
    pub async fn shutdown(&self) {
        let handles = {
            let mut store = self.store.lock().await;
            let handles = store.handles();
            for handle in &handles {
                store.remove(handle.code());
            }
            handles
        };
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }
}
