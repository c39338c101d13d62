//! Rooms for quizduel.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! [`Room`] state machine, its round timer and the connections of its
//! players.
//!
//! # Key types
//!
//! - [`Room`]: the pure state machine (join, start, answer, advance)
//! - [`RoomManager`]: creates rooms and routes operations to them
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomStore`]: the live rooms, keyed by code
//! - [`RoomConfig`]: round timing, seat limit and room expiry

mod actor;
mod config;
mod error;
mod manager;
mod notify;
mod room;
mod store;

pub use actor::RoomHandle;
pub use config::{PLAYERS_TO_START, RoomConfig};
pub use error::RoomError;
pub use manager::RoomManager;
pub use notify::{PlayerSender, snapshot};
pub use room::{
    AdvanceOutcome, AdvanceTrigger, AnswerRecord, JoinOutcome, LeaveOutcome, Player, Room, SubmitOutcome,
};
pub use store::RoomStore;
