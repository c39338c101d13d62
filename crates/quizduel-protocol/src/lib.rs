//! Wire protocol for quizduel.
//!
//! This crate defines the "language" that clients and the server speak
//! over the single WebSocket endpoint:
//!
//! - **Identity and lifecycle types** ([`UserId`], [`RoomCode`],
//!   [`Difficulty`], [`RoomStatus`]).
//! - **Request/response** ([`Request`], [`Operation`], [`Response`],
//!   [`Reply`], [`ErrorBody`]): every client call carries an id that the
//!   matching response echoes back.
//! - **Push events** ([`ServerEvent`]): room snapshots, deletions,
//!   answer confirmations, forced re-authentication.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become
//!   bytes.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Server (registry + rooms)
//! ```
//!
//! The protocol layer knows nothing about connections or room actors; it
//! only describes what travels on the wire.

mod codec;
mod error;
mod snapshot;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use snapshot::{PlayerView, QuestionView, RevealedQuestion, RoomSnapshot, millis};
pub use types::{
    Difficulty, Envelope, ErrorBody, ErrorKind, Operation, Payload, Reply, Request, Response,
    RoomCode, RoomStatus, ServerEvent, Submission, UserId,
};
