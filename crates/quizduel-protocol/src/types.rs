//! Core protocol types for quizduel's wire format.
//!
//! Every type here is serialized to JSON and sent over the WebSocket.
//! Field and tag names are camelCase so browser clients can use them
//! as-is.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RoomSnapshot;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of an anonymous user.
///
/// Minted by the user registry and handed back to the client, which
/// presents it again on reconnect. `#[serde(transparent)]` keeps it a
/// plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short public code that identifies a live room.
///
/// Codes are uppercase alphanumeric. Anything a client sends is trimmed
/// and uppercased on the way in (`#[serde(from = "String")]`), so
/// `" ab12cd"` and `"AB12CD"` address the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Builds a code, normalizing case and surrounding whitespace.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Difficulty requested from the question generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// All difficulties, easiest first.
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => f.write_str("easy"),
            Self::Medium => f.write_str("medium"),
            Self::Hard => f.write_str("hard"),
        }
    }
}

// ---------------------------------------------------------------------------
// Room lifecycle
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly forward:
///
/// ```text
/// Waiting → Playing → Finished
/// ```
///
/// Deleting a room is not a state; the room simply stops existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while rounds are being played.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// The only state this one may move to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` follows the forward order.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("waiting"),
            Self::Playing => f.write_str("playing"),
            Self::Finished => f.write_str("finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors on the wire
// ---------------------------------------------------------------------------

/// What went wrong, as reported to the calling client.
///
/// `code` follows HTTP conventions so clients can bucket failures
/// without knowing every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    RoomNotFound,
    PlayerNotFound,
    InvalidState,
    NotHost,
    RoomFull,
    GameAlreadyStarted,
    InsufficientPlayers,
    AlreadyAnswered,
    StaleRound,
    RoundNotReady,
    GenerationError,
    InvalidInput,
}

impl ErrorKind {
    /// HTTP-style status code for this kind.
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::Unauthenticated => 401,
            Self::NotHost => 403,
            Self::NotFound | Self::RoomNotFound | Self::PlayerNotFound => 404,
            Self::InvalidState
            | Self::RoomFull
            | Self::GameAlreadyStarted
            | Self::InsufficientPlayers
            | Self::AlreadyAnswered
            | Self::StaleRound
            | Self::RoundNotReady => 409,
            Self::GenerationError => 502,
        }
    }
}

/// Structured error returned in a [`Response`] or pushed as
/// [`ServerEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub code: u16,
    pub message: String,
}

impl ErrorBody {
    /// Builds a body whose `code` is derived from `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A player's answer for one round.
///
/// Clients send either a single string (quiz and multiple-choice rounds)
/// or a list (the "name N items" rounds). Both are scored the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Submission {
    One(String),
    Many(Vec<String>),
}

impl Submission {
    /// Flattens the submission into its raw values.
    pub fn into_values(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// A client call. Every operation except `authenticate`,
/// `registerConnection` and `heartbeat` requires the connection to be
/// bound to a known user first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Operation {
    /// Issue (or refresh) an anonymous identity and bind this connection.
    Authenticate {
        user_id: Option<UserId>,
        username: Option<String>,
    },
    UpdateUsername {
        username: String,
    },
    /// Bind this connection to an identity issued earlier.
    RegisterConnection {
        user_id: UserId,
    },
    CreateRoom {
        username: Option<String>,
        #[serde(default)]
        difficulty: Difficulty,
    },
    JoinRoom {
        room_code: RoomCode,
        username: Option<String>,
    },
    LeaveRoom {
        room_code: RoomCode,
    },
    StartGame {
        room_code: RoomCode,
    },
    SubmitAnswer {
        room_code: RoomCode,
        round_number: u32,
        submission: Submission,
    },
    AdvanceRound {
        room_code: RoomCode,
    },
    Heartbeat {
        client_time: u64,
    },
}

/// A client call with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub op: Operation,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Successful result of an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Reply {
    Identity { user_id: UserId, username: String },
    RoomJoined { room_code: RoomCode },
    AnswerScored { score_earned: u32 },
    HeartbeatAck { client_time: u64, server_time: u64 },
    Ack,
}

/// Answer to exactly one [`Request`], matched by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<Reply, ErrorBody>,
}

/// Unsolicited server pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Fresh client-safe view of a room the receiver is attached to.
    RoomUpdate(RoomSnapshot),
    /// The room no longer exists.
    RoomDeleted { room_code: RoomCode, reason: String },
    /// Point-to-point confirmation for the submitter.
    AnswerSubmittedConfirmation {
        room_code: RoomCode,
        round_number: u32,
        score_earned: u32,
    },
    /// A frame could not be processed and has no request id to answer.
    Error(ErrorBody),
    /// The presented identity is unknown; the client must authenticate again.
    ForceReauthenticate,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What an envelope carries.
///
/// Adjacently tagged: `{ "type": "request", "data": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Payload {
    Request(Request),
    Response(Response),
    Event(ServerEvent),
}

/// The top-level frame. Every message on the wire is an Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number.
    pub seq: u64,
    /// Milliseconds since the sender's session started.
    pub timestamp: u64,
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
