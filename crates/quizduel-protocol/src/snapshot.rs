//! Client-safe projection of a room.
//!
//! A [`RoomSnapshot`] is what every attached client receives after each
//! room mutation. It never carries correct answers while a game is being
//! played; `results` is only filled in once the room is finished.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Difficulty, RoomCode, RoomStatus, UserId};

/// Per-player view inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: UserId,
    pub display_name: String,
    pub score: u32,
    pub has_answered_current_round: bool,
}

/// The current question as shown to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub prompt: String,
    /// Present for multiple-choice questions.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<Vec<String>>,
    /// How many distinct answers the question accepts; greater than one
    /// for "name N items" questions.
    pub expected_answers: usize,
}

/// A question with its answers, revealed after the game ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedQuestion {
    pub prompt: String,
    pub correct_answers: Vec<String>,
}

/// Everything a client needs to render a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub host_id: Option<UserId>,
    pub status: RoomStatus,
    pub difficulty: Difficulty,
    /// `true` while the host's start request is waiting on the generator.
    pub starting: bool,
    pub current_round_number: u32,
    pub max_rounds: u32,
    pub round_duration_ms: u64,
    /// Time left in the current round, counting any lead-in.
    pub round_remaining_ms: Option<u64>,
    pub players: Vec<PlayerView>,
    pub question: Option<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub results: Option<Vec<RevealedQuestion>>,
}

/// A duration as whole wire milliseconds, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl RoomSnapshot {
    /// Looks up one player's view by id.
    pub fn player(&self, id: &UserId) -> Option<&PlayerView> {
        self.players.iter().find(|p| &p.id == id)
    }
}
