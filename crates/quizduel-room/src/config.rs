//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A duel needs exactly this many players to start.
pub const PLAYERS_TO_START: usize = 2;

/// Settings shared by every room of a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum players allowed in a room. Never more than two.
    pub max_players: usize,

    /// How long each round accepts answers.
    pub round_duration: Duration,

    /// Countdown before round 1 so clients can sync their timers.
    pub lead_in: Duration,

    /// Questions fetched per game; also the number of rounds.
    pub question_count: usize,

    /// How long a finished room lingers for its results view before it
    /// is deleted.
    pub finished_room_ttl: Duration,

    /// Length of generated room codes.
    pub code_length: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 2,
            round_duration: Duration::from_secs(15),
            lead_in: Duration::from_secs(3),
            question_count: 5,
            finished_room_ttl: Duration::from_secs(300),
            code_length: 6,
        }
    }
}

impl RoomConfig {
    pub const MIN_CODE_LENGTH: usize = 4;
    pub const MAX_CODE_LENGTH: usize = 12;

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Rules:
    /// - `max_players` clamped to `1..=2`.
    /// - `question_count` at least 1.
    /// - `round_duration` at least one second.
    /// - `code_length` clamped to [`Self::MIN_CODE_LENGTH`]`..=`[`Self::MAX_CODE_LENGTH`].
    pub fn validated(mut self) -> Self {
        if !(1..=PLAYERS_TO_START).contains(&self.max_players) {
            let clamped = self.max_players.clamp(1, PLAYERS_TO_START);
            tracing::warn!(requested = self.max_players, clamped, "max_players out of range, clamping");
            self.max_players = clamped;
        }
        if self.question_count == 0 {
            tracing::warn!("question_count 0 is invalid, using 1");
            self.question_count = 1;
        }
        if self.round_duration < Duration::from_secs(1) {
            tracing::warn!(requested_ms = quizduel_protocol::millis(self.round_duration), "round_duration too short, using 1s");
            self.round_duration = Duration::from_secs(1);
        }
        self.code_length = self.code_length.clamp(Self::MIN_CODE_LENGTH, Self::MAX_CODE_LENGTH);
        self
    }
}
