//! The room state machine.
//!
//! [`Room`] is plain data plus the rules for changing it. It never
//! spawns, sleeps or sends; callers pass the current instant in, which is
//! what makes every transition testable without a runtime. The room actor
//! ([`crate::RoomHandle`]) owns one `Room` and is its only writer.
//!
//! ```text
//!            begin_start ──→ [starting] ──complete_start──┐
//!               ▲               │ abort_start / leave      ▼
//! join/leave ─ waiting ◄────────┘                       playing ── advance ──┐
//!                                                          │   ▲             │
//!                                                          │   └─ next round ┘
//!                                  last round / solo ────► finished
//! ```

use std::collections::HashMap;
use std::time::Duration;

use quizduel_protocol::{Difficulty, RoomCode, RoomStatus, UserId};
use quizduel_questions::Question;
use tokio::time::Instant;

use crate::config::PLAYERS_TO_START;
use crate::{RoomConfig, RoomError};

/// A user's seat in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub user_id: UserId,
    pub display_name: String,
    pub score: u32,
    pub has_answered: bool,
}

impl Player {
    fn new(user_id: UserId, display_name: String) -> Self {
        Self {
            user_id,
            display_name,
            score: 0,
            has_answered: false,
        }
    }
}

/// One accepted submission for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub submission: Vec<String>,
    pub score_earned: u32,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// The user was already seated; nothing changed.
    AlreadyMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Players remain.
    Left {
        host_changed: bool,
        forced_finish: bool,
    },
    /// The last player left; the room must be deleted.
    Emptied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub score_earned: u32,
    /// Every player has now answered this round.
    pub round_complete: bool,
}

/// Who asked for a round to advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceTrigger {
    /// The host's explicit request. Only allowed once the round is over.
    Host(UserId),
    /// The last outstanding answer just came in.
    AllAnswered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    NextRound { round: u32 },
    Finished,
}

/// A two-player trivia room.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    difficulty: Difficulty,
    host: Option<UserId>,
    /// In join order; host reassignment picks the first.
    players: Vec<Player>,
    status: RoomStatus,

    max_players: usize,
    round_duration: Duration,
    lead_in: Duration,
    question_count: usize,

    questions: Vec<Question>,
    question_index: usize,
    /// 0 until the game starts, then 1-based.
    round_number: u32,
    /// When the current round opened for answers. `Some` only while playing.
    round_started: Option<Instant>,
    answers: HashMap<UserId, AnswerRecord>,

    /// Ticket of the start attempt waiting on the question generator.
    pending_start: Option<u64>,
    next_ticket: u64,
    finished_at: Option<Instant>,
}

impl Room {
    /// Creates a waiting room with `host` as its only player.
    pub fn new(
        code: RoomCode,
        host: UserId,
        host_name: String,
        difficulty: Difficulty,
        config: &RoomConfig,
    ) -> Self {
        Self {
            code,
            difficulty,
            host: Some(host.clone()),
            players: vec![Player::new(host, host_name)],
            status: RoomStatus::Waiting,
            max_players: config.max_players,
            round_duration: config.round_duration,
            lead_in: config.lead_in,
            question_count: config.question_count,
            questions: Vec::new(),
            question_index: 0,
            round_number: 0,
            round_started: None,
            answers: HashMap::new(),
            pending_start: None,
            next_ticket: 1,
            finished_at: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn host(&self) -> Option<&UserId> {
        self.host.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, user_id: &UserId) -> Option<&Player> {
        self.players.iter().find(|p| &p.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.player(user_id).is_some()
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    /// Whether a start attempt is waiting on the question generator.
    pub fn is_starting(&self) -> bool {
        self.pending_start.is_some()
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    /// Rounds in this game: the number of questions once started, the
    /// configured count before that.
    pub fn max_rounds(&self) -> u32 {
        if self.questions.is_empty() {
            u32::try_from(self.question_count).unwrap_or(u32::MAX)
        } else {
            u32::try_from(self.questions.len()).unwrap_or(u32::MAX)
        }
    }

    /// How many questions a start attempt must fetch.
    pub fn question_count(&self) -> usize {
        self.question_count
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// The question being played, if any.
    pub fn current_question(&self) -> Option<&Question> {
        if self.status.is_active() {
            self.questions.get(self.question_index)
        } else {
            None
        }
    }

    pub fn round_duration(&self) -> Duration {
        self.round_duration
    }

    pub fn round_started(&self) -> Option<Instant> {
        self.round_started
    }

    pub fn answers(&self) -> &HashMap<UserId, AnswerRecord> {
        &self.answers
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    /// Time until the current round closes, counting any lead-in.
    pub fn round_remaining(&self, now: Instant) -> Option<Duration> {
        self.round_started
            .map(|started| (started + self.round_duration).saturating_duration_since(now))
    }

    pub fn all_players_answered(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.has_answered)
    }

    fn round_elapsed(&self, now: Instant) -> bool {
        self.round_remaining(now).is_some_and(|left| left.is_zero())
    }

    fn player_mut(&mut self, user_id: &UserId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.user_id == user_id)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Seats a user.
    ///
    /// Joining a room you are already in succeeds without changes.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`] if every seat is taken
    /// - [`RoomError::GameAlreadyStarted`] if the room is no longer waiting
    pub fn join(&mut self, user_id: UserId, display_name: String) -> Result<JoinOutcome, RoomError> {
        if self.is_member(&user_id) {
            return Ok(JoinOutcome::AlreadyMember);
        }
        if self.players.len() >= self.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }
        if !self.status.is_joinable() {
            return Err(RoomError::GameAlreadyStarted(self.code.clone()));
        }

        self.players.push(Player::new(user_id, display_name));
        if self.host.is_none() {
            self.host = self.players.first().map(|p| p.user_id.clone());
        }
        Ok(JoinOutcome::Joined)
    }

    /// Removes a player.
    ///
    /// The earliest-joined remaining player inherits the host role. A
    /// game in progress cannot continue solo and is finished. A start
    /// attempt in flight is abandoned.
    ///
    /// # Errors
    /// [`RoomError::PlayerNotFound`] if the user is not seated here.
    pub fn leave(&mut self, user_id: &UserId, now: Instant) -> Result<LeaveOutcome, RoomError> {
        let index = self
            .players
            .iter()
            .position(|p| &p.user_id == user_id)
            .ok_or_else(|| RoomError::PlayerNotFound(user_id.clone(), self.code.clone()))?;

        self.players.remove(index);
        self.answers.remove(user_id);

        if self.players.is_empty() {
            self.host = None;
            self.pending_start = None;
            self.round_started = None;
            return Ok(LeaveOutcome::Emptied);
        }

        let host_changed = self.host.as_ref() == Some(user_id);
        if host_changed {
            self.host = self.players.first().map(|p| p.user_id.clone());
        }

        if self.players.len() < PLAYERS_TO_START {
            self.pending_start = None;
        }

        let forced_finish = self.status.is_active() && self.players.len() < PLAYERS_TO_START;
        if forced_finish {
            self.finish(now);
        }

        Ok(LeaveOutcome::Left {
            host_changed,
            forced_finish,
        })
    }

    // -----------------------------------------------------------------------
    // Starting
    // -----------------------------------------------------------------------

    /// First half of starting a game: checks preconditions and enters the
    /// starting sub-state. Returns a ticket that the generator's result
    /// must present to [`Room::complete_start`].
    ///
    /// # Errors
    /// In this order: [`RoomError::NotHost`],
    /// [`RoomError::InsufficientPlayers`], [`RoomError::InvalidState`]
    /// (not waiting, or a start is already in flight).
    pub fn begin_start(&mut self, requester: &UserId) -> Result<u64, RoomError> {
        if self.host.as_ref() != Some(requester) {
            return Err(RoomError::NotHost);
        }
        if self.players.len() < PLAYERS_TO_START {
            return Err(RoomError::InsufficientPlayers {
                required: PLAYERS_TO_START,
            });
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::InvalidState(format!("cannot start a game that is {}", self.status)));
        }
        if self.pending_start.is_some() {
            return Err(RoomError::InvalidState("game is already starting".into()));
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending_start = Some(ticket);
        Ok(ticket)
    }

    /// Second half of starting a game: installs the fetched questions and
    /// opens round 1 after the lead-in.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] if `ticket` is not the current start
    ///   attempt (abandoned or superseded), or no questions were supplied
    /// - [`RoomError::InsufficientPlayers`] if a player left meanwhile
    pub fn complete_start(&mut self, ticket: u64, questions: Vec<Question>, now: Instant) -> Result<(), RoomError> {
        if self.pending_start != Some(ticket) {
            return Err(RoomError::InvalidState("start attempt is no longer current".into()));
        }
        self.pending_start = None;

        if self.status != RoomStatus::Waiting {
            return Err(RoomError::InvalidState(format!("cannot start a game that is {}", self.status)));
        }
        if self.players.len() < PLAYERS_TO_START {
            return Err(RoomError::InsufficientPlayers {
                required: PLAYERS_TO_START,
            });
        }
        if questions.is_empty() {
            return Err(RoomError::InvalidState("no questions to play".into()));
        }

        self.questions = questions;
        self.question_index = 0;
        self.round_number = 1;
        self.answers.clear();
        for player in &mut self.players {
            player.score = 0;
            player.has_answered = false;
        }
        self.round_started = Some(now + self.lead_in);
        self.status = RoomStatus::Playing;
        Ok(())
    }

    /// Abandons a start attempt after the generator failed. Returns
    /// `false` if `ticket` was not the current attempt.
    pub fn abort_start(&mut self, ticket: u64) -> bool {
        if self.pending_start == Some(ticket) {
            self.pending_start = None;
            true
        } else {
            false
        }
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    /// Scores and records one player's answer for the current round.
    ///
    /// # Errors
    /// In this order: [`RoomError::InvalidState`] (not playing),
    /// [`RoomError::StaleRound`], [`RoomError::InvalidState`] (round 1
    /// still in its lead-in), [`RoomError::PlayerNotFound`],
    /// [`RoomError::AlreadyAnswered`], [`RoomError::InvalidSubmission`].
    pub fn submit_answer(
        &mut self,
        user_id: &UserId,
        round: u32,
        submission: Vec<String>,
        now: Instant,
    ) -> Result<SubmitOutcome, RoomError> {
        if !self.status.is_active() {
            return Err(RoomError::InvalidState(format!("cannot answer while the room is {}", self.status)));
        }
        if round != self.round_number {
            return Err(RoomError::StaleRound {
                got: round,
                current: self.round_number,
            });
        }

        if self.round_started.is_some_and(|opens| now < opens) {
            return Err(RoomError::InvalidState(format!(
                "round {} has not opened yet",
                self.round_number
            )));
        }

        let current = self.round_number;
        match self.player(user_id) {
            None => return Err(RoomError::PlayerNotFound(user_id.clone(), self.code.clone())),
            Some(player) if player.has_answered => return Err(RoomError::AlreadyAnswered(current)),
            Some(_) => {}
        }

        let score_earned = match self.questions.get(self.question_index) {
            Some(question) => {
                question.check_submission(&submission).map_err(RoomError::InvalidSubmission)?;
                question.score(&submission)
            }
            None => 0,
        };

        let Some(player) = self.player_mut(user_id) else {
            return Err(RoomError::PlayerNotFound(user_id.clone(), self.code.clone()));
        };
        player.has_answered = true;
        player.score += score_earned;

        self.answers.insert(
            user_id.clone(),
            AnswerRecord {
                submission,
                score_earned,
                at: now,
            },
        );

        Ok(SubmitOutcome {
            score_earned,
            round_complete: self.all_players_answered(),
        })
    }

    /// Moves to the next round, or finishes the game after the last one.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] if not playing
    /// - [`RoomError::NotHost`] for a host trigger from anyone else
    /// - [`RoomError::RoundNotReady`] if answers are outstanding and the
    ///   round's time has not run out
    pub fn advance_round(&mut self, trigger: AdvanceTrigger, now: Instant) -> Result<AdvanceOutcome, RoomError> {
        if !self.status.is_active() {
            return Err(RoomError::InvalidState(format!("cannot advance while the room is {}", self.status)));
        }
        let ready = match &trigger {
            AdvanceTrigger::Host(requester) => {
                if self.host.as_ref() != Some(requester) {
                    return Err(RoomError::NotHost);
                }
                self.all_players_answered() || self.round_elapsed(now)
            }
            AdvanceTrigger::AllAnswered => self.all_players_answered(),
        };
        if !ready {
            return Err(RoomError::RoundNotReady(self.round_number));
        }
        Ok(self.advance(now))
    }

    /// Round deadline handling. An expiry for any round other than the
    /// current one, or outside a game, changes nothing and returns `None`.
    pub fn on_timer_expired(&mut self, round: u32, now: Instant) -> Option<AdvanceOutcome> {
        if !self.status.is_active() || round != self.round_number {
            tracing::debug!(
                room = %self.code,
                expired = round,
                current = self.round_number,
                status = %self.status,
                "stale round timer ignored"
            );
            return None;
        }
        Some(self.advance(now))
    }

    fn advance(&mut self, now: Instant) -> AdvanceOutcome {
        self.answers.clear();
        for player in &mut self.players {
            player.has_answered = false;
        }

        if self.question_index + 1 < self.questions.len() {
            self.question_index += 1;
            self.round_number += 1;
            self.round_started = Some(now);
            AdvanceOutcome::NextRound {
                round: self.round_number,
            }
        } else {
            self.finish(now);
            AdvanceOutcome::Finished
        }
    }

    fn finish(&mut self, now: Instant) {
        self.status = RoomStatus::Finished;
        self.round_started = None;
        self.finished_at = Some(now);
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    /// Checks the structural invariants. Used by tests and debug assertions.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.players.len() > self.max_players {
            return Err(format!("{} players exceed capacity {}", self.players.len(), self.max_players));
        }
        match (&self.host, self.players.is_empty()) {
            (None, true) => {}
            (Some(host), false) if self.is_member(host) => {}
            (host, _) => return Err(format!("host {host:?} is not a current player")),
        }
        let mut seen = std::collections::HashSet::new();
        if !self.players.iter().all(|p| seen.insert(&p.user_id)) {
            return Err("duplicate player".into());
        }
        if self.status.is_active() {
            if self.question_index >= self.questions.len() {
                return Err("question index out of bounds while playing".into());
            }
            if self.round_started.is_none() {
                return Err("playing without a round start".into());
            }
        } else if self.round_started.is_some() {
            return Err(format!("round timing set while {}", self.status));
        }
        for player in &self.players {
            if player.has_answered != self.answers.contains_key(&player.user_id) {
                return Err(format!("answer flag out of sync for {}", player.user_id));
            }
        }
        if self.answers.keys().any(|id| !self.is_member(id)) {
            return Err("answer recorded for a non-player".into());
        }
        Ok(())
    }
}
