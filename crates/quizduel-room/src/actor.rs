//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Commands are handled one at a time, so every
//! room has exactly one writer and two near-simultaneous submissions can
//! never both see an unanswered round. The round timer and the
//! finished-room expiry live in the same `select!` loop.

use std::sync::Arc;

use quizduel_protocol::{Difficulty, RoomCode, RoomSnapshot, RoomStatus, ServerEvent, UserId};
use quizduel_questions::{GenerationError, Question, QuestionSetProvider, QuestionSource};
use quizduel_timer::RoundTimer;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::notify::{PlayerSender, Subscribers, snapshot};
use crate::room::{AdvanceOutcome, AdvanceTrigger, JoinOutcome, LeaveOutcome};
use crate::{Room, RoomConfig, RoomError};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in most variants is a "reply channel": the
/// caller sends a command and waits for the response on that channel.
pub(crate) enum RoomCommand {
    Join {
        user_id: UserId,
        display_name: String,
        sender: PlayerSender,
        reply: Reply<()>,
    },

    /// Re-attach a reconnected member's connection.
    Attach {
        user_id: UserId,
        sender: PlayerSender,
        reply: oneshot::Sender<bool>,
    },

    Leave {
        user_id: UserId,
        reply: Reply<LeaveOutcome>,
    },

    /// Answered only once the question fetch has finished.
    Start {
        requester: UserId,
        reply: Reply<()>,
    },

    /// Result of the fetch spawned by `Start`.
    QuestionsReady {
        ticket: u64,
        result: Result<Vec<Question>, GenerationError>,
    },

    Submit {
        user_id: UserId,
        round: u32,
        submission: Vec<String>,
        reply: Reply<u32>,
    },

    Advance {
        requester: UserId,
        reply: Reply<()>,
    },

    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    /// Shut down the room.
    Shutdown,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// This is cheap to clone; it's just an `mpsc::Sender` wrapper.
/// The room store holds one of these per room.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(code: RoomCode, sender: mpsc::Sender<RoomCommand>) -> Self {
        Self { code, sender }
    }

    /// Returns the room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Whether the actor has stopped (room deleted or expired).
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Seats a player and attaches their connection.
    pub async fn join(&self, user_id: UserId, display_name: String, sender: PlayerSender) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Join {
            user_id,
            display_name,
            sender,
            reply,
        })
        .await?
    }

    /// Re-attaches a member's new connection. Returns `false` if the user
    /// is not a member.
    pub async fn attach(&self, user_id: UserId, sender: PlayerSender) -> Result<bool, RoomError> {
        self.call(|reply| RoomCommand::Attach { user_id, sender, reply })
            .await
    }

    pub async fn leave(&self, user_id: UserId) -> Result<LeaveOutcome, RoomError> {
        self.call(|reply| RoomCommand::Leave { user_id, reply })
            .await?
    }

    /// Starts the game. Resolves after the question set was fetched.
    pub async fn start(&self, requester: UserId) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Start { requester, reply })
            .await?
    }

    /// Submits an answer; returns the points earned.
    pub async fn submit(&self, user_id: UserId, round: u32, submission: Vec<String>) -> Result<u32, RoomError> {
        self.call(|reply| RoomCommand::Submit {
            user_id,
            round,
            submission,
            reply,
        })
        .await?
    }

    pub async fn advance(&self, requester: UserId) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Advance { requester, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.call(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

enum Flow {
    Continue,
    Stop,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<Q> {
    room: Room,
    subscribers: Subscribers,
    timer: RoundTimer,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Weak, so the actor does not keep its own channel open.
    this: mpsc::WeakSender<RoomCommand>,
    provider: Arc<QuestionSetProvider<Q>>,
    config: RoomConfig,
    /// The host's start request, answered when the fetch completes.
    pending_start_reply: Option<(u64, Reply<()>)>,
    /// When a finished room is deleted.
    expires_at: Option<Instant>,
}

impl<Q: QuestionSource> RoomActor<Q> {
    /// Runs the actor loop until the room empties, expires or is shut down.
    async fn run(mut self) {
        let code = self.room.code().clone();
        tracing::info!(room = %code, difficulty = %self.room.difficulty(), "room actor started");
        self.broadcast_snapshot(Instant::now());

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if let Flow::Stop = self.handle_command(cmd) {
                        break;
                    }
                }
                expiry = self.timer.wait_for_deadline() => {
                    let now = Instant::now();
                    if let Some(outcome) = self.room.on_timer_expired(expiry.round, now) {
                        self.log_advance(outcome, "timer");
                        self.settle(now);
                    }
                }
                () = sleep_until_opt(self.expires_at) => {
                    tracing::info!(room = %code, "finished room expired");
                    self.subscribers.broadcast_deleted(&code, "room expired");
                    break;
                }
            }
        }

        self.timer.cancel();
        if let Some((_, reply)) = self.pending_start_reply.take() {
            let _ = reply.send(Err(RoomError::Unavailable(code.clone())));
        }
        let timers = self.timer.metrics();
        tracing::info!(
            room = %code,
            timers_fired = timers.fired,
            timers_cancelled = timers.cancelled,
            "room actor stopped"
        );
    }

    fn handle_command(&mut self, cmd: RoomCommand) -> Flow {
        let now = Instant::now();
        match cmd {
            RoomCommand::Join {
                user_id,
                display_name,
                sender,
                reply,
            } => {
                let result = self.handle_join(user_id, display_name, sender, now);
                let _ = reply.send(result);
            }
            RoomCommand::Attach { user_id, sender, reply } => {
                let attached = self.room.is_member(&user_id);
                if attached {
                    self.subscribers.attach(user_id.clone(), sender);
                    let event = ServerEvent::RoomUpdate(snapshot(&self.room, now));
                    self.subscribers.send_to(self.room.code(), &user_id, event);
                    tracing::debug!(room = %self.room.code(), user = %user_id, "connection re-attached");
                }
                let _ = reply.send(attached);
            }
            RoomCommand::Leave { user_id, reply } => {
                let result = self.room.leave(&user_id, now);
                match result {
                    Ok(LeaveOutcome::Emptied) => {
                        tracing::info!(room = %self.room.code(), user = %user_id, "last player left, deleting room");
                        self.subscribers
                            .broadcast_deleted(self.room.code(), "all players left");
                        let _ = reply.send(result);
                        return Flow::Stop;
                    }
                    Ok(LeaveOutcome::Left {
                        host_changed,
                        forced_finish,
                    }) => {
                        self.subscribers.detach(&user_id);
                        tracing::info!(
                            room = %self.room.code(),
                            user = %user_id,
                            host_changed,
                            forced_finish,
                            players = self.room.players().len(),
                            "player left"
                        );
                        self.settle_abandoned_start();
                        self.settle(now);
                    }
                    Err(_) => {}
                }
                let _ = reply.send(result);
            }
            RoomCommand::Start { requester, reply } => match self.room.begin_start(&requester) {
                Ok(ticket) => {
                    tracing::info!(room = %self.room.code(), ticket, "fetching questions");
                    self.pending_start_reply = Some((ticket, reply));
                    self.spawn_fetch(ticket);
                    self.broadcast_snapshot(now);
                }
                Err(e) => {
                    tracing::debug!(room = %self.room.code(), user = %requester, error = %e, "start rejected");
                    let _ = reply.send(Err(e));
                }
            },
            RoomCommand::QuestionsReady { ticket, result } => {
                self.handle_questions(ticket, result, now);
            }
            RoomCommand::Submit {
                user_id,
                round,
                submission,
                reply,
            } => {
                let result = self.handle_submit(&user_id, round, submission, now);
                let _ = reply.send(result);
            }
            RoomCommand::Advance { requester, reply } => {
                let result = self
                    .room
                    .advance_round(AdvanceTrigger::Host(requester), now)
                    .map(|outcome| {
                        self.log_advance(outcome, "host");
                        self.settle(now);
                    });
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(snapshot(&self.room, now));
            }
            RoomCommand::Shutdown => {
                tracing::info!(room = %self.room.code(), "room shutting down");
                self.subscribers
                    .broadcast_deleted(self.room.code(), "server shutting down");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn handle_join(
        &mut self,
        user_id: UserId,
        display_name: String,
        sender: PlayerSender,
        now: Instant,
    ) -> Result<(), RoomError> {
        match self.room.join(user_id.clone(), display_name)? {
            JoinOutcome::Joined => {
                self.subscribers.attach(user_id.clone(), sender);
                tracing::info!(
                    room = %self.room.code(),
                    user = %user_id,
                    players = self.room.players().len(),
                    "player joined"
                );
                self.broadcast_snapshot(now);
            }
            JoinOutcome::AlreadyMember => {
                self.subscribers.attach(user_id.clone(), sender);
                let event = ServerEvent::RoomUpdate(snapshot(&self.room, now));
                self.subscribers.send_to(self.room.code(), &user_id, event);
            }
        }
        Ok(())
    }

    fn handle_submit(
        &mut self,
        user_id: &UserId,
        round: u32,
        submission: Vec<String>,
        now: Instant,
    ) -> Result<u32, RoomError> {
        let outcome = self
            .room
            .submit_answer(user_id, round, submission, now)
            .inspect_err(|e| {
                tracing::debug!(room = %self.room.code(), user = %user_id, round, error = %e, "submission rejected");
            })?;

        tracing::debug!(room = %self.room.code(), user = %user_id, round, score = outcome.score_earned, "answer recorded");
        self.subscribers.send_to(
            self.room.code(),
            user_id,
            ServerEvent::AnswerSubmittedConfirmation {
                room_code: self.room.code().clone(),
                round_number: round,
                score_earned: outcome.score_earned,
            },
        );
        self.broadcast_snapshot(now);

        if outcome.round_complete {
            match self.room.advance_round(AdvanceTrigger::AllAnswered, now) {
                Ok(advance) => {
                    self.log_advance(advance, "all answered");
                    self.settle(now);
                }
                Err(e) => tracing::warn!(room = %self.room.code(), error = %e, "fast-path advance failed"),
            }
        }
        Ok(outcome.score_earned)
    }

    fn handle_questions(&mut self, ticket: u64, result: Result<Vec<Question>, GenerationError>, now: Instant) {
        let reply = match self.pending_start_reply.take() {
            Some((pending, reply)) if pending == ticket => Some(reply),
            other => {
                self.pending_start_reply = other;
                None
            }
        };

        let outcome = match result {
            Ok(questions) => self.room.complete_start(ticket, questions, now).map(|()| {
                tracing::info!(
                    room = %self.room.code(),
                    rounds = self.room.max_rounds(),
                    "game started"
                );
                self.settle(now);
            }),
            Err(e) => {
                if self.room.abort_start(ticket) {
                    tracing::warn!(room = %self.room.code(), error = %e, "game start aborted");
                    self.broadcast_snapshot(now);
                }
                Err(RoomError::Generation(e))
            }
        };

        match reply {
            Some(reply) => {
                let _ = reply.send(outcome);
            }
            None => tracing::debug!(room = %self.room.code(), ticket, "discarding result of abandoned start"),
        }
    }

    /// Answers the host if a departure abandoned the start in flight.
    fn settle_abandoned_start(&mut self) {
        if self.room.is_starting() {
            return;
        }
        if let Some((ticket, reply)) = self.pending_start_reply.take() {
            tracing::debug!(room = %self.room.code(), ticket, "start abandoned, player left");
            let _ = reply.send(Err(RoomError::InsufficientPlayers {
                required: crate::config::PLAYERS_TO_START,
            }));
        }
    }

    fn spawn_fetch(&self, ticket: u64) {
        let provider = Arc::clone(&self.provider);
        let this = self.this.clone();
        let difficulty: Difficulty = self.room.difficulty();
        let count = self.room.question_count();
        tokio::spawn(async move {
            let result = provider.fetch(difficulty, count).await;
            // The room may have been deleted meanwhile; the result is then dropped.
            if let Some(tx) = this.upgrade() {
                let _ = tx.send(RoomCommand::QuestionsReady { ticket, result }).await;
            }
        });
    }

    /// Re-syncs the round timer and expiry with the room, then notifies.
    fn settle(&mut self, now: Instant) {
        match self.room.round_remaining(now) {
            Some(remaining) if self.room.status() == RoomStatus::Playing => {
                let round = self.room.round_number();
                if self.timer.armed_round() != Some(round) {
                    self.timer.arm(round, remaining);
                }
            }
            _ => {
                self.timer.cancel();
            }
        }

        if self.room.status() == RoomStatus::Finished && self.expires_at.is_none() {
            self.expires_at = Some(now + self.config.finished_room_ttl);
        }

        self.broadcast_snapshot(now);
    }

    fn broadcast_snapshot(&self, now: Instant) {
        debug_assert!(self.room.check_invariants().is_ok(), "{:?}", self.room.check_invariants());
        let event = ServerEvent::RoomUpdate(snapshot(&self.room, now));
        self.subscribers.broadcast(self.room.code(), &event);
        tracing::trace!(room = %self.room.code(), recipients = self.subscribers.len(), "snapshot sent");
    }

    fn log_advance(&self, outcome: AdvanceOutcome, cause: &'static str) {
        match outcome {
            AdvanceOutcome::NextRound { round } => {
                tracing::info!(room = %self.room.code(), round, cause, "round advanced");
            }
            AdvanceOutcome::Finished => {
                tracing::info!(room = %self.room.code(), cause, "game finished");
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Spawns a room actor with `host` seated and returns a handle to it.
pub(crate) fn spawn_room<Q: QuestionSource>(
    code: RoomCode,
    host: UserId,
    host_name: String,
    host_sender: PlayerSender,
    difficulty: Difficulty,
    config: RoomConfig,
    provider: Arc<QuestionSetProvider<Q>>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);

    let room = Room::new(code.clone(), host.clone(), host_name, difficulty, &config);
    let mut subscribers = Subscribers::default();
    subscribers.attach(host, host_sender);

    let actor = RoomActor {
        room,
        subscribers,
        timer: RoundTimer::new(),
        receiver: rx,
        this: tx.downgrade(),
        provider,
        config,
        pending_start_reply: None,
        expires_at: None,
    };

    tokio::spawn(actor.run());

    RoomHandle::new(code, tx)
}
