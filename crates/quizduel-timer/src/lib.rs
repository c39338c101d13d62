//! Round deadline for quizduel rooms.
//!
//! A [`RoundTimer`] holds at most one armed deadline, tagged with the round
//! it belongs to. Arming again replaces the previous deadline; cancelling
//! disarms it. When the deadline passes, [`RoundTimer::wait_for_deadline`]
//! yields an [`Expiry`] naming the round, so the room can ignore expiries
//! for rounds that already advanced.
//!
//! # Integration
//!
//! The timer sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands, re-arm or cancel */ }
//!         expiry = timer.wait_for_deadline() => {
//!             room.on_timer_expired(expiry.round, Instant::now());
//!         }
//!     }
//! }
//! ```
//!
//! `wait_for_deadline` is cancel-safe: if another branch wins, the armed
//! deadline is untouched and the next call waits for it again.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Fired when an armed deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    /// The round the deadline was armed for.
    pub round: u32,
}

/// Counters for one timer's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    pub armed: u64,
    pub fired: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    round: u32,
    deadline: Instant,
}

/// A single cancellable deadline.
///
/// One `RoundTimer` per room actor. Uses tokio's clock, so tests can run
/// with paused time.
#[derive(Debug, Default)]
pub struct RoundTimer {
    armed: Option<Armed>,
    metrics: TimerMetrics,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire for `round` after `after` elapses.
    ///
    /// Replaces any deadline that was already armed.
    pub fn arm(&mut self, round: u32, after: Duration) {
        let deadline = Instant::now() + after;
        if let Some(previous) = self.armed.replace(Armed { round, deadline }) {
            trace!(previous = previous.round, round, "round timer re-armed");
        }
        self.metrics.armed += 1;
        debug!(round, after_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX), "round timer armed");
    }

    /// Disarms the timer. Returns the round it was armed for, if any.
    ///
    /// Idempotent.
    pub fn cancel(&mut self) -> Option<u32> {
        let armed = self.armed.take()?;
        self.metrics.cancelled += 1;
        debug!(round = armed.round, "round timer cancelled");
        Some(armed.round)
    }

    /// The round the timer is armed for.
    pub fn armed_round(&self) -> Option<u32> {
        self.armed.map(|a| a.round)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Time left until the deadline; zero if it already passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .map(|a| a.deadline.saturating_duration_since(Instant::now()))
    }

    /// Waits for the armed deadline and disarms the timer.
    ///
    /// While disarmed this future pends forever; `tokio::select!` keeps
    /// processing its other branches.
    pub async fn wait_for_deadline(&mut self) -> Expiry {
        let Some(armed) = self.armed else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(armed.deadline).await;

        self.armed = None;
        self.metrics.fired += 1;
        debug!(round = armed.round, "round timer fired");
        Expiry { round: armed.round }
    }

    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }
}
