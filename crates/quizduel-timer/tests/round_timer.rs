//! Integration tests for the round timer.
//!
//! All async tests run with paused time, so `sleep_until` resolves as soon
//! as the runtime is otherwise idle and deadlines are exact.

use std::time::Duration;

use quizduel_timer::{Expiry, RoundTimer};
use tokio::time::{self, Instant};

// =========================================================================
// Arming and cancelling
// =========================================================================

#[test]
fn test_new_timer_is_disarmed() {
    let t = RoundTimer::new();
    assert!(!t.is_armed());
    assert_eq!(t.armed_round(), None);
    assert_eq!(t.remaining(), None);
}

#[tokio::test(start_paused = true)]
async fn test_arm_reports_round_and_remaining() {
    let mut t = RoundTimer::new();
    t.arm(1, Duration::from_secs(15));

    assert_eq!(t.armed_round(), Some(1));
    assert_eq!(t.remaining(), Some(Duration::from_secs(15)));

    time::advance(Duration::from_secs(5)).await;
    assert_eq!(t.remaining(), Some(Duration::from_secs(10)));
}

#[test]
fn test_cancel_is_idempotent() {
    let mut t = RoundTimer::new();
    t.arm(3, Duration::from_secs(1));

    assert_eq!(t.cancel(), Some(3));
    assert_eq!(t.cancel(), None);
    assert_eq!(t.metrics().cancelled, 1);
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_fires_at_deadline_with_round() {
    let mut t = RoundTimer::new();
    let start = Instant::now();
    t.arm(2, Duration::from_secs(15));

    let expiry = t.wait_for_deadline().await;

    assert_eq!(expiry, Expiry { round: 2 });
    assert_eq!(start.elapsed(), Duration::from_secs(15));
    assert!(!t.is_armed());
    assert_eq!(t.metrics().fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_deadline() {
    let mut t = RoundTimer::new();
    let start = Instant::now();
    t.arm(1, Duration::from_secs(15));
    t.arm(2, Duration::from_secs(5));

    let expiry = t.wait_for_deadline().await;

    assert_eq!(expiry.round, 2);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_timer_never_fires() {
    let mut t = RoundTimer::new();
    t.arm(1, Duration::from_secs(1));
    t.cancel();

    let result = time::timeout(Duration::from_secs(60), t.wait_for_deadline()).await;
    assert!(result.is_err(), "cancelled timer must not fire");
}

#[tokio::test(start_paused = true)]
async fn test_wait_is_cancel_safe() {
    let mut t = RoundTimer::new();
    t.arm(4, Duration::from_secs(10));

    // Another select! branch wins first; the deadline must survive.
    tokio::select! {
        _ = t.wait_for_deadline() => panic!("timer fired too early"),
        _ = time::sleep(Duration::from_secs(3)) => {}
    }
    assert_eq!(t.armed_round(), Some(4));

    let expiry = t.wait_for_deadline().await;
    assert_eq!(expiry.round, 4);
}
