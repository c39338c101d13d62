//! Room snapshots and their delivery.

use std::collections::HashMap;

use quizduel_protocol::{PlayerView, RoomCode, RoomSnapshot, RoomStatus, ServerEvent, UserId, millis};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::Room;

/// Channel sender for delivering push events to one connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Builds the client-safe view of a room.
///
/// Correct answers are only included once the room is finished, as
/// `results`.
pub fn snapshot(room: &Room, now: Instant) -> RoomSnapshot {
    let finished = room.status() == RoomStatus::Finished;
    RoomSnapshot {
        room_code: room.code().clone(),
        host_id: room.host().cloned(),
        status: room.status(),
        difficulty: room.difficulty(),
        starting: room.is_starting(),
        current_round_number: room.round_number(),
        max_rounds: room.max_rounds(),
        round_duration_ms: millis(room.round_duration()),
        round_remaining_ms: room.round_remaining(now).map(millis),
        players: room
            .players()
            .iter()
            .map(|p| PlayerView {
                id: p.user_id.clone(),
                display_name: p.display_name.clone(),
                score: p.score,
                has_answered_current_round: p.has_answered,
            })
            .collect(),
        question: room.current_question().map(|q| q.view()),
        results: finished.then(|| room.questions().iter().map(|q| q.reveal()).collect()),
    }
}

/// The connections attached to one room, one per player.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: HashMap<UserId, PlayerSender>,
}

impl Subscribers {
    /// Attaches (or replaces) a player's connection.
    pub(crate) fn attach(&mut self, user_id: UserId, sender: PlayerSender) {
        self.senders.insert(user_id, sender);
    }

    pub(crate) fn detach(&mut self, user_id: &UserId) -> Option<PlayerSender> {
        self.senders.remove(user_id)
    }

    /// Sends an event to one player. Delivery failures are logged only.
    pub(crate) fn send_to(&self, code: &RoomCode, user_id: &UserId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(user_id) {
            deliver(code, user_id, sender, event);
        }
    }

    /// Sends an event to every attached player.
    pub(crate) fn broadcast(&self, code: &RoomCode, event: &ServerEvent) {
        for (user_id, sender) in &self.senders {
            deliver(code, user_id, sender, event.clone());
        }
    }

    /// Tells every attached player the room is gone.
    pub(crate) fn broadcast_deleted(&self, code: &RoomCode, reason: &str) {
        self.broadcast(
            code,
            &ServerEvent::RoomDeleted {
                room_code: code.clone(),
                reason: reason.to_string(),
            },
        );
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

fn deliver(code: &RoomCode, user_id: &UserId, sender: &PlayerSender, event: ServerEvent) {
    if sender.send(event).is_err() {
        tracing::warn!(room = %code, user = %user_id, "push delivery failed, connection closed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quizduel_protocol::Difficulty;
    use quizduel_questions::Question;

    use super::*;
    use crate::RoomConfig;

    fn uid(s: &str) -> UserId {
        UserId::new(s)
    }

    fn started_room(now: Instant) -> Room {
        let config = RoomConfig {
            lead_in: Duration::ZERO,
            ..Default::default()
        };
        let mut room = Room::new(RoomCode::new("SNAP01"), uid("H"), "Host".into(), Difficulty::Easy, &config);
        room.join(uid("P"), "Player".into()).unwrap();
        let ticket = room.begin_start(&uid("H")).unwrap();
        let q = Question::new("Pick a fruit", vec!["apple".to_string()], Some(vec!["apple".into(), "stone".into()]));
        room.complete_start(ticket, vec![q], now).unwrap();
        room
    }

    #[test]
    fn test_snapshot_while_playing_hides_answers() {
        let now = Instant::now();
        let room = started_room(now);

        let snap = snapshot(&room, now);

        assert_eq!(snap.status, RoomStatus::Playing);
        assert_eq!(snap.current_round_number, 1);
        assert_eq!(snap.round_remaining_ms, Some(15_000));
        let question = snap.question.unwrap();
        assert_eq!(question.prompt, "Pick a fruit");
        assert_eq!(question.options.unwrap().len(), 2);
        assert!(snap.results.is_none());
    }

    #[test]
    fn test_snapshot_after_finish_reveals_results() {
        let now = Instant::now();
        let mut room = started_room(now);
        room.on_timer_expired(1, now).unwrap();

        let snap = snapshot(&room, now);

        assert_eq!(snap.status, RoomStatus::Finished);
        assert!(snap.question.is_none());
        assert_eq!(snap.round_remaining_ms, None);
        let results = snap.results.unwrap();
        assert_eq!(results[0].correct_answers, vec!["apple".to_string()]);
    }

    #[test]
    fn test_broadcast_ignores_closed_connections() {
        let code = RoomCode::new("SNAP01");
        let mut subs = Subscribers::default();
        let (open_tx, mut open_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        drop(closed_rx);
        subs.attach(uid("A"), open_tx);
        subs.attach(uid("B"), closed_tx);

        subs.broadcast_deleted(&code, "test");

        assert!(matches!(open_rx.try_recv(), Ok(ServerEvent::RoomDeleted { .. })));
        assert_eq!(subs.len(), 2);
    }
}
