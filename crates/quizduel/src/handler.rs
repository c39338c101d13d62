//! Per-connection handler: request dispatch and push delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task. The flow is:
//!   1. Spawn the writer: it owns the outgoing sequence numbers and
//!      merges responses with room pushes into one ordered frame stream.
//!   2. Loop: receive envelopes → dispatch each request → queue its
//!      response. `startGame` waits on the question generator, so it runs
//!      in its own task and the connection keeps serving other requests. Until `authenticate` or `registerConnection` binds the
//!      connection to a user, only those two and `heartbeat` are served.
//!   3. On close or idle timeout, unbind the user and remove them from
//!      their rooms.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use quizduel_protocol::{
    Codec, Envelope, Operation, Payload, ProtocolError, Reply, Request, Response, ServerEvent, UserId, millis,
};
use quizduel_questions::QuestionSource;
use quizduel_room::PlayerSender;
use quizduel_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::QuizduelError;
use crate::server::ServerState;

/// Drop guard that unbinds the connection's user when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async work.
struct ConnectionGuard<Q: QuestionSource, C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<Q, C>>,
}

impl<Q: QuestionSource, C: Codec> Drop for ConnectionGuard<Q, C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let user = state.users.lock().await.detach(conn_id);
            // A connection replaced by a newer one has no owner left here.
            if let Some(user) = user {
                state.rooms.handle_disconnect(&user).await;
            }
        });
    }
}

/// What a request handler needs to know about its connection.
#[derive(Clone)]
struct Link {
    conn_id: ConnectionId,
    /// Room pushes for this connection; cloned into every room it enters.
    events: PlayerSender,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<Q, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<Q, C>>,
) -> Result<(), QuizduelError>
where
    Q: QuestionSource,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (response_tx, response_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), response_rx, event_rx));

    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };
    let link = Link {
        conn_id,
        events: event_tx,
    };
    // Requests that wait on the question generator run beside the read loop.
    let mut in_flight = JoinSet::new();

    loop {
        while in_flight.try_join_next().is_some() {}

        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, closing");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                push(&link, ServerEvent::Error(QuizduelError::from(e).to_body()));
                continue;
            }
        };

        match envelope.payload {
            Payload::Request(Request { id, op }) if matches!(op, Operation::StartGame { .. }) => {
                let (state, link, responses) = (Arc::clone(&state), link.clone(), response_tx.clone());
                in_flight.spawn(async move {
                    let response = respond(&state, &link, id, op).await;
                    let _ = responses.send(response);
                });
            }
            Payload::Request(Request { id, op }) => {
                let response = respond(&state, &link, id, op).await;
                if response_tx.send(response).is_err() {
                    break;
                }
            }
            Payload::Response(_) | Payload::Event(_) => {
                let err = ProtocolError::InvalidMessage("clients may only send requests".to_string());
                push(&link, ServerEvent::Error(QuizduelError::from(err).to_body()));
            }
        }
    }

    // Closing the response channel stops the writer once it has flushed.
    in_flight.shutdown().await;
    drop(response_tx);
    let _ = writer.await;
    let _ = conn.close().await;
    // _guard drops here → detach and disconnect handling fire.
    Ok(())
}

async fn respond<Q, C>(state: &ServerState<Q, C>, link: &Link, id: u64, op: Operation) -> Response
where
    Q: QuestionSource,
    C: Codec,
{
    let result = dispatch(state, link, op).await.map_err(|e| {
        tracing::debug!(conn_id = %link.conn_id, request = id, error = %e, "request failed");
        e.to_body()
    });
    Response { id, result }
}

/// Routes one operation to the registry or the rooms.
async fn dispatch<Q, C>(state: &ServerState<Q, C>, link: &Link, op: Operation) -> Result<Reply, QuizduelError>
where
    Q: QuestionSource,
    C: Codec,
{
    match op {
        Operation::Heartbeat { client_time } => Ok(Reply::HeartbeatAck {
            client_time,
            server_time: unix_millis(),
        }),

        Operation::Authenticate { user_id, username } => {
            let (user, username, previous) = {
                let mut users = state.users.lock().await;
                let previous = users.user_for_connection(link.conn_id).map(|u| u.id.clone());
                let user = users.register(user_id.as_ref(), username.as_deref());
                let (id, name) = (user.id.clone(), user.display_name.clone());
                users.attach(&id, link.conn_id)?;
                let previous = previous.filter(|p| *p != id);
                (id, name, previous)
            };
            // Re-authenticating as someone else ends the old identity's seats.
            if let Some(previous) = previous {
                state.rooms.handle_disconnect(&previous).await;
            }
            state.rooms.reattach(&user, link.events.clone()).await;
            tracing::info!(conn_id = %link.conn_id, user = %user, "authenticated");
            Ok(Reply::Identity {
                user_id: user,
                username,
            })
        }

        Operation::RegisterConnection { user_id } => {
            let username = {
                let mut users = state.users.lock().await;
                match users.attach(&user_id, link.conn_id) {
                    Ok(user) => user.display_name.clone(),
                    Err(e) => {
                        tracing::debug!(conn_id = %link.conn_id, error = %e, "stale identity, asking for re-auth");
                        push(link, ServerEvent::ForceReauthenticate);
                        return Err(QuizduelError::Unauthenticated);
                    }
                }
            };
            let rooms = state.rooms.reattach(&user_id, link.events.clone()).await;
            tracing::info!(conn_id = %link.conn_id, user = %user_id, rooms = rooms.len(), "connection registered");
            Ok(Reply::Identity { user_id, username })
        }

        Operation::UpdateUsername { username } => {
            let user = current_user(state, link).await?;
            let mut users = state.users.lock().await;
            let user = users.rename(&user, &username)?;
            Ok(Reply::Identity {
                user_id: user.id.clone(),
                username: user.display_name.clone(),
            })
        }

        Operation::CreateRoom { username, difficulty } => {
            let user = current_user(state, link).await?;
            let name = seat_name(state, &user, username).await?;
            let room_code = state
                .rooms
                .create_room(user, name, difficulty, link.events.clone())
                .await?;
            Ok(Reply::RoomJoined { room_code })
        }

        Operation::JoinRoom { room_code, username } => {
            let user = current_user(state, link).await?;
            let name = seat_name(state, &user, username).await?;
            state
                .rooms
                .join_room(&room_code, user, name, link.events.clone())
                .await?;
            Ok(Reply::RoomJoined { room_code })
        }

        Operation::LeaveRoom { room_code } => {
            let user = current_user(state, link).await?;
            state.rooms.leave_room(&room_code, &user).await?;
            Ok(Reply::Ack)
        }

        Operation::StartGame { room_code } => {
            let user = current_user(state, link).await?;
            state.rooms.start_game(&room_code, &user).await?;
            Ok(Reply::Ack)
        }

        Operation::SubmitAnswer {
            room_code,
            round_number,
            submission,
        } => {
            let user = current_user(state, link).await?;
            let score_earned = state
                .rooms
                .submit_answer(&room_code, &user, round_number, submission.into_values())
                .await?;
            Ok(Reply::AnswerScored { score_earned })
        }

        Operation::AdvanceRound { room_code } => {
            let user = current_user(state, link).await?;
            state.rooms.advance_round(&room_code, &user).await?;
            Ok(Reply::Ack)
        }
    }
}

/// The user bound to this connection.
async fn current_user<Q: QuestionSource, C: Codec>(
    state: &ServerState<Q, C>,
    link: &Link,
) -> Result<UserId, QuizduelError> {
    state
        .users
        .lock()
        .await
        .user_for_connection(link.conn_id)
        .map(|u| u.id.clone())
        .ok_or(QuizduelError::Unauthenticated)
}

/// The name a user takes into a room. A name given with the request
/// becomes the user's display name.
async fn seat_name<Q: QuestionSource, C: Codec>(
    state: &ServerState<Q, C>,
    user: &UserId,
    requested: Option<String>,
) -> Result<String, QuizduelError> {
    let mut users = state.users.lock().await;
    match requested.filter(|name| !name.trim().is_empty()) {
        Some(name) => Ok(users.rename(user, &name)?.display_name.clone()),
        None => users
            .get(user)
            .map(|u| u.display_name.clone())
            .ok_or(QuizduelError::Unauthenticated),
    }
}

fn push(link: &Link, event: ServerEvent) {
    if link.events.send(event).is_err() {
        tracing::debug!(conn_id = %link.conn_id, "push dropped, writer gone");
    }
}

/// Writes every outgoing frame for one connection.
///
/// Room pushes are drained before responses so a client sees the room
/// change before the reply to the request that caused it.
async fn write_loop<Q: QuestionSource, C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<Q, C>>,
    mut responses: mpsc::UnboundedReceiver<Response>,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
) {
    let conn_id = conn.id();
    let start = Instant::now();
    let mut seq: u64 = 1;

    loop {
        let payload = tokio::select! {
            biased;
            Some(event) = events.recv() => Payload::Event(event),
            response = responses.recv() => match response {
                Some(response) => Payload::Response(response),
                None => break,
            },
        };

        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: millis(start.elapsed()),
            payload,
        };
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_seq_increments() {
        let mut seq = 1;
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(next_seq(&mut seq), 2);
        assert_eq!(seq, 3);
    }
}
