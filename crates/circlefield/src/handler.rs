//! Per-connection handler: event decoding, routing, and outbound writes.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that owns the player's outbound channel:
//!   1. Spawn the writer, which stamps every `ServerEvent` with the next
//!      `seq` and the server clock before encoding it onto the socket
//!   2. Loop: receive a frame → decode a `ClientEvent` → dispatch it to
//!      the registry or the player's room
//!   3. On close, the registry guard takes the connection out of its room

use std::sync::Arc;

use circlefield_game::GameError;
use circlefield_protocol::{ClientEvent, Codec, Envelope, ServerEvent};
use circlefield_room::{Membership, PlayerSender, RoomError, RoomHandle, join_room, leave_room};
use circlefield_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::CirclefieldError;
use crate::server::ServerState;

/// Drop guard that removes the connection from the registry when the
/// handler exits, panics included.
///
/// `Drop` is synchronous, so the removal runs in a spawned task.
struct RegistryGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for RegistryGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            match leave_room(&state.rooms, conn_id).await {
                Ok(()) => tracing::debug!(%conn_id, "connection left its room"),
                // Never joined.
                Err(RoomError::UnknownConnection(_)) => {}
                Err(e) => tracing::debug!(%conn_id, error = %e, "leave failed"),
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), CirclefieldError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), rx));
    let guard = RegistryGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let result = read_loop(&conn, &state, &tx).await;

    drop(guard);
    writer.abort();
    let _ = conn.close().await;
    result
}

async fn read_loop<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    tx: &PlayerSender,
) -> Result<(), CirclefieldError> {
    let conn_id = conn.id();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode event");
                reply(
                    tx,
                    ServerEvent::Error {
                        code: 400,
                        message: format!("invalid event: {e}"),
                    },
                );
                continue;
            }
        };

        if let Err(e) = dispatch(state, conn_id, event, tx).await {
            let response = error_event(&e);
            tracing::debug!(%conn_id, error = %e, reply = response.name(), "event rejected");
            reply(tx, response);
        }
    }
}

/// Routes one client event.
async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    event: ClientEvent,
    tx: &PlayerSender,
) -> Result<(), RoomError> {
    match event {
        ClientEvent::Join { name, room_id } => {
            let membership = join_room(&state.rooms, conn_id, name, room_id, tx.clone()).await?;
            tracing::debug!(
                %conn_id,
                room_id = %membership.room_id,
                player_id = %membership.player_id,
                "join routed"
            );
        }

        ClientEvent::SelectPoint { x, y } => {
            let (room, member) = lookup(state, conn_id).await?;
            let accepted = room.select_point(member.player_id, x, y).await?;
            tracing::debug!(%conn_id, player_id = %member.player_id, x, y, accepted, "point selected");
        }

        ClientEvent::ShowResult {} => {
            let (room, member) = lookup(state, conn_id).await?;
            let started = room.begin_simulation().await?;
            tracing::debug!(room_id = %member.room_id, player_id = %member.player_id, started, "show result requested");
        }

        ClientEvent::Reset {} => {
            let (room, member) = lookup(state, conn_id).await?;
            room.reset().await?;
            tracing::debug!(room_id = %member.room_id, player_id = %member.player_id, "reset requested");
        }

        ClientEvent::Heartbeat { client_time } => {
            reply(
                tx,
                ServerEvent::HeartbeatAck {
                    client_time,
                    server_time: state.now_ms(),
                },
            );
        }
    }

    Ok(())
}

/// Finds the connection's room, holding the registry lock only for the
/// lookup itself.
async fn lookup<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
) -> Result<(RoomHandle, Membership), RoomError> {
    state
        .rooms
        .lock()
        .await
        .lookup(conn_id)
        .ok_or(RoomError::UnknownConnection(conn_id))
}

/// Maps a failed action to what the client is told.
///
/// Anything that means the client's view of its membership is stale asks it
/// to rejoin; everything else is reported as an error with an HTTP-style
/// code.
fn error_event(err: &RoomError) -> ServerEvent {
    let code = match err {
        RoomError::UnknownRoom(_)
        | RoomError::UnknownConnection(_)
        | RoomError::Unavailable(_)
        | RoomError::Game(GameError::UnknownPlayer(_)) => {
            return ServerEvent::Resync {
                reason: err.to_string(),
            };
        }
        RoomError::AlreadyJoined(..)
        | RoomError::PrivateRoom(_)
        | RoomError::Game(
            GameError::DuplicatePlayer(_)
            | GameError::RoomFull { .. }
            | GameError::InvalidPhase { .. }
            | GameError::NoParticipants,
        ) => 409,
        // The room could not be generated or laid out.
        RoomError::Game(
            GameError::ObstacleGenerationExhausted { .. }
            | GameError::PlacementExhausted(..)
            | GameError::InvalidConfig(_),
        ) => 500,
    };
    ServerEvent::Error {
        code,
        message: err.to_string(),
    }
}

/// Queues an event for this connection's writer.
fn reply(tx: &PlayerSender, event: ServerEvent) {
    // Fails only once the writer is gone, when nobody is listening anyway.
    let _ = tx.send(event);
}

/// Drains the player's outbound channel onto the socket.
///
/// Every frame this connection receives passes through here, so `seq` is
/// strictly increasing in delivery order.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
) {
    let conn_id = conn.id();
    let mut seq: u64 = 1;

    while let Some(payload) = rx.recv().await {
        let event = payload.name();
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: state.now_ms(),
            payload,
        };
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, event, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, event, error = %e, "send failed, writer stopping");
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
