//! Error types for the room layer.

use circlefield_game::GameError;
use circlefield_protocol::RoomId;
use circlefield_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (any more).
    #[error("room {0} not found")]
    UnknownRoom(RoomId),

    /// The connection has not joined a room.
    #[error("{0} is not in a room")]
    UnknownConnection(ConnectionId),

    /// The connection is already a member of a room.
    #[error("{0} already joined room {1}")]
    AlreadyJoined(ConnectionId, RoomId),

    /// The room was created for a single connection and cannot be joined
    /// by id.
    #[error("room {0} is private")]
    PrivateRoom(RoomId),

    /// The room's actor has stopped or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The room's game rejected the operation.
    #[error(transparent)]
    Game(#[from] GameError),
}
