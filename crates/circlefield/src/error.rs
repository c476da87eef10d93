//! Unified error type for the Circlefield server.

use circlefield_game::GameError;
use circlefield_protocol::ProtocolError;
use circlefield_room::RoomError;
use circlefield_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` variants let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum CirclefieldError {
    /// Connection, send, receive, or accept failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode, or invalid message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Room lookup, membership, or game rule failure.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The server could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<GameError> for CirclefieldError {
    fn from(err: GameError) -> Self {
        Self::Room(RoomError::Game(err))
    }
}
