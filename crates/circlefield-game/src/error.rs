//! Error types for the game layer.

use circlefield_protocol::{PlayerId, RoundPhase};

/// Errors raised by the room state machine.
///
/// None of these are fatal to the process: a stale client recovers by
/// rejoining, a rejected action can be retried, and a room whose layout
/// cannot be generated is simply refused.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The player is not (or no longer) in this room.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// A player with this id is already in the room.
    #[error("player {0} is already in the room")]
    DuplicatePlayer(PlayerId),

    /// No free player slot.
    #[error("room is full ({max} players)")]
    RoomFull { max: usize },

    /// The action is not allowed in the current round phase.
    #[error("cannot {action} while the round is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: RoundPhase,
    },

    /// The simulation was asked to start with no ready player.
    #[error("no player is ready")]
    NoParticipants,

    /// Rejection sampling could not fit the requested obstacles.
    #[error(
        "could not place obstacle {placed} of {requested} without overlap after {attempts} attempts"
    )]
    ObstacleGenerationExhausted {
        placed: usize,
        requested: usize,
        attempts: u32,
    },

    /// Rejection sampling could not find a free starting point for a bot.
    #[error("could not place {0} after {1} attempts")]
    PlacementExhausted(PlayerId, u32),

    /// The arena configuration is unusable.
    #[error("invalid arena config: {0}")]
    InvalidConfig(String),
}
