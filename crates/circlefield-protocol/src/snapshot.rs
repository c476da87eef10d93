//! The room snapshot: the complete, authoritative view of one arena.
//!
//! Every state broadcast carries a full snapshot rather than a delta, so
//! a client that joins late or misses a frame is whole again after the
//! next message. Maps are `BTreeMap`s to keep the encoding deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ObstacleId, PlayerId, RoomId};

/// Dimensions of the playing field, shared by server and clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSize {
    pub width: f64,
    pub height: f64,
}

/// Where a room is in its round lifecycle.
///
/// ```text
/// Lobby ──showResult──→ RoundActive ──alive == 0──→ RoundOver
///   ↑                                                   │
///   └──────────────────────── reset ────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundPhase {
    /// Players are joining and choosing points.
    #[default]
    Lobby,
    /// The simulation is ticking.
    RoundActive,
    /// Winners are known; waiting for a reset.
    RoundOver,
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::RoundActive => write!(f, "RoundActive"),
            Self::RoundOver => write!(f, "RoundOver"),
        }
    }
}

/// One player as clients see it. `x`/`y` are absent until a point has
/// been selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub radius: f64,
    pub color: String,
    pub is_ready: bool,
    pub is_alive: bool,
    pub is_bot: bool,
}

/// One obstacle; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObstacleView {
    pub id: ObstacleId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Result of the current round. Empty until the round is over.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStatus {
    pub winners: Vec<PlayerView>,
    pub is_tie: bool,
}

/// Full state of a room at one point in its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub phase: RoundPhase,
    pub field: FieldSize,
    pub players: BTreeMap<PlayerId, PlayerView>,
    pub obstacles: BTreeMap<ObstacleId, ObstacleView>,
    pub status: RoundStatus,
}
