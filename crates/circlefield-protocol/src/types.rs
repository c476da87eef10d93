//! Identity types and the events that travel over a connection.
//!
//! Event names follow the browser client's vocabulary (`join`,
//! `selectPoint`, `renderGame`, ...). Every event is encoded as
//! `{ "event": <name>, "data": { ... } }` with camelCase field names, so a
//! JavaScript client can dispatch on `msg.event` exactly as it would with
//! named socket events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{FieldSize, RoomSnapshot};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player (human or bot).
///
/// Allocated by the room registry and stable for the lifetime of the
/// connection that owns it. `#[serde(transparent)]` keeps it a plain
/// number on the wire, and a plain string when used as a JSON map key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for an obstacle within one room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObstacleId(pub u64);

impl fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O-{}", self.0)
    }
}

/// A room (arena) identifier.
///
/// Clients name the room they want to play in, so unlike player ids this
/// is an arbitrary string chosen outside the server. Rooms the server
/// mints itself for solo play are prefixed `solo-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client can ask of the server.
///
/// A disconnect is not an event: it is the transport closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Enter a room. `room_id: None` asks for a fresh private room
    /// populated with bots.
    Join {
        name: String,
        #[serde(default)]
        room_id: Option<RoomId>,
    },

    /// Commit a starting point for the current round.
    SelectPoint { x: f64, y: f64 },

    /// Start the growth simulation for the caller's room.
    ShowResult {},

    /// Start a new round with a fresh obstacle layout.
    Reset {},

    /// Keep-alive with the client's clock, echoed back for RTT.
    Heartbeat { client_time: u64 },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server tells clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Sent to a player right after they join: who they are, where they
    /// are, and the full room state.
    Init {
        player_id: PlayerId,
        room_id: RoomId,
        field: FieldSize,
        snapshot: RoomSnapshot,
    },

    /// Full room state after a membership change or a reset.
    InitGame { snapshot: RoomSnapshot },

    /// Reply to `selectPoint`. `accepted` is false when the point
    /// overlaps an obstacle or lies outside the field.
    RenderSelect {
        snapshot: RoomSnapshot,
        accepted: bool,
    },

    /// Readiness counters over human players.
    ReadyPlayers {
        ready_human_count: usize,
        total_human_count: usize,
    },

    /// Room state after one simulation tick.
    RenderGame { snapshot: RoomSnapshot },

    /// Final state of a round, sent exactly once per round.
    GameOver { snapshot: RoomSnapshot },

    /// The server no longer knows this connection's player or room.
    /// The client should join again.
    Resync { reason: String },

    /// A request was rejected. `code` follows HTTP conventions.
    Error { code: u16, message: String },

    /// Answer to `heartbeat`.
    HeartbeatAck { client_time: u64, server_time: u64 },
}

impl ServerEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::InitGame { .. } => "initGame",
            Self::RenderSelect { .. } => "renderSelect",
            Self::ReadyPlayers { .. } => "readyPlayers",
            Self::RenderGame { .. } => "renderGame",
            Self::GameOver { .. } => "gameOver",
            Self::Resync { .. } => "resync",
            Self::Error { .. } => "error",
            Self::HeartbeatAck { .. } => "heartbeatAck",
        }
    }
}

/// The outer frame of every server message.
///
/// `seq` increases by one per message on a connection, so a client can
/// detect a stale or missing frame; `timestamp` is milliseconds since the
/// server started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: ServerEvent,
}

// =========================================================================
// Tests
// =========================================================================
