//! Wire protocol for Circlefield.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity** ([`PlayerId`], [`RoomId`], [`ObstacleId`])
//! - **Events** ([`ClientEvent`] inbound, [`ServerEvent`] inside an
//!   [`Envelope`] outbound)
//! - **Snapshots** ([`RoomSnapshot`] and its views), the full room state
//!   carried by every state broadcast
//! - **Codec** ([`Codec`] trait, [`JsonCodec`])
//!
//! It knows nothing about sockets or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Room (game state)
//! ```

mod codec;
mod error;
mod snapshot;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use snapshot::{FieldSize, ObstacleView, PlayerView, RoomSnapshot, RoundPhase, RoundStatus};
pub use types::{ClientEvent, Envelope, ObstacleId, PlayerId, RoomId, ServerEvent};
