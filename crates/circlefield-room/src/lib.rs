//! Rooms for Circlefield.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! [`Game`](circlefield_game::Game), the outbound channels of its human
//! players, and a tick scheduler that only runs while a round does.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates and destroys rooms, maps connections to
//!   memberships
//! - [`join_room`] / [`leave_room`]: membership changes through a shared
//!   registry without holding its lock while a room answers
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`RoomInfo`]: room metadata for monitoring and tests

mod error;
mod registry;
mod room;

pub use error::RoomError;
pub use registry::{Membership, PendingJoin, RoomRegistry, join_room, leave_room};
pub use room::{PlayerSender, RoomHandle, RoomInfo};
