//! Arena rules for Circlefield.
//!
//! Players pick a point on a bounded field scattered with rectangular
//! obstacles. When the round starts every ready circle grows at a fixed
//! rate; touching a wall, an obstacle, or another circle eliminates it.
//! The last circles standing win, and circles that fall on the same tick
//! share the result.
//!
//! This crate is pure game state: no clocks, no sockets, no tasks.
//!
//! ```
//! use circlefield_game::{ArenaConfig, Game};
//! use circlefield_protocol::{PlayerId, RoomId, RoundPhase};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let config = ArenaConfig { obstacle_count: 0, ..ArenaConfig::default() };
//! let mut game = Game::new(RoomId::from("demo"), config, &[], StdRng::seed_from_u64(7)).unwrap();
//!
//! game.add_player(PlayerId(1), "alice".into()).unwrap();
//! assert!(game.select_point(PlayerId(1), 400.0, 300.0).unwrap());
//! assert!(game.begin_simulation().unwrap());
//!
//! while !game.tick().finished {}
//! assert_eq!(game.phase(), RoundPhase::RoundOver);
//! ```

mod config;
mod entity;
mod error;
mod game;
pub mod geometry;

pub use config::ArenaConfig;
pub use entity::{MAX_NAME_CHARS, Obstacle, Player, display_name, generate_layout, random_color};
pub use error::GameError;
pub use game::{Game, TickOutcome};
