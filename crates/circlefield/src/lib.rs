//! # Circlefield
//!
//! A server-authoritative survival arena for web clients.
//!
//! Every player picks a starting point on a shared field. When the round
//! starts, each circle grows by a fixed amount per tick until it touches
//! another circle, an obstacle, or the field edge, at which point it is
//! out. The last circle standing wins; circles that die on the same tick
//! tie.
//!
//! The server owns all state. Clients send intents (`join`, `selectPoint`,
//! `showResult`, `reset`) and receive full room snapshots.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use circlefield::prelude::*;
//!
//! # async fn run() -> Result<(), CirclefieldError> {
//! let server = CirclefieldServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::CirclefieldError;
pub use server::{CirclefieldServer, CirclefieldServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{CirclefieldError, CirclefieldServer, CirclefieldServerBuilder};
    pub use circlefield_game::ArenaConfig;
    pub use circlefield_protocol::{
        ClientEvent, Envelope, PlayerId, RoomId, RoomSnapshot, RoundPhase, ServerEvent,
    };
}
