//! Obstacles and players.
//!
//! The two entities are unrelated types; what they share is the `DVec2`
//! position value they each hold, and a conversion into a [`geometry`]
//! shape for collision tests.
//!
//! [`geometry`]: crate::geometry

use circlefield_protocol::{FieldSize, ObstacleId, ObstacleView, PlayerId, PlayerView, RoomId};
use glam::DVec2;
use rand::Rng;

use crate::GameError;
use crate::geometry::{Circle, Polygon, polygon_intersects_polygon};

// ---------------------------------------------------------------------------
// Obstacle
// ---------------------------------------------------------------------------

/// A static axis-aligned rectangle. Immutable once placed.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    id: ObstacleId,
    /// Top-left corner.
    origin: DVec2,
    size: DVec2,
}

impl Obstacle {
    pub fn new(id: ObstacleId, origin: DVec2, size: DVec2) -> Self {
        Self { id, origin, size }
    }

    pub fn id(&self) -> ObstacleId {
        self.id
    }

    pub fn origin(&self) -> DVec2 {
        self.origin
    }

    pub fn size(&self) -> DVec2 {
        self.size
    }

    /// The rectangle as a polygon, corners in clockwise screen order.
    pub fn to_shape(&self) -> Polygon {
        Polygon::rect(self.origin, self.size)
    }

    pub fn to_view(&self) -> ObstacleView {
        ObstacleView {
            id: self.id,
            x: self.origin.x,
            y: self.origin.y,
            width: self.size.x,
            height: self.size.y,
        }
    }

    /// Rejection-samples an origin in `[0, field.w - w] × [0, field.h - h]`
    /// whose rectangle does not touch any of `existing`.
    ///
    /// # Errors
    /// [`GameError::ObstacleGenerationExhausted`] when the obstacle does not
    /// fit the field, or no free spot turned up within `max_attempts`.
    pub fn random_non_overlapping<R: Rng + ?Sized>(
        id: ObstacleId,
        existing: &[Obstacle],
        field: FieldSize,
        size: DVec2,
        max_attempts: u32,
        rng: &mut R,
    ) -> Result<Obstacle, GameError> {
        let exhausted = GameError::ObstacleGenerationExhausted {
            placed: existing.len(),
            requested: existing.len() + 1,
            attempts: max_attempts,
        };
        let (max_x, max_y) = (field.width - size.x, field.height - size.y);
        if max_x < 0.0 || max_y < 0.0 {
            return Err(exhausted);
        }

        let shapes: Vec<Polygon> = existing.iter().map(Obstacle::to_shape).collect();
        for _ in 0..max_attempts {
            let origin = DVec2::new(rng.random_range(0.0..=max_x), rng.random_range(0.0..=max_y));
            let candidate = Obstacle::new(id, origin, size);
            let shape = candidate.to_shape();
            if !shapes.iter().any(|s| polygon_intersects_polygon(s, &shape)) {
                return Ok(candidate);
            }
        }
        Err(exhausted)
    }
}

/// Generates `count` mutually non-overlapping obstacles with consecutive
/// ids starting at `first_id`.
pub fn generate_layout<R: Rng + ?Sized>(
    count: usize,
    first_id: u64,
    field: FieldSize,
    size: DVec2,
    max_attempts: u32,
    rng: &mut R,
) -> Result<Vec<Obstacle>, GameError> {
    let mut placed = Vec::with_capacity(count);
    for n in 0..count {
        let id = ObstacleId(first_id + n as u64);
        let obstacle =
            Obstacle::random_non_overlapping(id, &placed, field, size, max_attempts, rng)
                .map_err(|_| GameError::ObstacleGenerationExhausted {
                    placed: n,
                    requested: count,
                    attempts: max_attempts,
                })?;
        placed.push(obstacle);
    }
    Ok(placed)
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A participant in a room, human or bot.
///
/// `is_ready` implies `center` is set and the circle did not overlap an
/// obstacle when the point was chosen. Mutation is reserved to the room
/// state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub(crate) id: PlayerId,
    pub(crate) name: String,
    pub(crate) room_id: RoomId,
    pub(crate) color: String,
    pub(crate) center: Option<DVec2>,
    pub(crate) radius: f64,
    pub(crate) is_ready: bool,
    pub(crate) is_alive: bool,
    pub(crate) is_bot: bool,
}

impl Player {
    /// A human who has not chosen a point yet.
    pub fn human(id: PlayerId, name: String, room_id: RoomId, color: String, radius: f64) -> Self {
        Self {
            id,
            name,
            room_id,
            color,
            center: None,
            radius,
            is_ready: false,
            is_alive: true,
            is_bot: false,
        }
    }

    /// A bot standing at `center`. Bots are always ready.
    pub fn bot(
        id: PlayerId,
        name: String,
        room_id: RoomId,
        color: String,
        radius: f64,
        center: DVec2,
    ) -> Self {
        Self {
            center: Some(center),
            is_ready: true,
            is_bot: true,
            ..Self::human(id, name, room_id, color, radius)
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn center(&self) -> Option<DVec2> {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn is_bot(&self) -> bool {
        self.is_bot
    }

    /// Ready and not yet eliminated: the players a tick acts on.
    pub fn is_contending(&self) -> bool {
        self.is_ready && self.is_alive && self.center.is_some()
    }

    /// `None` until a point has been chosen.
    pub fn to_shape(&self) -> Option<Circle> {
        self.center.map(|c| Circle::new(c, self.radius))
    }

    pub fn to_view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            x: self.center.map(|c| c.x),
            y: self.center.map(|c| c.y),
            radius: self.radius,
            color: self.color.clone(),
            is_ready: self.is_ready,
            is_alive: self.is_alive,
            is_bot: self.is_bot,
        }
    }

    /// Back to the state of a player who just joined.
    pub(crate) fn clear_round(&mut self, base_radius: f64) {
        self.center = None;
        self.radius = base_radius;
        self.is_ready = false;
        self.is_alive = true;
    }
}

/// Longest display name kept, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Cleans a client-supplied name for display: control characters are
/// dropped, surrounding whitespace trimmed, and the rest cut to
/// [`MAX_NAME_CHARS`]. An empty result becomes `"Player"`.
pub fn display_name(raw: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();
    let name = name.trim_end();
    if name.is_empty() {
        "Player".to_owned()
    } else {
        name.to_owned()
    }
}

/// A random `#rrggbb` display color.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("#{:06x}", rng.random_range(0..=0xff_ffffu32))
}
