//! Arena configuration.

use circlefield_protocol::FieldSize;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::GameError;

/// Tunables for every room on a server.
///
/// Missing fields fall back to the defaults when deserialized, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Field width, shared with clients.
    pub field_width: f64,
    /// Field height, shared with clients.
    pub field_height: f64,
    /// Radius of a freshly placed circle.
    pub base_radius: f64,
    /// Radius added to every alive circle on each tick.
    pub growth_per_tick: f64,
    /// Obstacles generated per round.
    pub obstacle_count: usize,
    pub obstacle_width: f64,
    pub obstacle_height: f64,
    /// Bots added to a room created without an id.
    pub bot_count: usize,
    /// Players (humans and bots) allowed in one room.
    pub max_players: usize,
    /// Rejection-sampling budget per obstacle or bot.
    pub max_placement_attempts: u32,
    /// Simulation rate.
    pub tick_rate_hz: u32,
    /// Fixed RNG seed for reproducible layouts. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            field_width: 800.0,
            field_height: 600.0,
            base_radius: 3.0,
            growth_per_tick: 2.0,
            obstacle_count: 3,
            obstacle_width: 100.0,
            obstacle_height: 100.0,
            bot_count: 3,
            max_players: 16,
            max_placement_attempts: 1_000,
            tick_rate_hz: 60,
            seed: None,
        }
    }
}

impl ArenaConfig {
    pub fn field(&self) -> FieldSize {
        FieldSize {
            width: self.field_width,
            height: self.field_height,
        }
    }

    pub fn obstacle_size(&self) -> DVec2 {
        DVec2::new(self.obstacle_width, self.obstacle_height)
    }

    /// Rejects configurations the simulation cannot run with.
    ///
    /// Obstacles that fit the field but not in the requested number are
    /// only detected when a layout is generated.
    pub fn validate(&self) -> Result<(), GameError> {
        let positive = [
            ("field_width", self.field_width),
            ("field_height", self.field_height),
            ("base_radius", self.base_radius),
            ("growth_per_tick", self.growth_per_tick),
            ("obstacle_width", self.obstacle_width),
            ("obstacle_height", self.obstacle_height),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(GameError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if self.obstacle_count > 0
            && (self.obstacle_width > self.field_width || self.obstacle_height > self.field_height)
        {
            return Err(GameError::InvalidConfig(format!(
                "obstacle {}x{} does not fit the {}x{} field",
                self.obstacle_width, self.obstacle_height, self.field_width, self.field_height
            )));
        }
        if self.base_radius * 2.0 > self.field_width.min(self.field_height) {
            return Err(GameError::InvalidConfig(
                "base_radius does not fit the field".into(),
            ));
        }
        if self.bot_count > self.max_players {
            return Err(GameError::InvalidConfig(format!(
                "bot_count {} exceeds max_players {}",
                self.bot_count, self.max_players
            )));
        }
        if self.max_placement_attempts == 0 {
            return Err(GameError::InvalidConfig(
                "max_placement_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_shared_field_size() {
        let config = ArenaConfig::default();
        assert_eq!(config.field().width, 800.0);
        assert_eq!(config.field().height, 600.0);
        assert_eq!(config.tick_rate_hz, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ArenaConfig =
            serde_json::from_str(r#"{"bot_count": 5, "seed": 7}"#).unwrap();
        assert_eq!(config.bot_count, 5);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.obstacle_count, 3);
    }

    #[test]
    fn test_validate_rejects_zero_growth() {
        let config = ArenaConfig {
            growth_per_tick: 0.0,
            ..ArenaConfig::default()
        };
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_obstacle_larger_than_field() {
        let config = ArenaConfig {
            obstacle_width: 900.0,
            ..ArenaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_oversized_obstacle_when_none_requested() {
        let config = ArenaConfig {
            obstacle_width: 900.0,
            obstacle_count: 0,
            ..ArenaConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_more_bots_than_slots() {
        let config = ArenaConfig {
            bot_count: 4,
            max_players: 3,
            ..ArenaConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
