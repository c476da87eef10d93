//! The round state machine of one room.
//!
//! A [`Game`] owns every player and obstacle of a room and is the only
//! thing that mutates them. It has no notion of time or connections: the
//! room actor calls [`Game::tick`] at its own rate and turns the results
//! into broadcasts.

use std::collections::BTreeMap;

use circlefield_protocol::{
    ObstacleId, PlayerId, RoomId, RoomSnapshot, RoundPhase, RoundStatus,
};
use glam::DVec2;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, trace};

use crate::entity::{display_name, generate_layout, random_color};
use crate::geometry::{Circle, circle_intersects_circle, circle_intersects_polygon};
use crate::{ArenaConfig, GameError, Obstacle, Player};

/// What a single call to [`Game::tick`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Players eliminated on this tick, by id.
    pub eliminated: Vec<PlayerId>,
    /// `true` on the tick that ended the round.
    pub finished: bool,
}

/// One arena: players, obstacles, and where the round stands.
#[derive(Debug)]
pub struct Game {
    room_id: RoomId,
    config: ArenaConfig,
    players: BTreeMap<PlayerId, Player>,
    obstacles: BTreeMap<ObstacleId, Obstacle>,
    phase: RoundPhase,
    status: RoundStatus,
    /// Ready players when the round began.
    participants: usize,
    next_obstacle_id: u64,
    rng: StdRng,
}

impl Game {
    /// Creates a room in the lobby with a fresh obstacle layout and one
    /// ready bot per id in `bot_ids`.
    ///
    /// # Errors
    /// [`GameError::ObstacleGenerationExhausted`] or
    /// [`GameError::PlacementExhausted`] when the layout cannot be built.
    pub fn new(
        room_id: RoomId,
        config: ArenaConfig,
        bot_ids: &[PlayerId],
        mut rng: StdRng,
    ) -> Result<Self, GameError> {
        config.validate()?;
        let layout = generate_layout(
            config.obstacle_count,
            0,
            config.field(),
            config.obstacle_size(),
            config.max_placement_attempts,
            &mut rng,
        )?;
        let spots = place_bots(&config, &mut rng, bot_ids, &layout)?;
        let mut game = Self::with_obstacles(room_id, config, layout, rng);

        for (n, (id, center)) in spots.into_iter().enumerate() {
            let color = random_color(&mut game.rng);
            let bot = Player::bot(
                id,
                format!("Bot {}", n + 1),
                game.room_id.clone(),
                color,
                game.config.base_radius,
                center,
            );
            game.players.insert(id, bot);
        }
        Ok(game)
    }

    /// Creates a room in the lobby around a fixed obstacle layout, with no
    /// players.
    pub fn with_obstacles(
        room_id: RoomId,
        config: ArenaConfig,
        obstacles: Vec<Obstacle>,
        rng: StdRng,
    ) -> Self {
        let next_obstacle_id = obstacles
            .iter()
            .map(|o| o.id().0 + 1)
            .max()
            .unwrap_or(0);
        Self {
            room_id,
            config,
            players: BTreeMap::new(),
            obstacles: obstacles.into_iter().map(|o| (o.id(), o)).collect(),
            phase: RoundPhase::Lobby,
            status: RoundStatus::default(),
            participants: 0,
            next_obstacle_id,
            rng,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn status(&self) -> &RoundStatus {
        &self.status
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.values()
    }

    // -- membership ---------------------------------------------------------

    /// Adds a human who has not chosen a point yet. Allowed in every phase;
    /// a player who joins mid-round sits out until the next one. The name
    /// goes through [`display_name`](crate::display_name).
    pub fn add_player(&mut self, id: PlayerId, name: String) -> Result<&Player, GameError> {
        if self.players.contains_key(&id) {
            return Err(GameError::DuplicatePlayer(id));
        }
        if self.players.len() >= self.config.max_players {
            return Err(GameError::RoomFull {
                max: self.config.max_players,
            });
        }
        let color = random_color(&mut self.rng);
        let player = Player::human(
            id,
            display_name(&name),
            self.room_id.clone(),
            color,
            self.config.base_radius,
        );
        info!(room_id = %self.room_id, player_id = %id, "player added");
        Ok(self.players.entry(id).or_insert(player))
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Result<Player, GameError> {
        let player = self
            .players
            .remove(&id)
            .ok_or(GameError::UnknownPlayer(id))?;
        info!(room_id = %self.room_id, player_id = %id, "player removed");
        Ok(player)
    }

    // -- round lifecycle ----------------------------------------------------

    /// Records `(x, y)` as the player's starting point and returns whether
    /// it was accepted.
    ///
    /// The point is kept either way. It is accepted when the base-radius
    /// circle touches no obstacle. A centre off the field is refused, but a
    /// circle that pokes past a wall is not: it dies on the first tick.
    /// Overlap with other players is not checked.
    pub fn select_point(&mut self, id: PlayerId, x: f64, y: f64) -> Result<bool, GameError> {
        if self.phase != RoundPhase::Lobby {
            return Err(GameError::InvalidPhase {
                action: "select a point",
                phase: self.phase,
            });
        }
        let base_radius = self.config.base_radius;
        let circle = Circle::new(DVec2::new(x, y), base_radius);
        let on_field = (0.0..=self.config.field_width).contains(&x)
            && (0.0..=self.config.field_height).contains(&y);
        let accepted = on_field && self.is_free_of_obstacles(&circle);

        let player = self
            .players
            .get_mut(&id)
            .ok_or(GameError::UnknownPlayer(id))?;
        player.center = Some(circle.center);
        player.radius = base_radius;
        player.is_ready = accepted;
        debug!(room_id = %self.room_id, player_id = %id, x, y, accepted, "point selected");
        Ok(accepted)
    }

    /// Starts the round. Returns `Ok(false)` if it is already running.
    pub fn begin_simulation(&mut self) -> Result<bool, GameError> {
        match self.phase {
            RoundPhase::RoundActive => Ok(false),
            RoundPhase::RoundOver => Err(GameError::InvalidPhase {
                action: "start the round",
                phase: self.phase,
            }),
            RoundPhase::Lobby => {
                let participants = self.players.values().filter(|p| p.is_contending()).count();
                if participants == 0 {
                    return Err(GameError::NoParticipants);
                }
                self.participants = participants;
                self.phase = RoundPhase::RoundActive;
                info!(room_id = %self.room_id, participants, "round started");
                Ok(true)
            }
        }
    }

    /// Advances the round by one step. Does nothing outside `RoundActive`.
    ///
    /// Every alive ready circle grows, then each is checked against the
    /// field bounds, the obstacles, and every other alive ready circle.
    /// Eliminations are decided on the grown state and applied together.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != RoundPhase::RoundActive {
            return TickOutcome::default();
        }

        let growth = self.config.growth_per_tick;
        let mut survivors = Vec::new();
        for player in self.players.values_mut().filter(|p| p.is_contending()) {
            player.radius += growth;
            survivors.push(player.id);
        }

        let circles: Vec<(PlayerId, Circle)> = self
            .players
            .values()
            .filter(|p| p.is_contending())
            .filter_map(|p| p.to_shape().map(|c| (p.id, c)))
            .collect();
        let (width, height) = (self.config.field_width, self.config.field_height);
        let eliminated: Vec<PlayerId> = circles
            .iter()
            .filter(|(id, circle)| {
                circle.exceeds_bounds(width, height)
                    || !self.is_free_of_obstacles(circle)
                    || circles
                        .iter()
                        .any(|(other, c)| other != id && circle_intersects_circle(circle, c))
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &eliminated {
            if let Some(player) = self.players.get_mut(id) {
                player.is_alive = false;
            }
        }
        if !eliminated.is_empty() {
            debug!(room_id = %self.room_id, eliminated = eliminated.len(), "players eliminated");
        }

        let finished = self.alive_players().next().is_none();
        if finished {
            self.finish_round(&survivors);
        } else {
            trace!(room_id = %self.room_id, "tick");
        }
        TickOutcome {
            eliminated,
            finished,
        }
    }

    /// Everyone alive at the start of the final tick shares the win, unless
    /// the round only ever had one participant.
    fn finish_round(&mut self, last_alive: &[PlayerId]) {
        let winners = if self.participants <= 1 {
            Vec::new()
        } else {
            last_alive
                .iter()
                .filter_map(|id| self.players.get(id))
                .map(Player::to_view)
                .collect()
        };
        self.status = RoundStatus {
            is_tie: winners.len() != 1,
            winners,
        };
        self.phase = RoundPhase::RoundOver;
        info!(
            room_id = %self.room_id,
            winners = self.status.winners.len(),
            is_tie = self.status.is_tie,
            "round over"
        );
    }

    /// Starts a new round: fresh obstacles, cleared humans, re-placed bots.
    ///
    /// # Errors
    /// Layout generation failures. The room is left exactly as it was.
    pub fn reset(&mut self) -> Result<(), GameError> {
        let layout = generate_layout(
            self.config.obstacle_count,
            self.next_obstacle_id,
            self.config.field(),
            self.config.obstacle_size(),
            self.config.max_placement_attempts,
            &mut self.rng,
        )?;
        let bot_ids: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.is_bot)
            .map(|p| p.id)
            .collect();
        let spots = place_bots(&self.config, &mut self.rng, &bot_ids, &layout)?;

        self.next_obstacle_id += layout.len() as u64;
        self.obstacles = layout.into_iter().map(|o| (o.id(), o)).collect();
        let base_radius = self.config.base_radius;
        for player in self.players.values_mut() {
            player.clear_round(base_radius);
        }
        for (id, center) in spots {
            if let Some(bot) = self.players.get_mut(&id) {
                bot.center = Some(center);
                bot.is_ready = true;
            }
        }
        self.status = RoundStatus::default();
        self.participants = 0;
        self.phase = RoundPhase::Lobby;
        info!(room_id = %self.room_id, "room reset");
        Ok(())
    }

    // -- derived views ------------------------------------------------------

    /// Ready players still in the round.
    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.is_contending())
    }

    pub fn ready_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.is_ready)
    }

    /// `true` when there is at least one player and all of them are ready.
    pub fn is_all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.is_ready)
    }

    /// `(ready humans, total humans)`.
    pub fn ready_counts(&self) -> (usize, usize) {
        self.players
            .values()
            .filter(|p| !p.is_bot)
            .fold((0, 0), |(ready, total), p| (ready + usize::from(p.is_ready), total + 1))
    }

    pub fn human_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_bot).count()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_round_over(&self) -> bool {
        self.phase == RoundPhase::RoundOver
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            phase: self.phase,
            field: self.config.field(),
            players: self
                .players
                .iter()
                .map(|(id, p)| (*id, p.to_view()))
                .collect(),
            obstacles: self
                .obstacles
                .iter()
                .map(|(id, o)| (*id, o.to_view()))
                .collect(),
            status: self.status.clone(),
        }
    }

    // -- placement ----------------------------------------------------------

    fn is_free_of_obstacles(&self, circle: &Circle) -> bool {
        !self
            .obstacles
            .values()
            .any(|o| circle_intersects_polygon(circle, &o.to_shape()))
    }
}

/// Picks a starting point for each bot against `layout`, avoiding the
/// obstacles and every bot placed before it.
fn place_bots(
    config: &ArenaConfig,
    rng: &mut StdRng,
    bot_ids: &[PlayerId],
    layout: &[Obstacle],
) -> Result<Vec<(PlayerId, DVec2)>, GameError> {
    let shapes: Vec<_> = layout.iter().map(Obstacle::to_shape).collect();
    let radius = config.base_radius;
    let (max_x, max_y) = (config.field_width - radius, config.field_height - radius);
    let attempts = config.max_placement_attempts;

    let mut placed: Vec<(PlayerId, DVec2)> = Vec::with_capacity(bot_ids.len());
    for &id in bot_ids {
        let spot = (0..attempts).find_map(|_| {
            let center = DVec2::new(
                rng.random_range(radius..=max_x),
                rng.random_range(radius..=max_y),
            );
            let circle = Circle::new(center, radius);
            let clear = !shapes.iter().any(|s| circle_intersects_polygon(&circle, s))
                && !placed
                    .iter()
                    .any(|(_, other)| circle_intersects_circle(&circle, &Circle::new(*other, radius)));
            clear.then_some(center)
        });
        match spot {
            Some(center) => placed.push((id, center)),
            None => return Err(GameError::PlacementExhausted(id, attempts)),
        }
    }
    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn config() -> ArenaConfig {
        ArenaConfig {
            obstacle_count: 0,
            bot_count: 0,
            ..ArenaConfig::default()
        }
    }

    fn empty_game() -> Game {
        Game::with_obstacles(RoomId::from("t"), config(), Vec::new(), StdRng::seed_from_u64(1))
    }

    fn game_with_obstacle() -> Game {
        let obstacle = Obstacle::new(
            ObstacleId(0),
            DVec2::new(100.0, 100.0),
            DVec2::new(100.0, 100.0),
        );
        Game::with_obstacles(
            RoomId::from("t"),
            config(),
            vec![obstacle],
            StdRng::seed_from_u64(1),
        )
    }

    #[test]
    fn test_add_player_duplicate_is_rejected() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        let err = game.add_player(PlayerId(1), "b".into()).unwrap_err();
        assert!(matches!(err, GameError::DuplicatePlayer(PlayerId(1))));
    }

    #[test]
    fn test_add_player_past_capacity_is_room_full() {
        let mut game = Game::with_obstacles(
            RoomId::from("t"),
            ArenaConfig {
                max_players: 1,
                ..config()
            },
            Vec::new(),
            StdRng::seed_from_u64(1),
        );
        game.add_player(PlayerId(1), "a".into()).unwrap();
        assert!(matches!(
            game.add_player(PlayerId(2), "b".into()),
            Err(GameError::RoomFull { max: 1 })
        ));
    }

    #[test]
    fn test_select_point_on_obstacle_is_rejected_but_recorded() {
        let mut game = game_with_obstacle();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        let accepted = game.select_point(PlayerId(1), 150.0, 150.0).unwrap();
        assert!(!accepted);
        let player = game.player(PlayerId(1)).unwrap();
        assert_eq!(player.center(), Some(DVec2::new(150.0, 150.0)));
        assert!(!player.is_ready());
    }

    #[test]
    fn test_select_point_centre_off_field_is_rejected() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        assert!(!game.select_point(PlayerId(1), 900.0, 300.0).unwrap());
        assert!(!game.select_point(PlayerId(1), -5.0, 300.0).unwrap());
        assert!(!game.select_point(PlayerId(1), 400.0, f64::NAN).unwrap());
    }

    #[test]
    fn test_add_player_caps_name_length() {
        let mut game = empty_game();
        let player = game.add_player(PlayerId(1), "n".repeat(5_000)).unwrap();
        assert_eq!(player.name().chars().count(), crate::MAX_NAME_CHARS);
        assert_eq!(game.snapshot().players[&PlayerId(1)].name.len(), crate::MAX_NAME_CHARS);
    }

    #[test]
    fn test_select_point_near_wall_is_accepted() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        // The base circle pokes past the left wall; only obstacles refuse.
        assert!(game.select_point(PlayerId(1), 1.0, 300.0).unwrap());
        assert!(game.player(PlayerId(1)).unwrap().is_ready());
    }

    #[test]
    fn test_tick_point_near_wall_dies_on_first_tick() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        game.add_player(PlayerId(2), "b".into()).unwrap();
        assert!(game.select_point(PlayerId(1), 1.0, 300.0).unwrap());
        assert!(game.select_point(PlayerId(2), 400.0, 300.0).unwrap());
        game.begin_simulation().unwrap();

        let outcome = game.tick();
        assert_eq!(outcome.eliminated, vec![PlayerId(1)]);
        assert!(!outcome.finished);
        assert!(game.player(PlayerId(2)).unwrap().is_alive());
    }

    #[test]
    fn test_select_point_again_resets_radius_and_readiness() {
        let mut game = game_with_obstacle();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        assert!(game.select_point(PlayerId(1), 400.0, 300.0).unwrap());
        assert!(!game.select_point(PlayerId(1), 150.0, 150.0).unwrap());
        assert!(!game.player(PlayerId(1)).unwrap().is_ready());
    }

    #[test]
    fn test_select_point_unknown_player_errors() {
        let mut game = empty_game();
        assert!(matches!(
            game.select_point(PlayerId(9), 400.0, 300.0),
            Err(GameError::UnknownPlayer(PlayerId(9)))
        ));
    }

    #[test]
    fn test_select_point_during_round_is_invalid_phase() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        game.select_point(PlayerId(1), 400.0, 300.0).unwrap();
        game.begin_simulation().unwrap();
        assert!(matches!(
            game.select_point(PlayerId(1), 100.0, 100.0),
            Err(GameError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn test_begin_simulation_without_ready_players_errors() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        assert!(matches!(
            game.begin_simulation(),
            Err(GameError::NoParticipants)
        ));
        assert_eq!(game.phase(), RoundPhase::Lobby);
    }

    #[test]
    fn test_begin_simulation_twice_reports_already_running() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        game.select_point(PlayerId(1), 400.0, 300.0).unwrap();
        assert!(game.begin_simulation().unwrap());
        assert!(!game.begin_simulation().unwrap());
    }

    #[test]
    fn test_tick_in_lobby_changes_nothing() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        game.select_point(PlayerId(1), 400.0, 300.0).unwrap();
        let before = game.snapshot();
        assert_eq!(game.tick(), TickOutcome::default());
        assert_eq!(game.snapshot(), before);
    }

    #[test]
    fn test_tick_ignores_unready_players() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "ready".into()).unwrap();
        game.add_player(PlayerId(2), "idle".into()).unwrap();
        game.select_point(PlayerId(1), 400.0, 300.0).unwrap();
        game.begin_simulation().unwrap();
        game.tick();

        let idle = game.player(PlayerId(2)).unwrap();
        assert_eq!(idle.radius(), 3.0);
        assert!(idle.is_alive());
        assert_eq!(game.player(PlayerId(1)).unwrap().radius(), 5.0);
    }

    #[test]
    fn test_tick_unready_point_is_not_a_collision_target() {
        let mut game = game_with_obstacle();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        game.add_player(PlayerId(2), "b".into()).unwrap();
        // Inside the obstacle: recorded but not ready.
        assert!(!game.select_point(PlayerId(2), 199.0, 150.0).unwrap());
        assert!(game.select_point(PlayerId(1), 207.0, 150.0).unwrap());
        game.begin_simulation().unwrap();

        // Radius 5 at distance 8 would touch player 2's radius 3 if it
        // counted; the obstacle edge is 7 away.
        let outcome = game.tick();
        assert!(outcome.eliminated.is_empty());
        assert!(game.player(PlayerId(1)).unwrap().is_alive());
    }

    #[test]
    fn test_remove_player_unknown_errors() {
        let mut game = empty_game();
        assert!(matches!(
            game.remove_player(PlayerId(4)),
            Err(GameError::UnknownPlayer(_))
        ));
    }

    #[test]
    fn test_remove_last_contender_mid_round_ends_next_tick() {
        let mut game = empty_game();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        game.select_point(PlayerId(1), 400.0, 300.0).unwrap();
        game.begin_simulation().unwrap();
        game.remove_player(PlayerId(1)).unwrap();

        let outcome = game.tick();
        assert!(outcome.finished);
        assert!(game.status().winners.is_empty());
        assert!(game.is_round_over());
    }

    #[test]
    fn test_ready_counts_ignore_bots() {
        let mut game = Game::new(
            RoomId::from("t"),
            config(),
            &[PlayerId(100), PlayerId(101)],
            StdRng::seed_from_u64(2),
        )
        .unwrap();
        game.add_player(PlayerId(1), "a".into()).unwrap();
        game.add_player(PlayerId(2), "b".into()).unwrap();
        game.select_point(PlayerId(2), 400.0, 300.0).unwrap();

        assert_eq!(game.ready_counts(), (1, 2));
        assert_eq!(game.human_count(), 2);
        assert_eq!(game.player_count(), 4);
        assert_eq!(game.ready_players().count(), 3);
        assert!(!game.is_all_ready());
    }

    #[test]
    fn test_is_all_ready_empty_room_is_false() {
        assert!(!empty_game().is_all_ready());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Game::new(
            RoomId::from("t"),
            ArenaConfig {
                base_radius: -1.0,
                ..config()
            },
            &[],
            StdRng::seed_from_u64(1),
        );
        assert!(matches!(result, Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_bot_placement_exhausted_refuses_room() {
        // Bots with radius 250 cannot both fit in 800x600 without touching.
        let result = Game::new(
            RoomId::from("t"),
            ArenaConfig {
                base_radius: 250.0,
                max_placement_attempts: 50,
                ..config()
            },
            &[PlayerId(1), PlayerId(2)],
            StdRng::seed_from_u64(1),
        );
        assert!(matches!(
            result,
            Err(GameError::PlacementExhausted(PlayerId(2), 50))
        ));
    }

    #[test]
    fn test_reset_failure_keeps_previous_layout() {
        let mut game = Game::new(
            RoomId::from("t"),
            ArenaConfig {
                obstacle_count: 2,
                ..config()
            },
            &[],
            StdRng::seed_from_u64(5),
        )
        .unwrap();
        let before = game.snapshot();

        // Make the next layout impossible.
        game.config.obstacle_count = 200;
        game.config.max_placement_attempts = 5;
        assert!(game.reset().is_err());
        assert_eq!(game.snapshot(), before);
    }

    #[test]
    fn test_reset_assigns_fresh_obstacle_ids() {
        let mut game = Game::new(
            RoomId::from("t"),
            ArenaConfig {
                obstacle_count: 2,
                ..config()
            },
            &[],
            StdRng::seed_from_u64(5),
        )
        .unwrap();
        game.reset().unwrap();
        let ids: Vec<_> = game.obstacles().map(Obstacle::id).collect();
        assert_eq!(ids, vec![ObstacleId(2), ObstacleId(3)]);
    }
}
