//! Room actor: an isolated Tokio task that owns one arena.
//!
//! Each room runs in its own task and talks to the outside world through an
//! mpsc channel. Commands and simulation ticks are handled one at a time
//! in a single `select!` loop, so everything that changes a room, and
//! every broadcast it makes, happens in one linear order.

use std::collections::BTreeMap;

use circlefield_game::Game;
use circlefield_protocol::{PlayerId, RoomId, RoomSnapshot, RoundPhase, ServerEvent};
use circlefield_tick::{TickConfig, TickScheduler};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use crate::RoomError;

/// Channel sender for delivering events to one player's connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to a room actor through its channel.
///
/// Every command carries a `oneshot` reply channel except `Shutdown`.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SelectPoint {
        player_id: PlayerId,
        x: f64,
        y: f64,
        reply: oneshot::Sender<Result<bool, RoomError>>,
    },
    BeginSimulation {
        reply: oneshot::Sender<Result<bool, RoomError>>,
    },
    Reset {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Replies with the number of humans still in the room.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    GetSnapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Shutdown,
}

/// Room metadata, without the arena itself.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub phase: RoundPhase,
    /// Humans and bots.
    pub player_count: usize,
    pub human_count: usize,
    /// Whether the simulation is currently ticking.
    pub is_ticking: bool,
    /// Ticks run since the room was created.
    pub tick_count: u64,
}

/// Handle to a running room actor.
///
/// Cheap to clone: it is an `mpsc::Sender` and the room's id. Once the
/// actor has stopped, every call fails with [`RoomError::Unavailable`].
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles talk to the same actor. A room id alone can be
    /// reused once the room it named is destroyed.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Adds a human player. The room sends `init` to them and tells
    /// everyone else.
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join {
            player_id,
            name,
            sender,
            reply,
        })
        .await?
    }

    /// Returns whether the point was accepted.
    pub async fn select_point(&self, player_id: PlayerId, x: f64, y: f64) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::SelectPoint {
            player_id,
            x,
            y,
            reply,
        })
        .await?
    }

    /// Starts the round. `Ok(false)` if it was already running.
    pub async fn begin_simulation(&self) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::BeginSimulation { reply })
            .await?
    }

    pub async fn reset(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Reset { reply }).await?
    }

    /// Removes a player and returns how many humans remain.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::GetSnapshot { reply })
            .await
    }

    /// Tells the room to stop. Commands already queued are dropped.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    game: Game,
    /// Outbound channels of the humans in the room. Bots have none.
    senders: BTreeMap<PlayerId, PlayerSender>,
    scheduler: TickScheduler,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        info!(room_id = %self.game.room_id(), "room actor started");

        loop {
            tokio::select! {
                biased;
                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                _ = self.scheduler.wait_for_tick() => self.on_tick(),
            }
        }

        self.scheduler.stop();
        info!(room_id = %self.game.room_id(), "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                name,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_join(player_id, name, sender));
            }
            RoomCommand::SelectPoint {
                player_id,
                x,
                y,
                reply,
            } => {
                let _ = reply.send(self.handle_select(player_id, x, y));
            }
            RoomCommand::BeginSimulation { reply } => {
                let _ = reply.send(self.handle_begin());
            }
            RoomCommand::Reset { reply } => {
                let _ = reply.send(self.handle_reset());
            }
            RoomCommand::Leave { player_id, reply } => {
                let _ = reply.send(self.handle_leave(player_id));
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.game.snapshot());
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.game.add_player(player_id, name)?;
        self.senders.insert(player_id, sender);
        // The last human leaving stops the ticker; a newcomer to a round
        // still in progress picks it up again.
        if self.game.phase() == RoundPhase::RoundActive && !self.scheduler.is_running() {
            self.scheduler.start();
        }
        info!(
            room_id = %self.game.room_id(),
            %player_id,
            humans = self.senders.len(),
            "player joined"
        );

        let snapshot = self.game.snapshot();
        self.send_to(
            player_id,
            ServerEvent::Init {
                player_id,
                room_id: self.game.room_id().clone(),
                field: snapshot.field,
                snapshot: snapshot.clone(),
            },
        );
        self.broadcast_except(player_id, ServerEvent::InitGame { snapshot });
        self.broadcast_ready_counts();
        Ok(())
    }

    fn handle_select(&mut self, player_id: PlayerId, x: f64, y: f64) -> Result<bool, RoomError> {
        let accepted = self.game.select_point(player_id, x, y)?;
        self.send_to(
            player_id,
            ServerEvent::RenderSelect {
                snapshot: self.game.snapshot(),
                accepted,
            },
        );
        self.broadcast_ready_counts();
        Ok(accepted)
    }

    fn handle_begin(&mut self) -> Result<bool, RoomError> {
        let started = self.game.begin_simulation()?;
        if started {
            self.scheduler.start();
        }
        Ok(started)
    }

    fn handle_reset(&mut self) -> Result<(), RoomError> {
        self.game.reset()?;
        self.scheduler.stop();
        self.broadcast(ServerEvent::InitGame {
            snapshot: self.game.snapshot(),
        });
        self.broadcast_ready_counts();
        Ok(())
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.game.remove_player(player_id)?;
        self.senders.remove(&player_id);
        let remaining = self.game.human_count();
        info!(
            room_id = %self.game.room_id(),
            %player_id,
            remaining,
            "player left"
        );

        if remaining == 0 {
            self.scheduler.stop();
        } else {
            self.broadcast(ServerEvent::InitGame {
                snapshot: self.game.snapshot(),
            });
            self.broadcast_ready_counts();
        }
        Ok(remaining)
    }

    fn on_tick(&mut self) {
        let outcome = self.game.tick();
        self.scheduler.record_tick_end();
        trace!(
            room_id = %self.game.room_id(),
            tick = self.scheduler.tick_count(),
            eliminated = outcome.eliminated.len(),
            "tick"
        );

        let snapshot = self.game.snapshot();
        if outcome.finished {
            self.scheduler.stop();
            self.broadcast(ServerEvent::RenderGame {
                snapshot: snapshot.clone(),
            });
            self.broadcast(ServerEvent::GameOver { snapshot });
        } else {
            self.broadcast(ServerEvent::RenderGame { snapshot });
        }
    }

    fn broadcast_ready_counts(&self) {
        let (ready_human_count, total_human_count) = self.game.ready_counts();
        self.broadcast(ServerEvent::ReadyPlayers {
            ready_human_count,
            total_human_count,
        });
    }

    fn broadcast(&self, event: ServerEvent) {
        for player_id in self.senders.keys() {
            self.send_to(*player_id, event.clone());
        }
    }

    fn broadcast_except(&self, excluded: PlayerId, event: ServerEvent) {
        for player_id in self.senders.keys().filter(|id| **id != excluded) {
            self.send_to(*player_id, event.clone());
        }
    }

    /// Drops the event if the player's connection is gone.
    fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            if sender.send(event).is_err() {
                debug!(room_id = %self.game.room_id(), %player_id, "receiver gone, event dropped");
            }
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.game.room_id().clone(),
            phase: self.game.phase(),
            player_count: self.game.player_count(),
            human_count: self.game.human_count(),
            is_ticking: self.scheduler.is_running(),
            tick_count: self.scheduler.tick_count(),
        }
    }
}

/// Spawns a room actor for `game` and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room(game: Game, tick_config: TickConfig, channel_size: usize) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let room_id = game.room_id().clone();

    let actor = RoomActor {
        game,
        senders: BTreeMap::new(),
        scheduler: TickScheduler::new(tick_config),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
