//! Room registry: creates, tracks, and routes connections to rooms.
//!
//! The registry is shared behind a `tokio::sync::Mutex`. [`join_room`] and
//! [`leave_room`] take that mutex only for index updates and release it
//! while a room actor answers, so one busy room never stalls lookups for
//! the others.

use std::collections::{HashMap, HashSet};

use circlefield_game::{ArenaConfig, Game};
use circlefield_protocol::{PlayerId, RoomId};
use circlefield_tick::TickConfig;
use circlefield_transport::ConnectionId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::room::spawn_room;
use crate::{PlayerSender, RoomError, RoomHandle};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Which room a connection plays in, and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

/// A join with a room and a player id that the room has not seen yet.
///
/// Produced by [`RoomRegistry::prepare_join`], finished with
/// [`RoomRegistry::complete_join`] once the room accepted the player.
#[derive(Clone)]
pub struct PendingJoin {
    pub handle: RoomHandle,
    pub player_id: PlayerId,
    /// The room was created for this join.
    pub created: bool,
}

/// All live rooms and the connection → membership index.
///
/// The registry is the only place rooms are created or destroyed. A
/// connection is a member of at most one room at a time, and a room is
/// destroyed as soon as its last human leaves.
pub struct RoomRegistry {
    config: ArenaConfig,
    tick_config: TickConfig,
    rooms: HashMap<RoomId, RoomHandle>,
    /// Rooms minted for a join without an id. Nobody else may join them.
    private: HashSet<RoomId>,
    connections: HashMap<ConnectionId, Membership>,
    next_player_id: u64,
    /// Seeds each room's own rng and mints solo room ids.
    rng: StdRng,
}

impl RoomRegistry {
    pub fn new(config: ArenaConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            tick_config: TickConfig::with_rate(config.tick_rate_hz),
            config,
            rooms: HashMap::new(),
            private: HashSet::new(),
            connections: HashMap::new(),
            next_player_id: 1,
            rng,
        }
    }

    /// Overrides the tick settings used for rooms created from now on.
    pub fn with_tick_config(mut self, tick_config: TickConfig) -> Self {
        self.tick_config = tick_config;
        self
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Returns the handle of an existing room or creates it.
    ///
    /// `None` creates a fresh private room with `bot_count` bots under a
    /// newly minted `solo-` id. A named room that does not exist yet is
    /// created without bots. A private room cannot be reached by its id.
    pub fn create_or_get(&mut self, room_id: Option<RoomId>) -> Result<RoomHandle, RoomError> {
        self.ensure_room(room_id).map(|(handle, _)| handle)
    }

    /// Like [`create_or_get`](Self::create_or_get), also reporting whether
    /// the room was created by this call.
    fn ensure_room(&mut self, room_id: Option<RoomId>) -> Result<(RoomHandle, bool), RoomError> {
        let (room_id, bot_count, private) = match room_id {
            Some(id) => {
                if self.private.contains(&id) {
                    return Err(RoomError::PrivateRoom(id));
                }
                if let Some(handle) = self.rooms.get(&id) {
                    return Ok((handle.clone(), false));
                }
                (id, 0, false)
            }
            None => (self.mint_solo_id(), self.config.bot_count, true),
        };

        let bot_ids: Vec<PlayerId> = (0..bot_count).map(|_| self.allocate_player_id()).collect();
        let rng = StdRng::seed_from_u64(self.rng.random());
        let game = Game::new(room_id.clone(), self.config.clone(), &bot_ids, rng).map_err(|err| {
            warn!(%room_id, error = %err, "room refused");
            err
        })?;

        let handle = spawn_room(game, self.tick_config.clone(), DEFAULT_CHANNEL_SIZE);
        self.rooms.insert(room_id.clone(), handle.clone());
        if private {
            self.private.insert(room_id.clone());
        }
        info!(%room_id, bots = bot_count, private, "room created");
        Ok((handle, true))
    }

    /// First half of a join: checks the connection, finds or creates the
    /// room, and allocates the player id.
    pub fn prepare_join(
        &mut self,
        conn: ConnectionId,
        room_id: Option<RoomId>,
    ) -> Result<PendingJoin, RoomError> {
        if let Some(current) = self.connections.get(&conn) {
            return Err(RoomError::AlreadyJoined(conn, current.room_id.clone()));
        }
        let (handle, created) = self.ensure_room(room_id)?;
        Ok(PendingJoin {
            handle,
            player_id: self.allocate_player_id(),
            created,
        })
    }

    /// Second half of a join: records the membership once the room has
    /// accepted the player.
    ///
    /// Fails with [`RoomError::Unavailable`] if the room was destroyed in
    /// between.
    pub fn complete_join(
        &mut self,
        conn: ConnectionId,
        pending: &PendingJoin,
    ) -> Result<Membership, RoomError> {
        let room_id = pending.handle.room_id();
        let live = self
            .rooms
            .get(room_id)
            .is_some_and(|h| h.same_room(&pending.handle));
        if !live {
            return Err(RoomError::Unavailable(room_id.clone()));
        }

        let membership = Membership {
            room_id: room_id.clone(),
            player_id: pending.player_id,
        };
        self.connections.insert(conn, membership.clone());
        debug!(%conn, room_id = %membership.room_id, player_id = %membership.player_id, "connection joined room");
        Ok(membership)
    }

    /// Puts a connection into a room as a new human player, holding the
    /// registry for the whole exchange.
    ///
    /// If the room had to be created for this join and the join then
    /// fails, the room is torn down again.
    pub async fn join(
        &mut self,
        conn: ConnectionId,
        name: String,
        room_id: Option<RoomId>,
        sender: PlayerSender,
    ) -> Result<Membership, RoomError> {
        let pending = self.prepare_join(conn, room_id)?;
        if let Err(err) = pending.handle.join(pending.player_id, name, sender).await {
            if pending.created {
                let _ = self.destroy_room(pending.handle.room_id()).await;
            }
            return Err(err);
        }
        self.complete_join(conn, &pending)
    }

    /// The room and membership of a connection, if it has joined one.
    pub fn lookup(&self, conn: ConnectionId) -> Option<(RoomHandle, Membership)> {
        let membership = self.connections.get(&conn)?;
        let handle = self.rooms.get(&membership.room_id)?;
        Some((handle.clone(), membership.clone()))
    }

    /// Drops a connection's membership and returns it with its room.
    pub fn take_membership(
        &mut self,
        conn: ConnectionId,
    ) -> Result<(RoomHandle, Membership), RoomError> {
        let membership = self
            .connections
            .remove(&conn)
            .ok_or(RoomError::UnknownConnection(conn))?;
        let handle = self
            .rooms
            .get(&membership.room_id)
            .cloned()
            .ok_or_else(|| RoomError::UnknownRoom(membership.room_id.clone()))?;
        Ok((handle, membership))
    }

    /// Takes a connection out of its room, holding the registry for the
    /// whole exchange. The room is destroyed when no human is left in it.
    pub async fn remove(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        let (handle, membership) = self.take_membership(conn)?;
        match handle.leave(membership.player_id).await {
            Ok(0) => {
                if let Some(handle) = self.forget_room(&handle, true) {
                    let _ = handle.shutdown().await;
                }
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(RoomError::Unavailable(room_id)) => {
                self.forget_room(&handle, false);
                Err(RoomError::Unavailable(room_id))
            }
            Err(err) => Err(err),
        }
    }

    /// Shuts a room down and drops every membership pointing at it.
    pub async fn destroy_room(&mut self, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::UnknownRoom(room_id.clone()))?;
        if let Some(handle) = self.forget_room(&handle, false) {
            let _ = handle.shutdown().await;
        }
        Ok(())
    }

    /// Removes the room `handle` points at from the registry, unless it was
    /// already replaced or, with `only_unclaimed`, a connection still
    /// belongs to it. Returns the handle for the caller to shut down.
    pub fn forget_room(&mut self, handle: &RoomHandle, only_unclaimed: bool) -> Option<RoomHandle> {
        let room_id = handle.room_id();
        if !self.rooms.get(room_id)?.same_room(handle) {
            return None;
        }
        if only_unclaimed && self.connections.values().any(|m| &m.room_id == room_id) {
            debug!(%room_id, "room regained a member, kept");
            return None;
        }
        let handle = self.rooms.remove(room_id)?;
        self.private.remove(room_id);
        self.connections.retain(|_, m| &m.room_id != room_id);
        info!(%room_id, "room destroyed");
        Some(handle)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().cloned().collect()
    }

    /// Whether `room_id` names a live room minted for a join without an id.
    pub fn is_private(&self, room_id: &RoomId) -> bool {
        self.private.contains(room_id)
    }

    fn allocate_player_id(&mut self) -> PlayerId {
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        id
    }

    fn mint_solo_id(&mut self) -> RoomId {
        loop {
            let id = RoomId(format!("solo-{:08x}", self.rng.random::<u32>()));
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Joins a connection to a room through a shared registry.
///
/// The registry lock is released while the room actor processes the join.
/// A room created for this join is torn down again if the join fails and
/// nobody else has joined it meanwhile.
pub async fn join_room(
    registry: &Mutex<RoomRegistry>,
    conn: ConnectionId,
    name: String,
    room_id: Option<RoomId>,
    sender: PlayerSender,
) -> Result<Membership, RoomError> {
    let pending = registry.lock().await.prepare_join(conn, room_id)?;

    match pending.handle.join(pending.player_id, name, sender).await {
        Ok(()) => registry.lock().await.complete_join(conn, &pending),
        Err(err) => {
            if pending.created {
                let orphan = registry.lock().await.forget_room(&pending.handle, true);
                if let Some(handle) = orphan {
                    let _ = handle.shutdown().await;
                }
            }
            Err(err)
        }
    }
}

/// Takes a connection out of its room through a shared registry.
///
/// The registry lock is released while the room actor processes the leave.
/// When no human is left the room is destroyed, unless a connection joined
/// it in the meantime.
pub async fn leave_room(registry: &Mutex<RoomRegistry>, conn: ConnectionId) -> Result<(), RoomError> {
    let (handle, membership) = registry.lock().await.take_membership(conn)?;

    match handle.leave(membership.player_id).await {
        Ok(0) => {
            let empty = registry.lock().await.forget_room(&handle, true);
            if let Some(handle) = empty {
                let _ = handle.shutdown().await;
            }
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(RoomError::Unavailable(room_id)) => {
            registry.lock().await.forget_room(&handle, false);
            Err(RoomError::Unavailable(room_id))
        }
        Err(err) => Err(err),
    }
}
