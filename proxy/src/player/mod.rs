//! Per-session player state.
//!
//! A [`Player`] owns every mirror the proxy keeps for one client: the shadow
//! world, both entity trackers, effects, inventory, gamemode, the movement
//! simulator state and the acknowledgment engine. Components never point back
//! at the player; the player passes itself (or the relevant fields) into each
//! call, and acknowledged actions receive it as `&mut Player`.
//!
//! Handlers live in [`client_handler`] and [`server_handler`]. They return a
//! [`Disposition`] for the packet they were given and may queue extra packets
//! for either side in the [`Outbox`].

pub mod client_handler;
pub mod remap;
pub mod server_handler;

use crate::ack::AckEngine;
use crate::combat::CombatResult;
use crate::component::{Effects, Inventory};
use crate::config::Config;
use crate::entity::EntityTracker;
use crate::movement::MovementState;
use crate::world::block::BlockRegistry;
use crate::world::cache::ChunkCache;
use crate::world::World;
use crate::world_updater::WorldUpdater;
use log::{debug, info};
use rand::rngs::StdRng;
use remap::RuntimeIdMap;
use shared::{
    ChunkPos, ClientIdentity, GameMode, InputMode, MoveMode, Packet, Rotation, Vec3,
    PLAYER_EYE_HEIGHT,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Server ticks between latency probes.
pub const LATENCY_PROBE_INTERVAL: u64 = 10;
/// Server ticks between unsubscribing far chunks.
pub const CHUNK_CLEANUP_INTERVAL: u64 = 20;
/// Columns kept beyond the client's view radius.
pub const CHUNK_RANGE_MARGIN: i32 = 4;
pub const DEFAULT_CHUNK_RADIUS: i32 = 8;

/// What the session does with the packet a handler was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Forward the original bytes.
    Forward,
    /// The handler changed the packet; re-encode before forwarding.
    ForwardModified,
    Cancel,
    /// Move the client to another upstream.
    Transfer(String),
}

/// Packets the handlers want written, in order, before the packet being handled.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outbox {
    pub to_client: Vec<Packet>,
    pub to_server: Vec<Packet>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.to_client.is_empty() && self.to_server.is_empty()
    }
}

/// Initial state taken from `StartGame`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSetup {
    pub identity: ClientIdentity,
    pub runtime_id: u64,
    /// Eye position.
    pub position: Vec3,
    pub rotation: Rotation,
    pub gamemode: GameMode,
    pub dimension: i32,
}

impl PlayerSetup {
    pub fn from_start_game(identity: ClientIdentity, packet: &Packet) -> Option<Self> {
        match packet {
            Packet::StartGame {
                runtime_id,
                position,
                pitch,
                yaw,
                gamemode,
                dimension,
                ..
            } => Some(Self {
                identity,
                runtime_id: *runtime_id,
                position: *position,
                rotation: Rotation::new(*pitch, *yaw, *yaw),
                gamemode: *gamemode,
                dimension: *dimension,
            }),
            _ => None,
        }
    }
}

/// An attack held back until the next input shows where the attacker was.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAttack {
    pub target: u64,
    pub packet: Packet,
}

/// Outcome of the latest validated attack, read by the reach detectors.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackReport {
    pub target: u64,
    pub client_tick: u64,
    pub touch: bool,
    /// Found by searching along a swing the client reported as missed.
    pub mispredicted: bool,
    pub result: CombatResult,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CombatState {
    pub pending: Option<PendingAttack>,
    /// Set while handling the input that resolved an attack, cleared on the next input.
    pub last_report: Option<AttackReport>,
}

pub struct Player {
    pub name: String,
    pub identity: ClientIdentity,
    pub config: Arc<Config>,
    /// The player's id on the current upstream.
    pub runtime_id: u64,
    pub remap: RuntimeIdMap,
    pub server_tick: u64,
    /// Tick of the latest `PlayerAuthInput`.
    pub client_tick: u64,
    /// Newest server tick whose batch the client has acknowledged.
    pub acked_server_tick: u64,
    pub ack: AckEngine<Player>,
    pub movement: MovementState,
    /// Entities as the client currently sees them.
    pub client_entities: EntityTracker,
    /// Entities as the server last reported them, with rewind history.
    pub server_entities: EntityTracker,
    pub world: World,
    pub effects: Effects,
    pub inventory: Inventory,
    pub gamemode: GameMode,
    pub world_updater: WorldUpdater,
    pub combat: CombatState,
    pub latency: Duration,
    pub chunk_radius: i32,
    pub dimension: i32,
    pub input_mode: InputMode,
    /// Client tick of the latest arm swing.
    pub last_swing_tick: Option<u64>,
    pub(crate) outbox: Outbox,
}

impl Player {
    pub fn new(
        setup: PlayerSetup,
        config: Arc<Config>,
        cache: Arc<ChunkCache>,
        registry: Arc<BlockRegistry>,
        rng: StdRng,
    ) -> Self {
        let identity = setup.identity;
        let ack = AckEngine::new(
            identity.device_os,
            identity.protocol,
            config.network.nsl_timeout_ticks,
            rng,
        );
        let mut world = World::new(cache, registry);
        world.set_dimension(setup.dimension);

        let mut movement = MovementState::new(setup.position - Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0));
        movement.rotation = setup.rotation;
        movement.last_rotation = setup.rotation;

        let mut player = Self {
            name: identity.name.clone(),
            identity,
            config,
            runtime_id: setup.runtime_id,
            remap: RuntimeIdMap::new(setup.runtime_id),
            server_tick: 0,
            client_tick: 0,
            acked_server_tick: 0,
            ack,
            movement,
            client_entities: EntityTracker::new(),
            server_entities: EntityTracker::new(),
            world,
            effects: Effects::new(),
            inventory: Inventory::new(),
            gamemode: setup.gamemode,
            world_updater: WorldUpdater::new(),
            combat: CombatState::default(),
            latency: Duration::ZERO,
            chunk_radius: DEFAULT_CHUNK_RADIUS,
            dimension: setup.dimension,
            input_mode: InputMode::Unknown,
            last_swing_tick: None,
            outbox: Outbox::default(),
        };
        player.apply_gamemode(setup.gamemode);
        info!(
            "[{}] Joined as runtime id {} in {:?}",
            player.name, player.runtime_id, player.gamemode
        );
        player
    }

    pub fn is_self(&self, runtime_id: u64) -> bool {
        runtime_id == self.runtime_id
    }

    /// Drains the packets the handlers queued since the last call.
    pub fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn apply_gamemode(&mut self, gamemode: GameMode) {
        self.gamemode = gamemode;
        self.movement.flags.can_simulate =
            self.config.movement.simulation_enabled && gamemode.is_validated();
        let flight = matches!(gamemode, GameMode::Creative | GameMode::Spectator);
        self.movement.flags.may_fly = flight;
        if !flight {
            self.movement.flags.flying = false;
            self.movement.flags.trust_fly = false;
        }
        self.movement.flags.no_clip = gamemode == GameMode::Spectator;
    }

    /// Advances one server tick: records entity history, queues the tick
    /// marker and the periodic latency probe, trims far chunks and flushes the
    /// ack batch.
    pub fn tick(&mut self) -> crate::error::Result<()> {
        self.server_tick += 1;
        let tick = self.server_tick;
        self.server_entities.tick(tick);

        self.ack.add(move |p: &mut Player| p.acked_server_tick = p.acked_server_tick.max(tick));
        if tick % LATENCY_PROBE_INTERVAL == 0 {
            let sent = Instant::now();
            self.ack.add(move |p: &mut Player| p.latency = sent.elapsed());
        }

        if tick % CHUNK_CLEANUP_INTERVAL == 0 {
            let center = ChunkPos::from_vec3(self.movement.pos);
            let removed = self
                .world
                .cleanup_range(center, self.chunk_radius + CHUNK_RANGE_MARGIN);
            if removed > 0 {
                debug!("[{}] Unsubscribed {} distant chunks", self.name, removed);
            }
        }

        if let Some(probe) = self.ack.flush()? {
            self.outbox.to_client.push(probe);
        }
        Ok(())
    }

    /// Throws away simulation state and sends the client back to the last safe position.
    pub fn reset_movement(&mut self) {
        let safe = if self.movement.known_safe_pos.is_finite() {
            self.movement.known_safe_pos
        } else {
            self.movement.client_pos
        };
        let rotation = self.movement.rotation;
        let flags = self.movement.flags;
        self.movement = MovementState::new(safe);
        self.movement.rotation = rotation;
        self.movement.last_rotation = rotation;
        self.movement.flags.can_simulate = flags.can_simulate;
        self.movement.flags.may_fly = flags.may_fly;
        self.movement.flags.no_clip = flags.no_clip;
        self.outbox.to_client.push(self.teleport_packet(safe));
        info!("[{}] Movement state reset to {:?}", self.name, safe);
    }

    /// A teleport of the client to `feet`, addressed with the client's own id.
    pub(crate) fn teleport_packet(&self, feet: Vec3) -> Packet {
        Packet::MovePlayer {
            runtime_id: self.remap.client_self(),
            position: feet + Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0),
            pitch: self.movement.rotation.pitch,
            yaw: self.movement.rotation.yaw,
            head_yaw: self.movement.rotation.head_yaw,
            mode: MoveMode::Teleport,
            on_ground: false,
            tick: self.client_tick,
        }
    }

    /// Forfeits state tied to the old upstream before a transfer dial.
    pub fn begin_transfer(&mut self) {
        self.ack.invalidate();
        self.combat = CombatState::default();
    }

    /// Rebinds the player to a new upstream after its `StartGame`.
    pub fn complete_transfer(&mut self, setup: PlayerSetup) {
        self.remap.transfer(setup.runtime_id);
        self.runtime_id = setup.runtime_id;
        self.dimension = setup.dimension;
        self.world.set_dimension(setup.dimension);
        self.client_entities.clear();
        self.server_entities.clear();
        self.effects.clear();
        self.world_updater.reset();
        self.combat = CombatState::default();

        let feet = setup.position - Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0);
        self.movement = MovementState::new(feet);
        self.movement.rotation = setup.rotation;
        self.movement.last_rotation = setup.rotation;
        self.apply_gamemode(setup.gamemode);

        self.outbox.to_client.push(self.teleport_packet(feet));
        self.outbox.to_client.push(Packet::SetPlayerGameType {
            gamemode: setup.gamemode,
        });
        info!(
            "[{}] Transferred: upstream id {} shown to the client as {}",
            self.name,
            setup.runtime_id,
            self.remap.client_self()
        );
    }
}
