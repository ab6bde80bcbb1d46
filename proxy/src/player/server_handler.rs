//! Upstream packets.
//!
//! Anything that changes what the client sees is applied to the client-facing
//! mirrors only through the ack engine, once the client has received it. The
//! server-authoritative entity tracker is updated immediately.

use super::{Disposition, Player, PlayerSetup};
use crate::entity::Entity;
use crate::error::{ProxyError, Result};
use crate::world::chunk::Chunk;
use log::{debug, info};
use shared::{ActorData, EffectOperation, MoveMode, Packet, Vec3, PLAYER_EYE_HEIGHT};

/// Attribute carrying the player's base movement speed.
pub const MOVEMENT_ATTRIBUTE: &str = "minecraft:movement";

fn apply_actor_data(entity: &mut Entity, data: &ActorData) {
    if let Some(width) = data.width {
        entity.width = width;
    }
    if let Some(height) = data.height {
        entity.height = height;
    }
    if let Some(scale) = data.scale {
        entity.scale = scale;
    }
}

impl Player {
    pub fn handle_server_packet(&mut self, packet: &mut Packet) -> Result<Disposition> {
        if matches!(packet, Packet::StartGame { .. }) {
            if let Some(setup) = PlayerSetup::from_start_game(self.identity.clone(), packet) {
                self.complete_transfer(setup);
            }
            return Ok(Disposition::Cancel);
        }

        let disposition = match packet {
            Packet::MovePlayer {
                runtime_id,
                position,
                mode,
                on_ground,
                ..
            } => {
                self.handle_move(*runtime_id, *position, *mode, *on_ground);
                Disposition::Forward
            }
            Packet::MoveActorAbsolute {
                runtime_id,
                position,
                teleport,
                ..
            } => {
                if !self.is_self(*runtime_id) {
                    self.move_other(*runtime_id, *position, *teleport);
                }
                Disposition::Forward
            }
            Packet::AddActor {
                runtime_id,
                entity_type,
                position,
                velocity,
                data,
            } => {
                let mut entity = Entity::new(*runtime_id, entity_type, *position, false);
                entity.velocity = *velocity;
                apply_actor_data(&mut entity, data);
                self.track(entity);
                Disposition::Forward
            }
            Packet::AddPlayer {
                runtime_id,
                position,
                velocity,
                ..
            } => {
                let mut entity = Entity::player(*runtime_id, *position);
                entity.velocity = *velocity;
                self.track(entity);
                Disposition::Forward
            }
            Packet::RemoveActor { runtime_id } => {
                let id = *runtime_id;
                self.server_entities.remove(id);
                self.ack.add(move |p: &mut Player| {
                    p.client_entities.remove(id);
                });
                Disposition::Forward
            }
            Packet::SetActorMotion {
                runtime_id,
                velocity,
                ..
            } => {
                if self.is_self(*runtime_id) {
                    let velocity = *velocity;
                    self.ack.add(move |p: &mut Player| p.movement.queue_knockback(velocity));
                }
                Disposition::Forward
            }
            Packet::SetActorData { runtime_id, data, .. } => {
                let (id, data) = (*runtime_id, *data);
                if self.is_self(id) {
                    self.ack.add(move |p: &mut Player| p.apply_self_data(&data));
                } else {
                    if let Some(entity) = self.server_entities.find_mut(id) {
                        apply_actor_data(entity, &data);
                    }
                    self.ack.add(move |p: &mut Player| {
                        if let Some(entity) = p.client_entities.find_mut(id) {
                            apply_actor_data(entity, &data);
                        }
                    });
                }
                Disposition::Forward
            }
            Packet::UpdateAttributes {
                runtime_id,
                attributes,
                ..
            } => {
                if self.is_self(*runtime_id) {
                    if let Some(speed) = attributes.iter().find(|a| a.name == MOVEMENT_ATTRIBUTE) {
                        let value = speed.value;
                        self.ack.add(move |p: &mut Player| p.movement.movement_speed = value);
                    }
                }
                Disposition::Forward
            }
            Packet::MobEffect {
                runtime_id,
                operation,
                effect_id,
                amplifier,
                duration,
                ..
            } => {
                if self.is_self(*runtime_id) {
                    let (operation, id, amplifier, duration) = (*operation, *effect_id, *amplifier, *duration);
                    self.ack.add(move |p: &mut Player| match operation {
                        EffectOperation::Add | EffectOperation::Modify => {
                            p.effects.add(id, amplifier, duration)
                        }
                        EffectOperation::Remove => {
                            p.effects.remove(id);
                        }
                    });
                }
                Disposition::Forward
            }
            Packet::SetPlayerGameType { gamemode } => {
                let gamemode = *gamemode;
                self.ack.add(move |p: &mut Player| p.apply_gamemode(gamemode));
                Disposition::Forward
            }
            Packet::UpdateAbilities {
                runtime_id,
                abilities,
            } => {
                if self.is_self(*runtime_id) {
                    let abilities = *abilities;
                    self.ack.add(move |p: &mut Player| {
                        let flags = &mut p.movement.flags;
                        flags.may_fly = abilities.may_fly;
                        flags.flying = abilities.flying && abilities.may_fly;
                        flags.trust_fly = flags.flying;
                        flags.no_clip = abilities.no_clip;
                    });
                }
                Disposition::Forward
            }
            Packet::LevelChunk {
                position,
                dimension,
                payload,
            } => {
                if *dimension != self.dimension {
                    debug!("[{}] Chunk {:?} for dimension {} ignored", self.name, position, dimension);
                    return Ok(Disposition::Forward);
                }
                let chunk = Chunk::decode(payload).map_err(|e| ProxyError::ChunkDecode(e.to_string()))?;
                let pos = *position;
                self.ack.add(move |p: &mut Player| p.world.add_chunk(pos, chunk));
                Disposition::Forward
            }
            Packet::UpdateBlock {
                position,
                block_runtime_id,
                layer,
            } => {
                let (pos, id, layer) = (*position, *block_runtime_id, *layer as usize);
                self.ack.add(move |p: &mut Player| {
                    p.world.set_block_layer(pos, layer, id);
                });
                Disposition::Forward
            }
            Packet::ChunkRadiusUpdated { radius } => {
                self.chunk_radius = (*radius).max(1);
                Disposition::Forward
            }
            Packet::InventoryContent { window_id, items } => {
                let (window, items) = (*window_id, items.clone());
                self.ack.add(move |p: &mut Player| p.inventory.set_content(window, items));
                Disposition::Forward
            }
            Packet::InventorySlot { window_id, slot, item } => {
                let (window, slot, item) = (*window_id, *slot, item.clone());
                self.ack.add(move |p: &mut Player| {
                    p.inventory.set_slot(window, slot, item);
                });
                Disposition::Forward
            }
            Packet::ItemStackResponse { responses } => {
                let responses = responses.clone();
                self.ack.add(move |p: &mut Player| p.inventory.respond(&responses));
                Disposition::Forward
            }
            Packet::Transfer { address } => {
                info!("[{}] Upstream requested transfer to {}", self.name, address);
                Disposition::Transfer(address.clone())
            }
            _ => Disposition::Forward,
        };

        let modified = self.remap.server_to_client(packet);
        Ok(match disposition {
            Disposition::Forward if modified => Disposition::ForwardModified,
            other => other,
        })
    }

    fn handle_move(&mut self, runtime_id: u64, position: Vec3, mode: MoveMode, on_ground: bool) {
        if !self.is_self(runtime_id) {
            self.move_other(runtime_id, position, mode == MoveMode::Teleport);
            return;
        }
        if mode == MoveMode::Rotation {
            return;
        }
        let feet = position - Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0);
        let smoothed = mode == MoveMode::Normal;
        self.ack
            .add(move |p: &mut Player| p.movement.queue_teleport(feet, on_ground, smoothed));
    }

    fn move_other(&mut self, runtime_id: u64, position: Vec3, teleport: bool) {
        let tick = self.server_tick;
        self.server_entities
            .move_entity(runtime_id, tick, position, teleport);
        self.ack.add(move |p: &mut Player| {
            let tick = p.client_tick;
            p.client_entities
                .move_entity(runtime_id, tick, position, teleport);
        });
    }

    fn track(&mut self, entity: Entity) {
        self.server_entities.add(entity.clone());
        self.ack.add(move |p: &mut Player| p.client_entities.add(entity));
    }

    fn apply_self_data(&mut self, data: &ActorData) {
        let scale = data.scale.unwrap_or(1.0);
        if let Some(width) = data.width {
            self.movement.width = width * scale;
        }
        if let Some(immobile) = data.immobile {
            self.movement.flags.immobile = immobile;
        }
    }
}
