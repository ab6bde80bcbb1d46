//! Client packets.
//!
//! `PlayerAuthInput` drives everything: it advances the movement simulation,
//! accrues block breaking, validates item use and resolves the attack queued
//! since the previous input.

use super::{AttackReport, Disposition, PendingAttack, Player};
use crate::combat::{
    find_mispredicted_target, validate_attack, AttackerSnapshot, CombatOptions, VictimSnapshot,
};
use crate::error::{ProxyError, Result};
use crate::movement::simulate::{self, SimulationContext, TickOutcome};
use crate::movement::Validation;
use crate::world_updater::{resync_packets, EditContext};
use log::debug;
use shared::{
    Aabb, AnimateAction, Face, InputFlags, InputMode, Packet, PlayerAuthInput, TransactionData,
    UseItemAction, UseItemOnEntityAction, UseItemOnEntityData, Vec3, PLAYER_EYE_HEIGHT,
};

impl Player {
    pub fn handle_client_packet(&mut self, packet: &mut Packet) -> Result<Disposition> {
        let modified = self.remap.client_to_server(packet);

        let disposition = match packet {
            Packet::NetworkStackLatency { timestamp, .. } => self.handle_latency_echo(*timestamp),
            Packet::PlayerAuthInput(input) => self.handle_input(input)?,
            Packet::InventoryTransaction { request_id, data } => {
                self.handle_transaction(*request_id, data)
            }
            Packet::ItemStackRequest { requests } => {
                for request in requests.iter() {
                    self.inventory.request(request.clone());
                }
                Disposition::Forward
            }
            Packet::MobEquipment { hotbar_slot, .. } => {
                self.inventory.set_held_slot(*hotbar_slot as u32);
                Disposition::Forward
            }
            Packet::Animate {
                action: AnimateAction::SwingArm,
                ..
            } => {
                self.last_swing_tick = Some(self.client_tick);
                Disposition::Forward
            }
            _ => Disposition::Forward,
        };

        Ok(match disposition {
            Disposition::Forward if modified => Disposition::ForwardModified,
            other => other,
        })
    }

    /// Runs every batch up to the echoed one. Echoes of probes we never sent
    /// belong to the upstream and are forwarded.
    fn handle_latency_echo(&mut self, timestamp: i64) -> Disposition {
        match self.ack.acknowledge(timestamp) {
            Some(actions) => {
                for action in actions {
                    action(self);
                }
                Disposition::Cancel
            }
            None => Disposition::Forward,
        }
    }

    fn handle_input(&mut self, input: &mut PlayerAuthInput) -> Result<Disposition> {
        self.ack.tick()?;
        self.client_tick = input.tick;
        self.input_mode = input.input_mode;
        self.client_entities.tick(input.tick);
        self.effects.tick();
        self.combat.last_report = None;

        self.simulate_movement(input)?;
        let modified = self.update_world(input);

        if let Some(pending) = self.combat.pending.take() {
            self.resolve_attack(pending);
        }
        if input.input_data.has(InputFlags::MISSED_SWING) {
            self.last_swing_tick = Some(input.tick);
            if !self.is_touch() && self.gamemode.is_validated() {
                self.search_missed_swing(input);
            }
        }

        Ok(if modified {
            Disposition::ForwardModified
        } else {
            Disposition::Forward
        })
    }

    fn simulate_movement(&mut self, input: &PlayerAuthInput) -> Result<()> {
        self.movement.update_input(input);
        self.movement.flags.can_simulate =
            self.config.movement.simulation_enabled && self.gamemode.is_validated();

        let ctx = SimulationContext {
            world: &self.world,
            effects: &self.effects,
            knockback_resistance: self.inventory.knockback_resistance(),
        };
        let outcome = simulate::tick(&mut self.movement, &ctx);

        let validation = match outcome {
            TickOutcome::Invalid => {
                return Err(ProxyError::StateDivergence(format!(
                    "non-finite movement state at tick {}",
                    input.tick
                )));
            }
            TickOutcome::Unloaded => {
                debug!("[{}] Standing in an unloaded chunk, trusting client", self.name);
                self.movement.trust_client()
            }
            outcome if outcome.trusts_client() => self.movement.trust_client(),
            _ => self
                .movement
                .validate(self.config.movement.correction_threshold),
        };

        if let Validation::Corrected {
            position,
            velocity,
            on_ground,
        } = validation
        {
            debug!("[{}] Correcting movement at tick {}", self.name, input.tick);
            self.outbox.to_client.push(Packet::CorrectPlayerMovePrediction {
                position: position + Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0),
                delta: velocity,
                on_ground,
                tick: input.tick,
            });
            self.ack
                .add(|p: &mut Player| p.movement.correction_acknowledged());
        }
        Ok(())
    }

    /// Block actions and item use. Returns whether the input was altered.
    fn update_world(&mut self, input: &mut PlayerAuthInput) -> bool {
        if input.block_actions.is_empty() && input.item_interaction.is_none() && self.world_updater.breaking().is_none() {
            return false;
        }

        let entity_boxes: Vec<Aabb> = if input.item_interaction.is_some() {
            self.client_entities.iter().map(|e| e.bounding_box()).collect()
        } else {
            Vec::new()
        };
        let held = self.inventory.held_item();
        let ctx = EditContext {
            eye: self.movement.eye_position(),
            player_box: self.movement.bounding_box(),
            entity_boxes: &entity_boxes,
            held: &held,
            effects: &self.effects,
            on_ground: self.movement.flags.on_ground,
            validate: self.gamemode.is_validated(),
        };
        let outcome = self
            .world_updater
            .process_input(input, &mut self.world, &ctx);

        if !outcome.rejections.is_empty() {
            debug!(
                "[{}] Rejected world edits {:?} at {:?}",
                self.name, outcome.rejections, outcome.resync
            );
            let resync = resync_packets(&self.world, &outcome.resync);
            self.outbox.to_client.extend(resync);
        }
        outcome.modified
    }

    fn handle_transaction(&mut self, request_id: i32, data: &mut TransactionData) -> Disposition {
        match data {
            TransactionData::UseItemOnEntity(entity) if entity.action == UseItemOnEntityAction::Attack => {
                if let Some(previous) = self.combat.pending.replace(PendingAttack {
                    target: entity.target_runtime_id,
                    packet: Packet::InventoryTransaction {
                        request_id,
                        data: TransactionData::UseItemOnEntity(entity.clone()),
                    },
                }) {
                    debug!("[{}] Second attack before input, dropped attack on {}", self.name, previous.target);
                }
                Disposition::Cancel
            }
            TransactionData::UseItem(item) if item.action == UseItemAction::ClickBlock => {
                let entity_boxes: Vec<Aabb> = self.client_entities.iter().map(|e| e.bounding_box()).collect();
                let held = self.inventory.held_item();
                let ctx = EditContext {
                    eye: self.movement.eye_position(),
                    player_box: self.movement.bounding_box(),
                    entity_boxes: &entity_boxes,
                    held: &held,
                    effects: &self.effects,
                    on_ground: self.movement.flags.on_ground,
                    validate: self.gamemode.is_validated(),
                };
                match self.world_updater.use_item(item, &mut self.world, &ctx) {
                    Ok(()) => Disposition::Forward,
                    Err(reason) => {
                        debug!("[{}] Rejected item use at {:?}: {:?}", self.name, item.block_position, reason);
                        let mut blocks = vec![item.block_position];
                        if let Some(face) = Face::from_index(item.face) {
                            blocks.push(item.block_position.side(face));
                        }
                        let resync = resync_packets(&self.world, &blocks);
                        self.outbox.to_client.extend(resync);
                        Disposition::Cancel
                    }
                }
            }
            _ => Disposition::Forward,
        }
    }

    /// Touch input is judged by closest-point distance instead of the crosshair ray.
    pub fn is_touch(&self) -> bool {
        self.input_mode == InputMode::Touch
            && (self.identity.device_os.is_mobile() || self.config.combat.allow_non_mobile_touch)
    }

    fn attacker_snapshot(&self) -> AttackerSnapshot {
        let eye = Vec3::new(0.0, self.movement.eye_height(), 0.0);
        AttackerSnapshot {
            prev_eye: self.movement.last_pos + eye,
            eye: self.movement.pos + eye,
            prev_rotation: self.movement.last_rotation,
            rotation: self.movement.rotation,
        }
    }

    fn combat_options(&self) -> CombatOptions {
        CombatOptions {
            max_reach: self.config.combat.max_reach,
            touch: self.is_touch(),
            // the client world lags behind ours without a rewind to match it
            check_occlusion: !self.config.combat.ack_dependent,
        }
    }

    /// The target as the client saw it when it attacked.
    pub fn victim_snapshot(&self, runtime_id: u64) -> Option<VictimSnapshot> {
        if self.config.combat.ack_dependent {
            return self.client_entities.find(runtime_id).map(VictimSnapshot::live);
        }
        let entity = self.server_entities.find(runtime_id)?;
        Some(
            match self.server_entities.rewind(runtime_id, self.acked_server_tick) {
                Some(record) => VictimSnapshot::rewound(entity, &record),
                None => VictimSnapshot::live(entity),
            },
        )
    }

    fn resolve_attack(&mut self, pending: PendingAttack) {
        if !self.gamemode.is_validated() {
            self.outbox.to_server.push(pending.packet);
            return;
        }
        let Some(victim) = self.victim_snapshot(pending.target) else {
            debug!("[{}] Attack on untracked entity {} dropped", self.name, pending.target);
            return;
        };
        let options = self.combat_options();
        let result = validate_attack(&self.attacker_snapshot(), &victim, &options, &self.world);
        if result.hit_valid {
            self.outbox.to_server.push(pending.packet);
        } else {
            debug!(
                "[{}] Attack on {} rejected (ray {:?}, raw {:?}, occluded {})",
                self.name,
                pending.target,
                result.min_raycast(),
                result.min_raw(),
                result.occluded
            );
        }
        self.combat.last_report = Some(AttackReport {
            target: pending.target,
            client_tick: self.client_tick,
            touch: options.touch,
            mispredicted: false,
            result,
        });
    }

    /// A swing the client thought missed may have connected on our side of
    /// the latency; if so, the attack is sent on the client's behalf.
    fn search_missed_swing(&mut self, input: &PlayerAuthInput) {
        if self.combat.last_report.is_some() {
            return;
        }
        let candidates: Vec<(u64, VictimSnapshot)> = if self.config.combat.ack_dependent {
            self.client_entities
                .iter()
                .filter(|e| !self.is_self(e.runtime_id))
                .map(|e| (e.runtime_id, VictimSnapshot::live(e)))
                .collect()
        } else {
            self.server_entities
                .iter()
                .filter(|e| !self.is_self(e.runtime_id))
                .filter_map(|e| self.victim_snapshot(e.runtime_id).map(|v| (e.runtime_id, v)))
                .collect()
        };
        if candidates.is_empty() {
            return;
        }
        let Some((target, result)) = find_mispredicted_target(
            &self.attacker_snapshot(),
            candidates,
            &self.combat_options(),
            &self.world,
        ) else {
            return;
        };

        debug!("[{}] Missed swing at tick {} hits {}", self.name, input.tick, target);
        let held_item = self.inventory.held_item();
        self.outbox.to_server.push(Packet::InventoryTransaction {
            request_id: 0,
            data: TransactionData::UseItemOnEntity(UseItemOnEntityData {
                target_runtime_id: target,
                action: UseItemOnEntityAction::Attack,
                hotbar_slot: self.inventory.held_slot() as i32,
                held_item,
                position: self.movement.pos,
                click_position: Vec3::ZERO,
            }),
        });
        self.combat.last_report = Some(AttackReport {
            target,
            client_tick: input.tick,
            touch: false,
            mispredicted: true,
            result,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{
        BlockAction, BlockActionType, BlockPos, ItemStack, StackRequest, StackRequestAction,
        StackSlot, UseItemData,
    };

    fn input(tick: u64, feet: Vec3) -> PlayerAuthInput {
        PlayerAuthInput::idle(tick, feet + Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0))
    }

    fn attack(target: u64) -> Packet {
        Packet::InventoryTransaction {
            request_id: 0,
            data: TransactionData::UseItemOnEntity(UseItemOnEntityData {
                target_runtime_id: target,
                action: UseItemOnEntityAction::Attack,
                hotbar_slot: 0,
                held_item: ItemStack::empty(),
                position: Vec3::ZERO,
                click_position: Vec3::ZERO,
            }),
        }
    }

    /// Adds a player-sized entity at `feet` and lets the client see it.
    fn spawn(player: &mut Player, id: u64, feet: Vec3) {
        let mut packet = Packet::AddPlayer {
            runtime_id: id,
            name: format!("target{}", id),
            position: feet,
            velocity: Vec3::ZERO,
        };
        player.handle_server_packet(&mut packet).unwrap();
        player.tick().unwrap();
        acknowledge_all(player);
    }

    fn east() -> (f32, f32) {
        // yaw -90 looks along +X
        (0.0, -90.0)
    }

    #[test]
    fn test_idle_input_is_accepted() {
        let mut player = player();
        let feet = player.movement.pos;
        let mut packet = Packet::PlayerAuthInput(input(1, feet));
        assert_eq!(player.handle_client_packet(&mut packet).unwrap(), Disposition::Forward);
        assert!(player.take_outbox().is_empty());
        assert_eq!(player.client_tick, 1);
    }

    #[test]
    fn test_teleporting_client_is_corrected() {
        let mut player = player();
        let mut packet = Packet::PlayerAuthInput(input(1, Vec3::new(0.5, 64.0, 10.5)));
        player.handle_client_packet(&mut packet).unwrap();
        let outbox = player.take_outbox();
        match &outbox.to_client[0] {
            Packet::CorrectPlayerMovePrediction { position, tick, .. } => {
                assert_approx_eq!(position.z, 0.5, 1e-3);
                assert_eq!(*tick, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(player.movement.pending_corrections, 1);
        acknowledge_all(&mut player);
        assert_eq!(player.movement.pending_corrections, 0);
    }

    #[test]
    fn test_creative_positions_are_trusted() {
        let mut player = player();
        player.apply_gamemode(shared::GameMode::Creative);
        let mut packet = Packet::PlayerAuthInput(input(1, Vec3::new(0.5, 70.0, 10.5)));
        player.handle_client_packet(&mut packet).unwrap();
        assert!(player.take_outbox().is_empty());
        assert_approx_eq!(player.movement.pos.z, 10.5);
    }

    #[test]
    fn test_foreign_latency_echo_is_forwarded() {
        let mut player = player();
        let mut packet = Packet::NetworkStackLatency {
            timestamp: 17,
            needs_response: false,
        };
        assert_eq!(player.handle_client_packet(&mut packet).unwrap(), Disposition::Forward);
    }

    #[test]
    fn test_attack_in_reach_is_forwarded_with_next_input() {
        let mut player = player();
        spawn(&mut player, 5, Vec3::new(2.5, 64.0, 0.5));
        let mut hit = attack(5);
        assert_eq!(player.handle_client_packet(&mut hit).unwrap(), Disposition::Cancel);
        assert!(player.combat.pending.is_some());

        let mut tick = input(1, player.movement.pos);
        (tick.pitch, tick.yaw) = east();
        tick.head_yaw = tick.yaw;
        player.handle_client_packet(&mut Packet::PlayerAuthInput(tick)).unwrap();

        let outbox = player.take_outbox();
        assert_eq!(outbox.to_server, vec![attack(5)]);
        let report = player.combat.last_report.as_ref().unwrap();
        assert!(report.result.hit_valid);
        assert_approx_eq!(report.result.min_raycast().unwrap(), 1.7, 1e-3);
    }

    #[test]
    fn test_attack_out_of_reach_is_dropped() {
        let mut player = player();
        spawn(&mut player, 5, Vec3::new(4.5, 64.0, 0.5));
        player.handle_client_packet(&mut attack(5)).unwrap();
        let mut tick = input(1, player.movement.pos);
        (tick.pitch, tick.yaw) = east();
        player.handle_client_packet(&mut Packet::PlayerAuthInput(tick)).unwrap();
        assert!(player.take_outbox().to_server.is_empty());
        assert!(!player.combat.last_report.as_ref().unwrap().result.hit_valid);
    }

    #[test]
    fn test_creative_attack_skips_reach_check() {
        let mut player = player();
        player.apply_gamemode(shared::GameMode::Creative);
        spawn(&mut player, 5, Vec3::new(4.2, 64.0, 0.5));
        player.handle_client_packet(&mut attack(5)).unwrap();
        let mut tick = input(1, player.movement.pos);
        (tick.pitch, tick.yaw) = east();
        player.handle_client_packet(&mut Packet::PlayerAuthInput(tick)).unwrap();
        assert_eq!(player.take_outbox().to_server, vec![attack(5)]);
        assert!(player.combat.last_report.is_none());
    }

    #[test]
    fn test_client_view_attack_ignores_walls() {
        let mut config = crate::config::Config::default();
        config.combat.ack_dependent = true;
        let mut player = player_with(config);
        let stone = player.world.registry().default_state("minecraft:stone").unwrap();
        player.world.set_block(BlockPos::new(1, 65, 0), stone);
        spawn(&mut player, 5, Vec3::new(2.5, 64.0, 0.5));
        player.handle_client_packet(&mut attack(5)).unwrap();
        let mut tick = input(1, player.movement.pos);
        (tick.pitch, tick.yaw) = east();
        tick.head_yaw = tick.yaw;
        player.handle_client_packet(&mut Packet::PlayerAuthInput(tick)).unwrap();
        let report = player.combat.last_report.as_ref().unwrap();
        assert!(!report.result.occluded);
        assert!(report.result.hit_valid);
        assert_eq!(player.take_outbox().to_server, vec![attack(5)]);
    }

    #[test]
    fn test_attack_on_unknown_entity_dropped() {
        let mut player = player();
        player.handle_client_packet(&mut attack(77)).unwrap();
        player
            .handle_client_packet(&mut Packet::PlayerAuthInput(input(1, player.movement.pos)))
            .unwrap();
        assert!(player.take_outbox().to_server.is_empty());
        assert!(player.combat.last_report.is_none());
    }

    #[test]
    fn test_missed_swing_sends_attack() {
        let mut player = player();
        spawn(&mut player, 5, Vec3::new(2.0, 64.0, 0.5));
        let mut tick = input(1, player.movement.pos);
        (tick.pitch, tick.yaw) = east();
        tick.input_data.set(InputFlags::MISSED_SWING);
        player.handle_client_packet(&mut Packet::PlayerAuthInput(tick)).unwrap();
        let outbox = player.take_outbox();
        assert_eq!(outbox.to_server.len(), 1);
        assert!(player.combat.last_report.as_ref().unwrap().mispredicted);
        assert_eq!(player.last_swing_tick, Some(1));
    }

    #[test]
    fn test_swing_and_equipment_tracking() {
        let mut player = player();
        player.client_tick = 12;
        let mut swing = Packet::Animate {
            action: AnimateAction::SwingArm,
            runtime_id: 1,
        };
        player.handle_client_packet(&mut swing).unwrap();
        assert_eq!(player.last_swing_tick, Some(12));

        let mut equip = Packet::MobEquipment {
            runtime_id: 1,
            item: ItemStack::empty(),
            inventory_slot: 3,
            hotbar_slot: 3,
            window_id: 0,
        };
        player.handle_client_packet(&mut equip).unwrap();
        assert_eq!(player.inventory.held_slot(), 3);
    }

    #[test]
    fn test_stack_request_applies_optimistically() {
        let mut player = player();
        player
            .inventory
            .set_slot(0, 0, ItemStack::new(5, "minecraft:dirt", 10));
        let mut packet = Packet::ItemStackRequest {
            requests: vec![StackRequest {
                request_id: 1,
                actions: vec![StackRequestAction::Swap {
                    source: StackSlot::new(0, 0),
                    destination: StackSlot::new(0, 1),
                }],
            }],
        };
        player.handle_client_packet(&mut packet).unwrap();
        assert_eq!(player.inventory.slot(0, 1).count, 10);
        assert_eq!(player.inventory.pending_requests(), 1);
    }

    #[test]
    fn test_early_destroy_resyncs_block() {
        let mut player = player();
        let target = BlockPos::new(1, 63, 0);
        let start = {
            let mut tick = input(1, player.movement.pos);
            tick.block_actions.push(BlockAction {
                action: BlockActionType::StartBreak,
                position: target,
                face: 1,
            });
            tick
        };
        player.handle_client_packet(&mut Packet::PlayerAuthInput(start)).unwrap();
        let mut destroy = input(2, player.movement.pos);
        destroy.block_actions.push(BlockAction {
            action: BlockActionType::PredictDestroyBlock,
            position: target,
            face: 1,
        });
        destroy.input_data.set(InputFlags::PERFORM_ITEM_INTERACTION);
        let mut packet = Packet::PlayerAuthInput(destroy);
        assert_eq!(
            player.handle_client_packet(&mut packet).unwrap(),
            Disposition::ForwardModified
        );
        match &packet {
            Packet::PlayerAuthInput(input) => {
                assert!(input.block_actions.is_empty());
                assert!(!input.input_data.has(InputFlags::PERFORM_ITEM_INTERACTION));
            }
            _ => unreachable!(),
        }
        let outbox = player.take_outbox();
        assert!(outbox
            .to_client
            .iter()
            .any(|p| matches!(p, Packet::UpdateBlock { position, .. } if *position == target)));
        assert!(!player.world.block(target).is_air());
    }

    #[test]
    fn test_legacy_placement_inside_player_is_cancelled() {
        let mut player = player();
        let dirt = player.world.registry().default_state("minecraft:dirt").unwrap();
        let mut held = ItemStack::new(3, "minecraft:dirt", 64);
        held.block_runtime_id = dirt;
        player.inventory.set_slot(0, 0, held.clone());
        let mut packet = Packet::InventoryTransaction {
            request_id: 0,
            data: TransactionData::UseItem(UseItemData {
                action: UseItemAction::ClickBlock,
                block_position: BlockPos::new(0, 63, 0),
                face: Face::Up.index(),
                hotbar_slot: 0,
                held_item: held,
                position: player.movement.pos,
                click_position: Vec3::new(0.5, 1.0, 0.5),
                block_runtime_id: 0,
            }),
        };
        assert_eq!(player.handle_client_packet(&mut packet).unwrap(), Disposition::Cancel);
        assert_eq!(player.take_outbox().to_client.len(), 2);
    }

    #[test]
    fn test_touch_requires_mobile_or_permission() {
        let mut player = player();
        player.input_mode = InputMode::Touch;
        assert!(!player.is_touch());

        let mut config = crate::config::Config::default();
        config.combat.allow_non_mobile_touch = true;
        let mut player = player_with(config);
        player.input_mode = InputMode::Touch;
        assert!(player.is_touch());
    }
}
