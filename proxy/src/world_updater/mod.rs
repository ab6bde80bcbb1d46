//! Validation of client-side world edits.
//!
//! Placements are checked against the shadow world and every tracked
//! entity, breaks against the expected mining time, and both against the
//! reach and line of sight from the player's eye. Rejected edits are undone
//! on the client by resending the true block state.

pub mod breaking;

use crate::component::Effects;
use crate::world::World;
use breaking::{expected_break_ticks, BreakProgress};
use log::debug;
use shared::{
    Aabb, BlockActionType, BlockPos, Face, InputFlags, ItemStack, Packet, PlayerAuthInput,
    UseItemAction, UseItemData, Vec3,
};

/// Largest eye-to-click distance for any block interaction.
pub const MAX_INTERACTION_DISTANCE: f32 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooFar,
    Obstructed,
    NotABlock,
    Occupied,
    IntersectsEntity,
    InvalidFace,
    TooEarly,
}

/// State of the player that the updater needs for one input.
pub struct EditContext<'a> {
    pub eye: Vec3,
    pub player_box: Aabb,
    pub entity_boxes: &'a [Aabb],
    pub held: &'a ItemStack,
    pub effects: &'a Effects,
    pub on_ground: bool,
    /// Creative and spectator edits are not validated.
    pub validate: bool,
}

/// What processing one input did to the world and the packet.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EditOutcome {
    /// Blocks whose true state must be resent to the client.
    pub resync: Vec<BlockPos>,
    pub rejections: Vec<Rejection>,
    /// The input packet was altered and must be re-encoded.
    pub modified: bool,
}

impl EditOutcome {
    fn reject(&mut self, reason: Rejection, blocks: &[BlockPos]) {
        self.rejections.push(reason);
        for pos in blocks {
            if !self.resync.contains(pos) {
                self.resync.push(*pos);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct WorldUpdater {
    breaking: Option<BreakProgress>,
}

impl WorldUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn breaking(&self) -> Option<&BreakProgress> {
        self.breaking.as_ref()
    }

    pub fn reset(&mut self) {
        self.breaking = None;
    }

    /// Accrues break progress for the tick, then applies the input's block actions and item use.
    pub fn process_input(
        &mut self,
        input: &mut PlayerAuthInput,
        world: &mut World,
        ctx: &EditContext,
    ) -> EditOutcome {
        let mut outcome = EditOutcome::default();

        if let Some(progress) = self.breaking.as_mut() {
            let block = world.block(progress.position);
            progress.accrue(expected_break_ticks(block, ctx.held, ctx.effects, ctx.on_ground));
        }

        let mut kept = Vec::with_capacity(input.block_actions.len());
        let mut destroy_rejected = false;
        for action in std::mem::take(&mut input.block_actions) {
            let keep = match action.action {
                BlockActionType::StartBreak => {
                    let expected = expected_break_ticks(world.block(action.position), ctx.held, ctx.effects, ctx.on_ground);
                    self.breaking = Some(BreakProgress::start(action.position, expected));
                    true
                }
                BlockActionType::ContinueBreak | BlockActionType::CrackBreak => {
                    if self.breaking.map_or(true, |b| b.position != action.position) {
                        let expected = expected_break_ticks(world.block(action.position), ctx.held, ctx.effects, ctx.on_ground);
                        self.breaking = Some(BreakProgress::start(action.position, expected));
                    }
                    true
                }
                BlockActionType::AbortBreak => {
                    self.breaking = None;
                    true
                }
                BlockActionType::StopBreak => true,
                BlockActionType::PredictDestroyBlock => {
                    match self.destroy(action.position, world, ctx) {
                        Ok(()) => true,
                        Err(reason) => {
                            outcome.reject(reason, &[action.position]);
                            destroy_rejected = true;
                            false
                        }
                    }
                }
            };
            if keep {
                kept.push(action);
            } else {
                outcome.modified = true;
            }
        }
        input.block_actions = kept;

        if destroy_rejected {
            input.input_data.clear(InputFlags::PERFORM_ITEM_INTERACTION);
            input.item_interaction = None;
            outcome.modified = true;
        }

        if let Some(data) = input.item_interaction.clone() {
            if let Err(reason) = self.use_item(&data, world, ctx) {
                let mut blocks = vec![data.block_position];
                if let Some(face) = Face::from_index(data.face) {
                    blocks.push(data.block_position.side(face));
                }
                outcome.reject(reason, &blocks);
                input.input_data.clear(InputFlags::PERFORM_ITEM_INTERACTION);
                input.item_interaction = None;
                outcome.modified = true;
            }
        }

        outcome
    }

    fn destroy(&mut self, pos: BlockPos, world: &mut World, ctx: &EditContext) -> Result<(), Rejection> {
        if ctx.validate {
            check_reach(world, ctx.eye, pos, pos.center())?;
            let ready = self
                .breaking
                .is_some_and(|b| b.position == pos && b.can_destroy());
            if !ready {
                debug!("Rejected early destroy at {:?} ({:?})", pos, self.breaking);
                return Err(Rejection::TooEarly);
            }
        }
        let air = world.registry().air_id();
        world.set_block(pos, air);
        self.breaking = None;
        Ok(())
    }

    /// Validates an item use; accepted placements are committed to the world.
    pub fn use_item(&mut self, data: &UseItemData, world: &mut World, ctx: &EditContext) -> Result<(), Rejection> {
        match data.action {
            UseItemAction::ClickBlock => {
                let click = data.block_position.to_vec3() + data.click_position;
                if ctx.validate {
                    check_reach(world, ctx.eye, data.block_position, click)?;
                }
                // the tracked inventory decides what is placed, not the client's claim
                let block = ctx.held.block_runtime_id;
                if block == 0 || world.registry().get(block).is_air() {
                    let claimed = data.held_item.block_runtime_id;
                    if ctx.validate && claimed != 0 && !world.registry().get(claimed).is_air() {
                        return Err(Rejection::NotABlock);
                    }
                    return Ok(());
                }
                let pos = place_position(world, data)?;
                validate_placement(world, pos, block, ctx)?;
                world.set_block(pos, block);
                Ok(())
            }
            UseItemAction::BreakBlock => {
                if ctx.validate {
                    check_reach(world, ctx.eye, data.block_position, data.block_position.center())?;
                }
                Ok(())
            }
            UseItemAction::ClickAir => Ok(()),
        }
    }
}

/// The block a placement lands in: the clicked block if replaceable, else its neighbour.
pub fn place_position(world: &World, data: &UseItemData) -> Result<BlockPos, Rejection> {
    if world.block(data.block_position).replaceable {
        return Ok(data.block_position);
    }
    let face = Face::from_index(data.face).ok_or(Rejection::InvalidFace)?;
    Ok(data.block_position.side(face))
}

/// Checks that `runtime_id` may be placed at `pos` without overlapping anything.
pub fn validate_placement(world: &World, pos: BlockPos, runtime_id: u32, ctx: &EditContext) -> Result<(), Rejection> {
    if !world.block(pos).replaceable {
        return Err(Rejection::Occupied);
    }
    if !ctx.validate {
        return Ok(());
    }
    let candidate = world.registry().get(runtime_id);
    if candidate.is_air() {
        return Err(Rejection::NotABlock);
    }
    for bb in candidate.world_boxes(pos) {
        if bb.intersects(&ctx.player_box) || ctx.entity_boxes.iter().any(|e| bb.intersects(e)) {
            return Err(Rejection::IntersectsEntity);
        }
    }
    Ok(())
}

/// Eye-to-target distance and line of sight for an interaction with `target`.
pub fn check_reach(world: &World, eye: Vec3, target: BlockPos, point: Vec3) -> Result<(), Rejection> {
    if eye.distance(point) > MAX_INTERACTION_DISTANCE {
        return Err(Rejection::TooFar);
    }
    if world.line_obstructed(eye, point, Some(target)) {
        return Err(Rejection::Obstructed);
    }
    Ok(())
}

/// Packets that put the client's view of `blocks` back in line with the world.
pub fn resync_packets(world: &World, blocks: &[BlockPos]) -> Vec<Packet> {
    blocks
        .iter()
        .map(|pos| Packet::UpdateBlock {
            position: *pos,
            block_runtime_id: world.block_id(*pos),
            layer: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_support::*;
    use shared::{BlockAction, PLAYER_EYE_HEIGHT};

    const FEET: Vec3 = Vec3::new(0.5, 64.0, 0.5);

    struct Fixture {
        held: ItemStack,
        effects: Effects,
        entities: Vec<Aabb>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                held: ItemStack::empty(),
                effects: Effects::new(),
                entities: Vec::new(),
            }
        }

        fn holding_stone(world: &World) -> Self {
            Self {
                held: stone_item(world),
                ..Self::new()
            }
        }

        fn ctx(&self) -> EditContext<'_> {
            EditContext {
                eye: FEET + Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0),
                player_box: Aabb::from_bottom_center(FEET, 0.6, 1.8),
                entity_boxes: &self.entities,
                held: &self.held,
                effects: &self.effects,
                on_ground: true,
                validate: true,
            }
        }
    }

    fn action(action: BlockActionType, position: BlockPos) -> BlockAction {
        BlockAction {
            action,
            position,
            face: 1,
        }
    }

    fn input(tick: u64) -> PlayerAuthInput {
        PlayerAuthInput::idle(tick, FEET + Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0))
    }

    fn destroy_input(tick: u64, pos: BlockPos) -> PlayerAuthInput {
        let mut input = input(tick);
        input.block_actions.push(action(BlockActionType::PredictDestroyBlock, pos));
        input.input_data.set(InputFlags::PERFORM_ITEM_INTERACTION);
        input.item_interaction = Some(UseItemData {
            action: UseItemAction::BreakBlock,
            block_position: pos,
            face: 1,
            hotbar_slot: 0,
            held_item: ItemStack::empty(),
            position: FEET,
            click_position: Vec3::ZERO,
            block_runtime_id: 0,
        });
        input
    }

    #[test]
    fn test_early_destroy_is_rejected_and_resynced() {
        let mut world = flat_world(64);
        let target = BlockPos::new(1, 63, 0);
        let stone = world.block_id(target);
        let fixture = Fixture::new();
        let mut updater = WorldUpdater::new();

        let mut start = input(1);
        start.block_actions.push(action(BlockActionType::StartBreak, target));
        updater.process_input(&mut start, &mut world, &fixture.ctx());

        for tick in 2..12 {
            updater.process_input(&mut input(tick), &mut world, &fixture.ctx());
        }

        let mut destroy = destroy_input(12, target);
        let outcome = updater.process_input(&mut destroy, &mut world, &fixture.ctx());
        assert_eq!(outcome.rejections, vec![Rejection::TooEarly]);
        assert_eq!(outcome.resync, vec![target]);
        assert!(outcome.modified);
        assert_eq!(world.block_id(target), stone);
        assert!(!destroy.input_data.has(InputFlags::PERFORM_ITEM_INTERACTION));
        assert!(destroy.item_interaction.is_none());
        assert!(destroy.block_actions.is_empty());

        let packets = resync_packets(&world, &outcome.resync);
        assert_eq!(
            packets,
            vec![Packet::UpdateBlock {
                position: target,
                block_runtime_id: stone,
                layer: 0
            }]
        );
    }

    #[test]
    fn test_destroy_after_full_progress() {
        let mut world = flat_world(64);
        let target = BlockPos::new(1, 63, 0);
        let dirt = state(&world, "minecraft:dirt");
        world.set_block(target, dirt);
        let fixture = Fixture::new();
        let mut updater = WorldUpdater::new();

        let mut start = input(1);
        start.block_actions.push(action(BlockActionType::StartBreak, target));
        updater.process_input(&mut start, &mut world, &fixture.ctx());
        for tick in 2..16 {
            updater.process_input(&mut input(tick), &mut world, &fixture.ctx());
        }
        // the fifteenth tick accrues with the destroy input
        let outcome = updater.process_input(&mut destroy_input(16, target), &mut world, &fixture.ctx());
        assert!(outcome.rejections.is_empty());
        assert!(world.block(target).is_air());
        assert!(updater.breaking().is_none());
    }

    #[test]
    fn test_destroy_without_start() {
        let mut world = flat_world(64);
        let fixture = Fixture::new();
        let mut updater = WorldUpdater::new();
        let outcome = updater.process_input(&mut destroy_input(1, BlockPos::new(0, 63, 1)), &mut world, &fixture.ctx());
        assert_eq!(outcome.rejections, vec![Rejection::TooEarly]);
    }

    #[test]
    fn test_creative_destroy_is_not_validated() {
        let mut world = flat_world(64);
        let fixture = Fixture::new();
        let mut ctx = fixture.ctx();
        ctx.validate = false;
        let mut updater = WorldUpdater::new();
        let target = BlockPos::new(0, 63, 1);
        let outcome = updater.process_input(&mut destroy_input(1, target), &mut world, &ctx);
        assert!(outcome.rejections.is_empty());
        assert!(world.block(target).is_air());
    }

    fn stone_item(world: &World) -> ItemStack {
        ItemStack {
            network_id: 1,
            name: "minecraft:stone".into(),
            count: 64,
            block_runtime_id: state(world, "minecraft:stone"),
        }
    }

    fn place_data(world: &World, clicked: BlockPos, face: Face) -> UseItemData {
        UseItemData {
            action: UseItemAction::ClickBlock,
            block_position: clicked,
            face: face.index(),
            hotbar_slot: 0,
            held_item: stone_item(world),
            position: FEET,
            click_position: Vec3::new(0.5, 1.0, 0.5),
            block_runtime_id: state(world, "minecraft:stone"),
        }
    }

    #[test]
    fn test_placement_on_neighbour_face() {
        let mut world = flat_world(64);
        let fixture = Fixture::holding_stone(&world);
        let mut updater = WorldUpdater::new();
        let data = place_data(&world, BlockPos::new(2, 63, 0), Face::Up);
        assert_eq!(updater.use_item(&data, &mut world, &fixture.ctx()), Ok(()));
        assert!(!world.block(BlockPos::new(2, 64, 0)).is_air());
    }

    #[test]
    fn test_placement_inside_player_rejected() {
        let mut world = flat_world(64);
        let fixture = Fixture::holding_stone(&world);
        let mut updater = WorldUpdater::new();
        let data = place_data(&world, BlockPos::new(0, 63, 0), Face::Up);
        assert_eq!(updater.use_item(&data, &mut world, &fixture.ctx()), Err(Rejection::IntersectsEntity));
        assert!(world.block(BlockPos::new(0, 64, 0)).is_air());
    }

    #[test]
    fn test_placement_inside_entity_rejected() {
        let mut world = flat_world(64);
        let mut fixture = Fixture::holding_stone(&world);
        fixture.entities.push(Aabb::from_bottom_center(Vec3::new(2.5, 64.0, 0.5), 0.6, 1.8));
        let mut updater = WorldUpdater::new();
        let data = place_data(&world, BlockPos::new(2, 63, 0), Face::Up);
        assert_eq!(updater.use_item(&data, &mut world, &fixture.ctx()), Err(Rejection::IntersectsEntity));
    }

    #[test]
    fn test_placement_replaces_grass() {
        let mut world = flat_world(64);
        let grass = state(&world, "minecraft:short_grass");
        world.set_block(BlockPos::new(2, 64, 0), grass);
        let fixture = Fixture::holding_stone(&world);
        let mut updater = WorldUpdater::new();
        let data = place_data(&world, BlockPos::new(2, 64, 0), Face::Up);
        assert_eq!(updater.use_item(&data, &mut world, &fixture.ctx()), Ok(()));
        assert_eq!(world.block(BlockPos::new(2, 64, 0)).name, "minecraft:stone");
        assert!(world.block(BlockPos::new(2, 65, 0)).is_air());
    }

    #[test]
    fn test_far_placement_rejected() {
        let mut world = flat_world(64);
        let fixture = Fixture::holding_stone(&world);
        let mut updater = WorldUpdater::new();
        let data = place_data(&world, BlockPos::new(12, 63, 0), Face::Up);
        assert_eq!(updater.use_item(&data, &mut world, &fixture.ctx()), Err(Rejection::TooFar));
    }

    #[test]
    fn test_placement_through_wall_rejected() {
        let mut world = flat_world(64);
        let stone = state(&world, "minecraft:stone");
        for y in 64..67 {
            world.set_block(BlockPos::new(2, y, 0), stone);
        }
        let fixture = Fixture::holding_stone(&world);
        let mut updater = WorldUpdater::new();
        let mut data = place_data(&world, BlockPos::new(4, 63, 0), Face::Up);
        data.click_position = Vec3::new(0.5, 1.0, 0.5);
        assert_eq!(updater.use_item(&data, &mut world, &fixture.ctx()), Err(Rejection::Obstructed));
    }

    #[test]
    fn test_placement_uses_tracked_held_item() {
        let mut world = flat_world(64);
        let mut fixture = Fixture::new();
        fixture.held = ItemStack::new(300, "minecraft:stick", 1);
        let mut updater = WorldUpdater::new();
        let data = place_data(&world, BlockPos::new(2, 63, 0), Face::Up);
        assert_eq!(updater.use_item(&data, &mut world, &fixture.ctx()), Err(Rejection::NotABlock));
        assert!(world.block(BlockPos::new(2, 64, 0)).is_air());

        let dirt = state(&world, "minecraft:dirt");
        fixture.held = ItemStack::new(3, "minecraft:dirt", 1);
        fixture.held.block_runtime_id = dirt;
        assert_eq!(updater.use_item(&data, &mut world, &fixture.ctx()), Ok(()));
        assert_eq!(world.block_id(BlockPos::new(2, 64, 0)), dirt);
    }

    #[test]
    fn test_rejected_placement_clears_interaction() {
        let mut world = flat_world(64);
        let fixture = Fixture::holding_stone(&world);
        let mut updater = WorldUpdater::new();
        let mut packet = input(1);
        packet.input_data.set(InputFlags::PERFORM_ITEM_INTERACTION);
        packet.item_interaction = Some(place_data(&world, BlockPos::new(0, 63, 0), Face::Up));
        let outcome = updater.process_input(&mut packet, &mut world, &fixture.ctx());
        assert!(outcome.modified);
        assert!(packet.item_interaction.is_none());
        assert!(outcome.resync.contains(&BlockPos::new(0, 64, 0)));
    }
}
