//! End-to-end tests driving the proxy's public engine API

use assert_approx_eq::assert_approx_eq;
use proxy::ack::AckEngine;
use proxy::combat::{validate_attack, AttackerSnapshot, CombatOptions, VictimSnapshot};
use proxy::component::Effects;
use proxy::entity::{Entity, EntityTracker};
use proxy::movement::simulate::{tick, SimulationContext, TickOutcome};
use proxy::movement::MovementState;
use proxy::player::remap::RuntimeIdMap;
use proxy::world::block::BlockRegistry;
use proxy::world::cache::ChunkCache;
use proxy::world::chunk::{Chunk, DimensionRange};
use proxy::world::World;
use proxy::world_updater::{resync_packets, EditContext, Rejection, WorldUpdater};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    Aabb, BlockAction, BlockActionType, BlockPos, ChunkPos, DeviceOs, InputFlags, ItemStack,
    Packet, PlayerAuthInput, Rotation, UseItemAction, UseItemData, Vec3, CURRENT_PROTOCOL,
    PLAYER_EYE_HEIGHT, PLAYER_SNEAK_HEIGHT, SELF_RUNTIME_ID_SENTINEL,
};
use std::sync::Arc;

/// Loads a 3x3 column area of air around the origin.
fn open_world(cache: Arc<ChunkCache>, registry: Arc<BlockRegistry>) -> World {
    let mut world = World::new(cache, registry);
    let air = world.registry().air_id();
    for cx in -1..=1 {
        for cz in -1..=1 {
            world.add_chunk(
                ChunkPos::new(cx, cz),
                Chunk::new(DimensionRange::for_dimension(0), air),
            );
        }
    }
    world
}

fn stone(world: &World) -> u32 {
    world
        .registry()
        .default_state("minecraft:stone")
        .expect("stone is registered")
}

fn fresh_world() -> World {
    open_world(Arc::new(ChunkCache::new()), Arc::new(BlockRegistry::new()))
}

fn simulate(state: &mut MovementState, world: &World) -> TickOutcome {
    let effects = Effects::new();
    let ctx = SimulationContext {
        world,
        effects: &effects,
        knockback_resistance: 0.0,
    };
    tick(state, &ctx)
}

/// Tests that a teleport queued behind a latency probe only lands once the echo arrives
#[test]
fn test_teleport_applies_on_acknowledgment() {
    let world = fresh_world();
    let mut state = MovementState::new(Vec3::new(0.5, 64.0, 0.5));
    let mut engine: AckEngine<MovementState> =
        AckEngine::new(DeviceOs::Win10, CURRENT_PROTOCOL, 200, StdRng::seed_from_u64(7));

    assert!(engine.set_current_nonce(1234));
    engine.add(|state: &mut MovementState| {
        state.queue_teleport(Vec3::new(100.0, 64.0, 100.0), true, false)
    });

    let probe = engine.flush().unwrap();
    assert_eq!(
        probe,
        Some(Packet::NetworkStackLatency {
            timestamp: 1_234_000_000,
            needs_response: true,
        })
    );
    assert_eq!(engine.pending_len(), 1);
    assert!(!state.has_teleport());

    // an unrelated echo is not ours
    assert!(engine.acknowledge(999_000_000).is_none());

    let actions = engine.acknowledge(1_234_000_000).expect("echo matches");
    for action in actions {
        action(&mut state);
    }
    assert_eq!(engine.pending_len(), 0);

    assert_eq!(simulate(&mut state, &world), TickOutcome::Teleported);
    assert_eq!(state.pos, Vec3::new(100.0, 64.0, 100.0));
    assert_eq!(state.vel, Vec3::ZERO);
}

/// Tests that an attack just beyond reach is rejected with the expected ray distance
#[test]
fn test_attack_out_of_reach_rejected() {
    let world = fresh_world();
    let mut tracker = EntityTracker::new();
    tracker.add(Entity::player(2, Vec3::new(3.5, 0.0, 0.0)));
    let victim = tracker.find(2).unwrap();

    // yaw -90 looks along +X
    let attacker = AttackerSnapshot::stationary(
        Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0),
        Rotation::new(0.0, -90.0, -90.0),
    );
    let options = CombatOptions {
        max_reach: 2.9,
        touch: false,
        check_occlusion: true,
    };

    let result = validate_attack(&attacker, &VictimSnapshot::live(victim), &options, &world);
    assert!(!result.hit_valid);
    assert_approx_eq!(result.min_raycast().unwrap(), 3.2, 1e-4);
}

/// Tests that a rewound victim is judged where the client saw it
#[test]
fn test_rewound_victim_within_reach() {
    let world = fresh_world();
    let mut tracker = EntityTracker::new();
    tracker.add(Entity::player(2, Vec3::new(2.0, 0.0, 0.0)));
    tracker.tick(1);
    tracker.move_entity(2, 2, Vec3::new(6.0, PLAYER_EYE_HEIGHT, 0.0), false);
    tracker.tick(2);

    let entity = tracker.find(2).unwrap();
    let record = tracker.rewind(2, 1).expect("history covers tick 1");
    let attacker = AttackerSnapshot::stationary(
        Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0),
        Rotation::new(0.0, -90.0, -90.0),
    );
    let options = CombatOptions {
        max_reach: 2.9,
        touch: false,
        check_occlusion: true,
    };

    let live = validate_attack(&attacker, &VictimSnapshot::live(entity), &options, &world);
    let rewound = validate_attack(
        &attacker,
        &VictimSnapshot::rewound(entity, &record),
        &options,
        &world,
    );
    assert!(!live.hit_valid);
    assert!(rewound.hit_valid);
}

/// Tests that breaking stone by hand long before it could finish is undone on the client
#[test]
fn test_early_block_break_resynced() {
    let mut world = fresh_world();
    let stone = stone(&world);
    let target = BlockPos::new(1, 63, 0);
    world.set_block(target, stone);

    let feet = Vec3::new(0.5, 64.0, 0.5);
    let eye = feet + Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0);
    let held = ItemStack::empty();
    let effects = Effects::new();
    let ctx = EditContext {
        eye,
        player_box: Aabb::from_bottom_center(feet, 0.6, 1.8),
        entity_boxes: &[],
        held: &held,
        effects: &effects,
        on_ground: true,
        validate: true,
    };
    let mut updater = WorldUpdater::new();

    let mut start = PlayerAuthInput::idle(1, eye);
    start.block_actions.push(BlockAction {
        action: BlockActionType::StartBreak,
        position: target,
        face: 1,
    });
    updater.process_input(&mut start, &mut world, &ctx);
    for tick in 2..11 {
        updater.process_input(&mut PlayerAuthInput::idle(tick, eye), &mut world, &ctx);
    }

    let mut destroy = PlayerAuthInput::idle(11, eye);
    destroy.block_actions.push(BlockAction {
        action: BlockActionType::PredictDestroyBlock,
        position: target,
        face: 1,
    });
    destroy.input_data.set(InputFlags::PERFORM_ITEM_INTERACTION);
    destroy.item_interaction = Some(UseItemData {
        action: UseItemAction::BreakBlock,
        block_position: target,
        face: 1,
        hotbar_slot: 0,
        held_item: ItemStack::empty(),
        position: feet,
        click_position: Vec3::ZERO,
        block_runtime_id: 0,
    });

    let outcome = updater.process_input(&mut destroy, &mut world, &ctx);
    assert_eq!(outcome.rejections, vec![Rejection::TooEarly]);
    assert!(outcome.modified);
    assert_eq!(world.block_id(target), stone);
    assert!(!destroy.input_data.has(InputFlags::PERFORM_ITEM_INTERACTION));
    assert!(destroy.item_interaction.is_none());
    assert_eq!(
        resync_packets(&world, &outcome.resync),
        vec![Packet::UpdateBlock {
            position: target,
            block_runtime_id: stone,
            layer: 0,
        }]
    );
}

/// Tests runtime id translation after a transfer
#[test]
fn test_runtime_ids_remapped_after_transfer() {
    let mut map = RuntimeIdMap::new(7);
    assert_eq!(map.to_server(7), 7);
    assert_eq!(map.to_client(7, false), 7);

    map.transfer(42);
    assert_eq!(map.to_server(7), 42);
    assert_eq!(map.to_server(SELF_RUNTIME_ID_SENTINEL), 42);
    assert_eq!(map.to_server(9), 9);
    assert_eq!(map.to_client(42, true), 7);
    assert_eq!(map.to_client(42, false), SELF_RUNTIME_ID_SENTINEL);

    let mut moved = Packet::MoveActorAbsolute {
        runtime_id: 42,
        position: Vec3::new(1.0, 2.0, 3.0),
        pitch: 0.0,
        yaw: 0.0,
        on_ground: true,
        teleport: false,
    };
    assert!(map.server_to_client(&mut moved));
    assert!(matches!(
        moved,
        Packet::MoveActorAbsolute { runtime_id: SELF_RUNTIME_ID_SENTINEL, .. }
    ));

    let mut equipment = Packet::MobEquipment {
        runtime_id: 7,
        item: ItemStack::empty(),
        inventory_slot: 0,
        hotbar_slot: 0,
        window_id: 0,
    };
    assert!(map.client_to_server(&mut equipment));
    assert!(matches!(equipment, Packet::MobEquipment { runtime_id: 42, .. }));
}

/// Tests that a sneaking player walking off a single block stays on it
#[test]
fn test_sneak_edge_on_single_block() {
    let mut world = fresh_world();
    let stone = stone(&world);
    world.set_block(BlockPos::new(0, 63, 0), stone);

    let mut state = MovementState::new(Vec3::new(0.5, 64.0, 0.5));
    state.flags.on_ground = true;
    state.flags.sneaking = true;
    state.height = PLAYER_SNEAK_HEIGHT;
    state.impulse_forward = 1.0;

    for _ in 0..40 {
        assert_eq!(simulate(&mut state, &world), TickOutcome::Simulated);
        assert!(state.flags.on_ground);
        assert_approx_eq!(state.pos.y, 64.0, 1e-5);
        assert!(state.pos.x >= 0.0 && state.pos.x <= 1.0);
        assert!(state.pos.z - state.width / 2.0 < 1.0);
    }
}

/// Tests that equal columns from two players share one cache entry until one diverges
#[test]
fn test_chunk_dedup_across_worlds() {
    let cache = Arc::new(ChunkCache::new());
    let registry = Arc::new(BlockRegistry::new());
    let mut first = open_world(Arc::clone(&cache), Arc::clone(&registry));
    let mut second = open_world(Arc::clone(&cache), Arc::clone(&registry));
    let origin = ChunkPos::new(0, 0);

    assert_eq!(cache.entry_count(), 9);
    let shared_entry = first.entry(origin).unwrap();
    assert!(Arc::ptr_eq(&shared_entry, &second.entry(origin).unwrap()));
    assert_eq!(shared_entry.subscriber_count(), 2);

    // copy on write
    let stone = stone(&first);
    let pos = BlockPos::new(3, 10, 3);
    assert!(first.set_block(pos, stone));
    assert_eq!(first.block_id(pos), stone);
    assert_eq!(second.block_id(pos), registry.air_id());
    assert!(!Arc::ptr_eq(&first.entry(origin).unwrap(), &second.entry(origin).unwrap()));
    assert_eq!(cache.entries_at(origin).len(), 2);

    // the same edit from the other player lands on the existing copy
    assert!(second.set_block(pos, stone));
    assert!(Arc::ptr_eq(&first.entry(origin).unwrap(), &second.entry(origin).unwrap()));
    assert_eq!(first.entry(origin).unwrap().subscriber_count(), 2);

    cache.sweep(std::time::Instant::now());
    assert_eq!(cache.entries_at(origin).len(), 1);
    assert_eq!(cache.entry_count(), 9);

    drop(first);
    drop(second);
    cache.sweep(std::time::Instant::now());
    assert_eq!(cache.entry_count(), 0);
}
