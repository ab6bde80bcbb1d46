//! Entity tracking with a bounded position history for rewinding.
//!
//! A player keeps two trackers. The client-visible one is only moved once the
//! client acknowledged the movement, the server-authoritative one is moved as
//! soon as the upstream reports it. Both record one history entry per tick.

use shared::{Aabb, Vec3, PLAYER_EYE_HEIGHT, PLAYER_HEIGHT, PLAYER_WIDTH};
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_MAX_REWIND: usize = 6;

/// Position of an entity as recorded at the end of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalPosition {
    pub position: Vec3,
    pub prev_position: Vec3,
    pub tick: u64,
    /// Set when the entity teleported into `position`; interpolation must not cross it.
    pub teleport: bool,
}

impl HistoricalPosition {
    /// Position `t` of the way from `prev_position` to `position`.
    pub fn interpolate(&self, t: f32) -> Vec3 {
        if self.teleport {
            self.position
        } else {
            self.prev_position.lerp(self.position, t)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub runtime_id: u64,
    pub entity_type: String,
    /// Feet position.
    pub position: Vec3,
    pub last_position: Vec3,
    pub velocity: Vec3,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub is_player: bool,
    pub history: VecDeque<HistoricalPosition>,
    /// Tick of the newest movement update.
    pub last_move_tick: u64,
    teleported: bool,
}

impl Entity {
    pub fn new(runtime_id: u64, entity_type: &str, position: Vec3, is_player: bool) -> Self {
        let (width, height) = if is_player {
            (PLAYER_WIDTH, PLAYER_HEIGHT)
        } else {
            default_size(entity_type)
        };
        Self {
            runtime_id,
            entity_type: entity_type.to_string(),
            position,
            last_position: position,
            velocity: Vec3::ZERO,
            width,
            height,
            scale: 1.0,
            is_player,
            history: VecDeque::with_capacity(DEFAULT_MAX_REWIND),
            last_move_tick: 0,
            teleported: false,
        }
    }

    pub fn player(runtime_id: u64, feet: Vec3) -> Self {
        Self::new(runtime_id, "minecraft:player", feet, true)
    }

    pub fn bounding_box(&self) -> Aabb {
        self.box_at(self.position)
    }

    /// The entity's box if its feet were at `pos`.
    pub fn box_at(&self, pos: Vec3) -> Aabb {
        Aabb::from_bottom_center(pos, self.width * self.scale, self.height * self.scale)
    }

    pub fn newest_record(&self) -> Option<&HistoricalPosition> {
        self.history.back()
    }
}

/// Known sizes of a few non-player entities. Unknown ones get a player-sized box.
pub fn default_size(entity_type: &str) -> (f32, f32) {
    match entity_type {
        "minecraft:zombie" | "minecraft:skeleton" | "minecraft:husk" => (0.6, 1.9),
        "minecraft:creeper" => (0.6, 1.7),
        "minecraft:spider" => (1.4, 0.9),
        "minecraft:cow" | "minecraft:mooshroom" => (0.9, 1.3),
        "minecraft:pig" => (0.9, 0.9),
        "minecraft:sheep" => (0.9, 1.3),
        "minecraft:chicken" => (0.4, 0.7),
        "minecraft:villager_v2" | "minecraft:villager" => (0.6, 1.9),
        "minecraft:iron_golem" => (1.4, 2.9),
        "minecraft:slime" => (0.52, 0.52),
        "minecraft:armor_stand" => (0.5, 1.975),
        "minecraft:item" | "minecraft:xp_orb" => (0.25, 0.25),
        "minecraft:arrow" => (0.25, 0.25),
        _ => (PLAYER_WIDTH, PLAYER_HEIGHT),
    }
}

pub struct EntityTracker {
    entities: HashMap<u64, Entity>,
    max_rewind: usize,
    current_tick: u64,
}

impl EntityTracker {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            max_rewind: DEFAULT_MAX_REWIND,
            current_tick: 0,
        }
    }

    pub fn add(&mut self, entity: Entity) {
        self.entities.insert(entity.runtime_id, entity);
    }

    pub fn remove(&mut self, runtime_id: u64) -> Option<Entity> {
        self.entities.remove(&runtime_id)
    }

    pub fn find(&self, runtime_id: u64) -> Option<&Entity> {
        self.entities.get(&runtime_id)
    }

    pub fn find_mut(&mut self, runtime_id: u64) -> Option<&mut Entity> {
        self.entities.get_mut(&runtime_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Moves an entity. Player positions arrive at eye height and are stored at the feet.
    pub fn move_entity(&mut self, runtime_id: u64, tick: u64, pos: Vec3, teleport: bool) -> bool {
        let Some(entity) = self.entities.get_mut(&runtime_id) else {
            return false;
        };
        let mut pos = pos;
        if entity.is_player {
            pos.y -= PLAYER_EYE_HEIGHT;
        }
        entity.velocity = pos - entity.position;
        entity.position = pos;
        entity.last_move_tick = tick;
        entity.teleported |= teleport;
        true
    }

    /// Records the current position of every entity under `tick` and rolls `last_position`.
    pub fn tick(&mut self, tick: u64) {
        self.current_tick = tick;
        let max = self.max_rewind;
        for entity in self.entities.values_mut() {
            entity.history.push_back(HistoricalPosition {
                position: entity.position,
                prev_position: entity.last_position,
                tick,
                teleport: entity.teleported,
            });
            while entity.history.len() > max {
                entity.history.pop_front();
            }
            entity.last_position = entity.position;
            entity.teleported = false;
        }
    }

    /// Newest record with `record.tick <= tick`, or `None` if the history does not reach back that far.
    pub fn rewind(&self, runtime_id: u64, tick: u64) -> Option<HistoricalPosition> {
        self.entities
            .get(&runtime_id)?
            .history
            .iter()
            .rev()
            .find(|record| record.tick <= tick)
            .copied()
    }

    pub fn set_max_rewind(&mut self, max_rewind: usize) {
        self.max_rewind = max_rewind.max(1);
        for entity in self.entities.values_mut() {
            while entity.history.len() > self.max_rewind {
                entity.history.pop_front();
            }
        }
    }

    pub fn max_rewind(&self) -> usize {
        self.max_rewind
    }

    /// Entities whose feet lie within `radius` of `center`.
    pub fn entities_within(&self, center: Vec3, radius: f32) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.position.distance(center) <= radius)
            .collect()
    }
}

impl Default for EntityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn tracker_with_zombie() -> EntityTracker {
        let mut tracker = EntityTracker::new();
        tracker.add(Entity::new(2, "minecraft:zombie", Vec3::new(0.0, 64.0, 0.0), false));
        tracker
    }

    #[test]
    fn test_player_moves_are_stored_at_feet() {
        let mut tracker = EntityTracker::new();
        tracker.add(Entity::player(1, Vec3::new(0.0, 64.0, 0.0)));
        assert!(tracker.move_entity(1, 1, Vec3::new(1.0, 65.62, 0.0), false));
        assert_approx_eq!(tracker.find(1).unwrap().position.y, 64.0, 1e-5);
        assert!(!tracker.move_entity(99, 1, Vec3::ZERO, false));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = tracker_with_zombie();
        for tick in 1..=20 {
            tracker.move_entity(2, tick, Vec3::new(tick as f32, 64.0, 0.0), false);
            tracker.tick(tick);
        }
        let entity = tracker.find(2).unwrap();
        assert_eq!(entity.history.len(), DEFAULT_MAX_REWIND);
        assert_eq!(entity.history.front().unwrap().tick, 15);
        assert_eq!(entity.history.back().unwrap().tick, 20);
    }

    #[test]
    fn test_rewind_returns_newest_not_after_tick() {
        let mut tracker = tracker_with_zombie();
        for tick in [10, 12, 14] {
            tracker.move_entity(2, tick, Vec3::new(tick as f32, 64.0, 0.0), false);
            tracker.tick(tick);
        }
        let record = tracker.rewind(2, 13).unwrap();
        assert_eq!(record.tick, 12);
        assert_eq!(record.position.x, 12.0);
        assert_eq!(record.prev_position.x, 10.0);
        assert_eq!(tracker.rewind(2, 14).unwrap().tick, 14);
        assert_eq!(tracker.rewind(2, 100).unwrap().tick, 14);
    }

    #[test]
    fn test_rewind_fails_beyond_window() {
        let mut tracker = tracker_with_zombie();
        for tick in 10..=16 {
            tracker.tick(tick);
        }
        assert!(tracker.rewind(2, 10).is_none());
        assert!(tracker.rewind(2, 11).is_some());
        assert!(tracker.rewind(3, 16).is_none());
    }

    #[test]
    fn test_history_ticks_monotonic() {
        let mut tracker = tracker_with_zombie();
        for tick in [1, 2, 2, 5, 9] {
            tracker.tick(tick);
        }
        let ticks: Vec<u64> = tracker.find(2).unwrap().history.iter().map(|h| h.tick).collect();
        assert!(ticks.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_teleport_marks_record_and_skips_interpolation() {
        let mut tracker = tracker_with_zombie();
        tracker.tick(1);
        tracker.move_entity(2, 2, Vec3::new(50.0, 64.0, 0.0), true);
        tracker.tick(2);
        tracker.move_entity(2, 3, Vec3::new(51.0, 64.0, 0.0), false);
        tracker.tick(3);

        let jump = tracker.rewind(2, 2).unwrap();
        assert!(jump.teleport);
        assert_eq!(jump.interpolate(0.5), Vec3::new(50.0, 64.0, 0.0));
        let walk = tracker.rewind(2, 3).unwrap();
        assert!(!walk.teleport);
        assert_approx_eq!(walk.interpolate(0.5).x, 50.5, 1e-5);
    }

    #[test]
    fn test_set_max_rewind_truncates() {
        let mut tracker = tracker_with_zombie();
        for tick in 1..=6 {
            tracker.tick(tick);
        }
        tracker.set_max_rewind(2);
        assert_eq!(tracker.find(2).unwrap().history.len(), 2);
        assert!(tracker.rewind(2, 4).is_none());
    }

    #[test]
    fn test_bounding_box_uses_scale() {
        let mut entity = Entity::player(1, Vec3::new(0.0, 64.0, 0.0));
        entity.scale = 2.0;
        let bb = entity.bounding_box();
        assert_approx_eq!(bb.width(), 1.2, 1e-5);
        assert_approx_eq!(bb.height(), 3.6, 1e-5);
    }

    #[test]
    fn test_entities_within() {
        let mut tracker = tracker_with_zombie();
        tracker.add(Entity::new(3, "minecraft:pig", Vec3::new(10.0, 64.0, 0.0), false));
        assert_eq!(tracker.entities_within(Vec3::new(0.0, 64.0, 0.0), 6.0).len(), 1);
    }
}
