//! Lag-compensated attack validation.
//!
//! An attack is judged against where the victim was on the attacker's screen.
//! The attacker's eye, rotation and the victim's position are interpolated
//! across the attacker's last tick in [`SUB_TICKS`] steps; the hit stands if
//! any step reaches the victim within range and no block is in the way.

use crate::entity::{Entity, HistoricalPosition};
use crate::world::World;
use shared::{Aabb, Rotation, Vec3};

pub const SUB_TICKS: usize = 10;
pub const RAY_LENGTH: f32 = 7.0;
pub const HITBOX_GROWTH: f32 = 0.1;
pub const REACH_EPSILON: f32 = 1e-5;
/// Radius searched for the entity a mispredicted swing was aimed at.
pub const MISPREDICTION_RADIUS: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackerSnapshot {
    pub prev_eye: Vec3,
    pub eye: Vec3,
    pub prev_rotation: Rotation,
    pub rotation: Rotation,
}

impl AttackerSnapshot {
    /// An attacker that did not move during the tick.
    pub fn stationary(eye: Vec3, rotation: Rotation) -> Self {
        Self {
            prev_eye: eye,
            eye,
            prev_rotation: rotation,
            rotation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VictimSnapshot {
    /// Feet positions at the start and end of the tick.
    pub prev: Vec3,
    pub current: Vec3,
    pub width: f32,
    pub height: f32,
    pub teleport: bool,
}

impl VictimSnapshot {
    /// The victim as recorded by a rewound history entry.
    pub fn rewound(entity: &Entity, record: &HistoricalPosition) -> Self {
        Self {
            prev: record.prev_position,
            current: record.position,
            width: entity.width * entity.scale,
            height: entity.height * entity.scale,
            teleport: record.teleport,
        }
    }

    /// The victim at its live position.
    pub fn live(entity: &Entity) -> Self {
        Self {
            prev: entity.last_position,
            current: entity.position,
            width: entity.width * entity.scale,
            height: entity.height * entity.scale,
            teleport: false,
        }
    }

    fn box_at(&self, t: f32) -> Aabb {
        let feet = if self.teleport {
            self.current
        } else {
            self.prev.lerp(self.current, t)
        };
        Aabb::from_bottom_center(feet, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatOptions {
    pub max_reach: f32,
    /// Touch input is judged by raw distance instead of the ray.
    pub touch: bool,
    pub check_occlusion: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombatResult {
    pub hit_valid: bool,
    pub raycast_distances: Vec<f32>,
    pub raw_distances: Vec<f32>,
    pub occluded: bool,
}

impl CombatResult {
    pub fn min_raycast(&self) -> Option<f32> {
        self.raycast_distances.iter().copied().reduce(f32::min)
    }

    pub fn min_raw(&self) -> Option<f32> {
        self.raw_distances.iter().copied().reduce(f32::min)
    }
}

/// Runs the interpolated reach check for one attack.
pub fn validate_attack(
    attacker: &AttackerSnapshot,
    victim: &VictimSnapshot,
    options: &CombatOptions,
    world: &World,
) -> CombatResult {
    let mut result = CombatResult::default();
    let limit = options.max_reach + REACH_EPSILON;
    let mut inside = false;
    // eye, direction and distance of the shortest ray hit
    let mut closest: Option<(Vec3, Vec3, f32)> = None;

    for step in 0..SUB_TICKS {
        let t = (step + 1) as f32 / SUB_TICKS as f32;
        let eye = attacker.prev_eye.lerp(attacker.eye, t);
        let direction = attacker.prev_rotation.lerp(attacker.rotation, t).direction();
        let bb = victim.box_at(t);

        if bb.grow(HITBOX_GROWTH).contains_point(eye) {
            inside = true;
            result.raycast_distances.push(0.0);
            result.raw_distances.push(0.0);
            continue;
        }

        if let Some(hit) = bb.ray_intercept(eye, direction, RAY_LENGTH) {
            result.raycast_distances.push(hit.distance);
            if closest.map_or(true, |(_, _, d)| hit.distance < d) {
                closest = Some((eye, direction, hit.distance));
            }
        }
        result.raw_distances.push(bb.distance_to_point(eye));
    }

    let in_reach = if options.touch {
        result.min_raw().is_some_and(|d| d <= limit)
    } else {
        result.min_raycast().is_some_and(|d| d <= limit)
    };
    result.hit_valid = inside || in_reach;

    if result.hit_valid && !inside && options.check_occlusion && !options.touch {
        if let Some((eye, direction, distance)) = closest {
            if distance > 0.0 && world.line_obstructed(eye, eye + direction * distance, None) {
                result.occluded = true;
                result.hit_valid = false;
            }
        }
    }

    result
}

/// Looks for the entity a swing reported as missed would have hit.
///
/// Returns the closest valid target by ray distance.
pub fn find_mispredicted_target<I>(
    attacker: &AttackerSnapshot,
    candidates: I,
    options: &CombatOptions,
    world: &World,
) -> Option<(u64, CombatResult)>
where
    I: IntoIterator<Item = (u64, VictimSnapshot)>,
{
    let ray_options = CombatOptions {
        touch: false,
        ..*options
    };
    candidates
        .into_iter()
        .filter(|(_, victim)| victim.current.distance(attacker.eye) <= MISPREDICTION_RADIUS + victim.height)
        .map(|(id, victim)| (id, validate_attack(attacker, &victim, &ray_options, world)))
        .filter(|(_, result)| result.hit_valid)
        .min_by(|a, b| {
            let da = a.1.min_raycast().unwrap_or(0.0);
            let db = b.1.min_raycast().unwrap_or(0.0);
            da.total_cmp(&db)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_support::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{BlockPos, PLAYER_EYE_HEIGHT};

    // yaw -90 looks along +X
    const EAST: Rotation = Rotation::new(0.0, -90.0, -90.0);

    fn victim_at(x: f32) -> VictimSnapshot {
        let feet = Vec3::new(x, 0.0, 0.0);
        VictimSnapshot {
            prev: feet,
            current: feet,
            width: 0.6,
            height: 1.8,
            teleport: false,
        }
    }

    fn options(touch: bool) -> CombatOptions {
        CombatOptions {
            max_reach: 2.9,
            touch,
            check_occlusion: true,
        }
    }

    fn attacker() -> AttackerSnapshot {
        AttackerSnapshot::stationary(Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0), EAST)
    }

    #[test]
    fn test_just_out_of_range() {
        let world = empty_world();
        let result = validate_attack(&attacker(), &victim_at(3.5), &options(false), &world);
        assert!(!result.hit_valid);
        assert_eq!(result.raycast_distances.len(), SUB_TICKS);
        assert_approx_eq!(result.min_raycast().unwrap(), 3.2, 1e-4);
    }

    #[test]
    fn test_exact_reach_is_valid() {
        let world = empty_world();
        let result = validate_attack(&attacker(), &victim_at(3.2), &options(false), &world);
        assert!(result.hit_valid);
        assert_approx_eq!(result.min_raycast().unwrap(), 2.9, 1e-5);
    }

    #[test]
    fn test_reach_plus_epsilon_is_invalid() {
        let world = empty_world();
        let result = validate_attack(&attacker(), &victim_at(3.2 + 1e-4), &options(false), &world);
        assert!(!result.hit_valid);
    }

    #[test]
    fn test_looking_away_misses_ray() {
        let world = empty_world();
        let away = AttackerSnapshot::stationary(Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0), Rotation::new(0.0, 90.0, 90.0));
        let result = validate_attack(&away, &victim_at(2.0), &options(false), &world);
        assert!(result.raycast_distances.is_empty());
        assert!(!result.hit_valid);
        assert_approx_eq!(result.min_raw().unwrap(), 1.7, 1e-4);
    }

    #[test]
    fn test_touch_uses_raw_distance() {
        let world = empty_world();
        let away = AttackerSnapshot::stationary(Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0), Rotation::new(0.0, 90.0, 90.0));
        let result = validate_attack(&away, &victim_at(2.0), &options(true), &world);
        assert!(result.hit_valid);
    }

    #[test]
    fn test_eye_inside_grown_box() {
        let world = empty_world();
        let result = validate_attack(&attacker(), &victim_at(0.35), &options(false), &world);
        assert!(result.hit_valid);
        assert_eq!(result.min_raycast(), Some(0.0));
    }

    #[test]
    fn test_interpolation_catches_retreating_victim() {
        let world = empty_world();
        let victim = VictimSnapshot {
            prev: Vec3::new(3.0, 0.0, 0.0),
            current: Vec3::new(4.0, 0.0, 0.0),
            width: 0.6,
            height: 1.8,
            teleport: false,
        };
        let result = validate_attack(&attacker(), &victim, &options(false), &world);
        assert!(result.hit_valid);
        assert_approx_eq!(result.min_raycast().unwrap(), 2.8, 1e-4);
    }

    #[test]
    fn test_teleport_skips_interpolation() {
        let world = empty_world();
        let victim = VictimSnapshot {
            prev: Vec3::new(3.0, 0.0, 0.0),
            current: Vec3::new(4.0, 0.0, 0.0),
            width: 0.6,
            height: 1.8,
            teleport: true,
        };
        let result = validate_attack(&attacker(), &victim, &options(false), &world);
        assert!(!result.hit_valid);
    }

    #[test]
    fn test_wall_occludes_hit() {
        let mut world = flat_world(64);
        let stone = state(&world, "minecraft:stone");
        world.set_block(BlockPos::new(1, 65, 0), stone);
        let eye = Vec3::new(0.5, 64.0 + PLAYER_EYE_HEIGHT, 0.5);
        let attacker = AttackerSnapshot::stationary(eye, EAST);
        let victim = VictimSnapshot {
            prev: Vec3::new(3.0, 64.0, 0.5),
            current: Vec3::new(3.0, 64.0, 0.5),
            width: 0.6,
            height: 1.8,
            teleport: false,
        };
        let result = validate_attack(&attacker, &victim, &options(false), &world);
        assert!(result.occluded);
        assert!(!result.hit_valid);

        let no_check = CombatOptions {
            check_occlusion: false,
            ..options(false)
        };
        assert!(validate_attack(&attacker, &victim, &no_check, &world).hit_valid);
    }

    #[test]
    fn test_misprediction_picks_closest_hit() {
        let world = empty_world();
        let candidates = vec![
            (7, victim_at(2.5)),
            (8, victim_at(1.5)),
            (9, VictimSnapshot {
                prev: Vec3::new(0.0, 0.0, 2.0),
                current: Vec3::new(0.0, 0.0, 2.0),
                width: 0.6,
                height: 1.8,
                teleport: false,
            }),
        ];
        let (id, result) = find_mispredicted_target(&attacker(), candidates, &options(false), &world).unwrap();
        assert_eq!(id, 8);
        assert_approx_eq!(result.min_raycast().unwrap(), 1.2, 1e-4);
    }

    #[test]
    fn test_misprediction_with_nothing_in_sight() {
        let world = empty_world();
        let candidates = vec![(1, victim_at(5.5))];
        assert!(find_mispredicted_target(&attacker(), candidates, &options(false), &world).is_none());
    }
}
