//! Voxel traversal along a segment.

use super::World;
use shared::{BlockPos, Vec3};

const RAY_EPSILON: f32 = 1e-6;
const MAX_STEPS: usize = 64;

/// Every block cell a ray of length `max_distance` passes through, in order.
pub fn line_blocks(origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<BlockPos> {
    let len_sq = direction.length_squared();
    if len_sq <= 1e-8 || max_distance <= 0.0 || !origin.is_finite() {
        return Vec::new();
    }
    let dir = direction * len_sq.sqrt().recip();
    let origin = [origin.x, origin.y, origin.z];
    let dir = [dir.x, dir.y, dir.z];

    let mut cell = [
        origin[0].floor() as i32,
        origin[1].floor() as i32,
        origin[2].floor() as i32,
    ];
    let mut step = [0i32; 3];
    let mut t_max = [f32::INFINITY; 3];
    let mut t_delta = [f32::INFINITY; 3];

    for axis in 0..3 {
        let d = dir[axis];
        if d > RAY_EPSILON {
            step[axis] = 1;
            t_max[axis] = (cell[axis] as f32 + 1.0 - origin[axis]) / d;
            t_delta[axis] = 1.0 / d;
        } else if d < -RAY_EPSILON {
            step[axis] = -1;
            t_max[axis] = (cell[axis] as f32 - origin[axis]) / d;
            t_delta[axis] = -1.0 / d;
        }
    }

    let mut cells = vec![BlockPos::new(cell[0], cell[1], cell[2])];
    for _ in 0..MAX_STEPS {
        let mut axis = 0;
        for candidate in 1..3 {
            if t_max[candidate] < t_max[axis] {
                axis = candidate;
            }
        }
        let traversed = t_max[axis];
        if !traversed.is_finite() || traversed > max_distance {
            break;
        }
        cell[axis] += step[axis];
        t_max[axis] += t_delta[axis];
        cells.push(BlockPos::new(cell[0], cell[1], cell[2]));
    }
    cells
}

impl World {
    /// First block whose interaction boxes the segment from `from` to `to` crosses.
    ///
    /// Pass-through blocks never obstruct. `ignore` is skipped, which lets a
    /// caller exclude the block it is aiming at.
    pub fn first_obstruction(&self, from: Vec3, to: Vec3, ignore: Option<BlockPos>) -> Option<(BlockPos, f32)> {
        let delta = to - from;
        let length = delta.length();
        if length <= RAY_EPSILON {
            return None;
        }
        let dir = delta * (1.0 / length);
        for pos in line_blocks(from, dir, length) {
            if Some(pos) == ignore {
                continue;
            }
            let block = self.block(pos);
            if block.pass_through {
                continue;
            }
            let hit = block
                .interaction_boxes(pos)
                .iter()
                .filter_map(|bb| bb.ray_intercept(from, dir, length))
                .map(|hit| hit.distance)
                .fold(None, |best: Option<f32>, d| Some(best.map_or(d, |b| b.min(d))));
            if let Some(distance) = hit {
                if distance < length - RAY_EPSILON {
                    return Some((pos, distance));
                }
            }
        }
        None
    }

    pub fn line_obstructed(&self, from: Vec3, to: Vec3, ignore: Option<BlockPos>) -> bool {
        self.first_obstruction(from, to, ignore).is_some()
    }
}
