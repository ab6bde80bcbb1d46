//! Block collision for the movement simulator.

use crate::world::World;
use shared::{Aabb, BlockPos, Vec3};

const COLLISION_EPS: f32 = 1e-5;
const SNEAK_EDGE_STEP: f32 = 0.05;
pub const STEP_HEIGHT: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// Motion actually applied after clipping.
    pub motion: Vec3,
    pub collide_x: bool,
    pub collide_y: bool,
    pub collide_z: bool,
    /// Vertical motion was clipped while moving down.
    pub on_ground: bool,
}

fn clip_axes(bb: Aabb, motion: Vec3, boxes: &[Aabb]) -> (Aabb, Vec3) {
    let mut bb = bb;

    let mut y = motion.y;
    for block in boxes {
        y = bb.calculate_y_offset(block, y);
    }
    bb = bb.translate(Vec3::new(0.0, y, 0.0));

    let mut x = motion.x;
    for block in boxes {
        x = bb.calculate_x_offset(block, x);
    }
    bb = bb.translate(Vec3::new(x, 0.0, 0.0));

    let mut z = motion.z;
    for block in boxes {
        z = bb.calculate_z_offset(block, z);
    }
    bb = bb.translate(Vec3::new(0.0, 0.0, z));

    (bb, Vec3::new(x, y, z))
}

/// Moves `bb` by `motion` against the world's block boxes, axis order Y, X, Z.
///
/// When horizontal motion is blocked and the entity was grounded, the move is
/// retried raised by the step height; the retry wins if it covers more
/// horizontal distance.
pub fn collide(world: &World, bb: Aabb, motion: Vec3, was_on_ground: bool) -> CollisionResult {
    let broadphase = bb.extend(motion);
    let boxes = world.collision_boxes(&broadphase.grow(COLLISION_EPS));
    let (_, mut applied) = clip_axes(bb, motion, &boxes);

    let stepped_down = motion.y != applied.y && motion.y < 0.0;
    let blocked = motion.x != applied.x || motion.z != applied.z;

    if (was_on_ground || stepped_down) && blocked {
        let query = bb.extend(Vec3::new(motion.x, STEP_HEIGHT, motion.z));
        let step_boxes = world.collision_boxes(&query.grow(COLLISION_EPS));

        // raise first, then move horizontally
        let raised = clip_axes(bb, Vec3::new(0.0, STEP_HEIGHT, 0.0), &step_boxes);
        let (stepped_bb, horizontal) = clip_axes(
            raised.0,
            Vec3::new(motion.x, 0.0, motion.z),
            &step_boxes,
        );
        let mut down = -raised.1.y;
        for block in &step_boxes {
            down = stepped_bb.calculate_y_offset(block, down);
        }
        let candidate = Vec3::new(horizontal.x, raised.1.y + down, horizontal.z);

        let prev = applied.x * applied.x + applied.z * applied.z;
        let next = candidate.x * candidate.x + candidate.z * candidate.z;
        if next > prev {
            applied = candidate;
        }
    }

    let collide_y = motion.y != applied.y;
    CollisionResult {
        motion: applied,
        collide_x: motion.x != applied.x,
        collide_y,
        collide_z: motion.z != applied.z,
        on_ground: collide_y && motion.y < 0.0,
    }
}

fn step_toward_zero(v: f32) -> f32 {
    if v > 0.0 {
        (v - SNEAK_EDGE_STEP).max(0.0)
    } else {
        (v + SNEAK_EDGE_STEP).min(0.0)
    }
}

/// Whether anything lies within a step below the feet of `bb` moved by `dx, dz`.
fn has_support_below(world: &World, bb: Aabb, dx: f32, dz: f32) -> bool {
    let moved = bb.translate(Vec3::new(dx, 0.0, dz));
    let below = Aabb::new(
        Vec3::new(moved.min.x, moved.min.y - STEP_HEIGHT, moved.min.z),
        Vec3::new(moved.max.x, moved.min.y, moved.max.z),
    );
    world.collides(&below)
}

/// Shortens horizontal motion so a sneaking entity does not leave its support.
pub fn clamp_sneak_edge(world: &World, bb: Aabb, motion: Vec3) -> Vec3 {
    let mut dx = motion.x;
    let mut dz = motion.z;

    while dx.abs() > COLLISION_EPS && !has_support_below(world, bb, dx, 0.0) {
        dx = step_toward_zero(dx);
    }
    while dz.abs() > COLLISION_EPS && !has_support_below(world, bb, 0.0, dz) {
        dz = step_toward_zero(dz);
    }
    while dx.abs() > COLLISION_EPS
        && dz.abs() > COLLISION_EPS
        && !has_support_below(world, bb, dx, dz)
    {
        dx = step_toward_zero(dx);
        dz = step_toward_zero(dz);
    }

    Vec3::new(dx, motion.y, dz)
}

/// Friction of the block supporting the feet at `feet`.
pub fn block_friction(world: &World, feet: Vec3) -> f32 {
    let below = Vec3::new(feet.x, feet.y - 0.5, feet.z).block_pos();
    world.block(below).friction
}

fn any_block(world: &World, bb: &Aabb, test: impl Fn(&crate::world::block::Block) -> bool) -> bool {
    world.blocks_in(bb).iter().any(|(_, block)| test(block))
}

pub fn in_cobweb(world: &World, bb: &Aabb) -> bool {
    any_block(world, bb, |b| b.is_cobweb())
}

pub fn on_climbable(world: &World, bb: &Aabb) -> bool {
    let feet = BlockPos::new(
        ((bb.min.x + bb.max.x) * 0.5).floor() as i32,
        bb.min.y.floor() as i32,
        ((bb.min.z + bb.max.z) * 0.5).floor() as i32,
    );
    world.block(feet).climbable
}

/// Whether the box overlaps any collision box, ignoring contact on the surface.
pub fn penetrating(world: &World, bb: &Aabb) -> bool {
    world.collides(&bb.contract(0.01, 0.01, 0.01))
}
