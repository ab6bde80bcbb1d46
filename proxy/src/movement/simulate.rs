//! One tick of player physics.

use super::collision::{
    block_friction, clamp_sneak_edge, collide, in_cobweb, on_climbable, penetrating,
};
use super::{MovementState, JUMP_DELAY_TICKS, SLOW_FALLING_GRAVITY, SPRINT_AIR_SPEED};
use crate::component::effects::{JUMP_BOOST, LEVITATION, SLOWNESS, SLOW_FALLING, SPEED};
use crate::component::Effects;
use crate::world::World;
use shared::Vec3;

const AIR_FRICTION: f32 = 0.91;
const VERTICAL_DRAG: f32 = 0.98;
const INPUT_DAMPING: f32 = 0.98;
const GROUND_ACCELERATION: f32 = 0.162_771_36;
const SPRINT_MULTIPLIER: f32 = 1.3;
const SNEAK_MULTIPLIER: f32 = 0.3;
const SPRINT_JUMP_BOOST: f32 = 0.2;
const CLIMB_SPEED: f32 = 0.2;
const TERMINAL_VELOCITY: f32 = 3.92;
const COBWEB_SCALE: Vec3 = Vec3::new(0.25, 0.05, 0.25);

pub struct SimulationContext<'a> {
    pub world: &'a World,
    pub effects: &'a Effects,
    pub knockback_resistance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Simulated,
    /// A non-smoothed teleport replaced this tick.
    Teleported,
    /// The player is flying, noclipping or the simulation is off.
    Skipped,
    /// The column under the player is not loaded.
    Unloaded,
    /// Arithmetic produced a non-finite value.
    Invalid,
}

impl TickOutcome {
    /// Whether the client position has to be taken on trust.
    pub fn trusts_client(self) -> bool {
        matches!(self, TickOutcome::Skipped | TickOutcome::Unloaded | TickOutcome::Invalid)
    }
}

/// Adds an input impulse of `speed` along the player's yaw (degrees).
pub fn move_relative(vel: &mut Vec3, strafe: f32, forward: f32, speed: f32, yaw: f32) {
    let mut magnitude = (strafe * strafe + forward * forward).sqrt();
    if magnitude < 1e-4 {
        return;
    }
    if magnitude < 1.0 {
        magnitude = 1.0;
    }
    let scale = speed / magnitude;
    let (strafe, forward) = (strafe * scale, forward * scale);
    let (sin, cos) = yaw.to_radians().sin_cos();
    vel.x += strafe * cos - forward * sin;
    vel.z += forward * cos + strafe * sin;
}

fn ground_speed(state: &MovementState, effects: &Effects, friction: f32) -> f32 {
    let mut speed = state.movement_speed;
    speed *= 1.0 + 0.2 * effects.level(SPEED) as f32;
    speed *= (1.0 - 0.15 * effects.level(SLOWNESS) as f32).max(0.0);
    if state.flags.sprinting {
        speed *= SPRINT_MULTIPLIER;
    }
    speed * (GROUND_ACCELERATION / (friction * friction * friction))
}

fn air_speed(state: &MovementState) -> f32 {
    if state.flags.sprinting {
        state.air_speed.max(SPRINT_AIR_SPEED)
    } else {
        state.air_speed
    }
}

/// Advances `state` by one tick.
pub fn tick(state: &mut MovementState, ctx: &SimulationContext) -> TickOutcome {
    let world = ctx.world;

    state.last_pos = state.pos;
    state.last_vel = state.vel;
    state.last_mov = state.mov;
    state.ticks_since_teleport = state.ticks_since_teleport.saturating_add(1);
    state.ticks_since_knockback = state.ticks_since_knockback.saturating_add(1);
    if state.jump_delay > 0 {
        state.jump_delay -= 1;
    }

    if let Some(teleport) = state.teleport.take() {
        state.pos = teleport.position;
        state.ticks_since_teleport = 0;
        state.knockback = None;
        state.flags.on_ground = true;
        if !teleport.smoothed {
            state.vel = Vec3::ZERO;
            state.mov = Vec3::ZERO;
            state.known_safe_pos = teleport.position;
            return TickOutcome::Teleported;
        }
    }

    if !state.can_simulate() {
        return TickOutcome::Skipped;
    }
    if !state.pos.is_finite() || !state.vel.is_finite() {
        return TickOutcome::Invalid;
    }
    if !world.is_loaded(state.pos) {
        return TickOutcome::Unloaded;
    }

    if let Some(knockback) = state.knockback.take() {
        let horizontal = (1.0 - ctx.knockback_resistance).clamp(0.0, 1.0);
        state.vel += Vec3::new(knockback.x * horizontal, knockback.y, knockback.z * horizontal);
        state.ticks_since_knockback = 0;
    }

    if state.flags.immobile {
        state.vel = Vec3::ZERO;
        state.mov = Vec3::ZERO;
        return TickOutcome::Simulated;
    }

    let bb = state.bounding_box();
    let on_ground = state.flags.on_ground;
    let friction = if on_ground {
        block_friction(world, state.pos) * AIR_FRICTION
    } else {
        AIR_FRICTION
    };

    // impulse
    let mut forward = state.impulse_forward * INPUT_DAMPING;
    let mut strafe = state.impulse_strafe * INPUT_DAMPING;
    if state.flags.sneaking {
        forward *= SNEAK_MULTIPLIER;
        strafe *= SNEAK_MULTIPLIER;
    }
    let speed = if on_ground {
        ground_speed(state, ctx.effects, friction)
    } else {
        air_speed(state)
    };
    move_relative(&mut state.vel, strafe, forward, speed, state.rotation.yaw);

    // gravity
    let levitation = ctx.effects.level(LEVITATION);
    if levitation > 0 {
        state.vel.y += (0.05 * levitation as f32 - state.vel.y) * 0.2;
    } else {
        let gravity = if ctx.effects.level(SLOW_FALLING) > 0 && state.vel.y <= 0.0 {
            SLOW_FALLING_GRAVITY
        } else {
            state.gravity
        };
        state.vel.y = (state.vel.y - gravity).max(-TERMINAL_VELOCITY);
    }

    // jump
    if !state.flags.pressing_jump && !state.flags.jumping {
        state.jump_delay = 0;
    }
    if (state.flags.jumping || state.flags.pressing_jump) && on_ground && state.jump_delay == 0 {
        state.vel.y = state.jump_height + 0.1 * ctx.effects.level(JUMP_BOOST) as f32;
        if state.flags.sprinting {
            let (sin, cos) = state.rotation.yaw.to_radians().sin_cos();
            state.vel.x -= sin * SPRINT_JUMP_BOOST;
            state.vel.z += cos * SPRINT_JUMP_BOOST;
        }
        state.jump_delay = JUMP_DELAY_TICKS;
    }

    let climbing = on_climbable(world, &bb);
    if climbing {
        state.vel.x = state.vel.x.clamp(-CLIMB_SPEED, CLIMB_SPEED);
        state.vel.z = state.vel.z.clamp(-CLIMB_SPEED, CLIMB_SPEED);
        state.vel.y = state.vel.y.clamp(-CLIMB_SPEED, CLIMB_SPEED);
        if state.flags.sneaking && state.vel.y < 0.0 {
            state.vel.y = 0.0;
        }
    }

    let webbed = in_cobweb(world, &bb);
    let mut motion = if webbed {
        Vec3::new(
            state.vel.x * COBWEB_SCALE.x,
            state.vel.y * COBWEB_SCALE.y,
            state.vel.z * COBWEB_SCALE.z,
        )
    } else {
        state.vel
    };

    if state.flags.sneaking && on_ground {
        motion = clamp_sneak_edge(world, bb, motion);
    }

    let penetrated = penetrating(world, &bb);
    if penetrated && state.flags.penetrated_last_frame {
        state.flags.stuck_in_collider = true;
        state.flags.penetrated_last_frame = false;
        state.pos = state.known_safe_pos;
        state.vel = Vec3::ZERO;
        state.mov = Vec3::ZERO;
        return TickOutcome::Simulated;
    }
    state.flags.penetrated_last_frame = penetrated;

    let result = collide(world, bb, motion, on_ground);
    state.pos += result.motion;
    state.mov = result.motion;
    state.flags.collide_x = result.collide_x;
    state.flags.collide_y = result.collide_y;
    state.flags.collide_z = result.collide_z;
    state.flags.on_ground = result.on_ground;

    if result.collide_x {
        state.vel.x = 0.0;
    }
    if result.collide_z {
        state.vel.z = 0.0;
    }
    if result.collide_y {
        state.vel.y = 0.0;
    }

    if climbing && (result.collide_x || result.collide_z || state.flags.pressing_jump) {
        state.vel.y = CLIMB_SPEED;
    }

    // friction
    if webbed {
        state.vel = Vec3::ZERO;
    } else {
        state.vel.x *= friction;
        state.vel.z *= friction;
        state.vel.y *= VERTICAL_DRAG;
    }

    if !state.pos.is_finite() {
        return TickOutcome::Invalid;
    }
    if !penetrated {
        state.known_safe_pos = state.pos;
    }
    TickOutcome::Simulated
}
