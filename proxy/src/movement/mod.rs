//! Authoritative player movement.
//!
//! Every `PlayerAuthInput` advances a server-side copy of the player by one
//! tick (`simulate::tick`). The client's reported position is accepted when it
//! lands within the correction threshold of the prediction; otherwise the
//! client is sent a `CorrectPlayerMovePrediction` and the prediction stands.
//!
//! Teleports and knockback arrive from the server but only take effect once
//! the client acknowledges them, so the ack engine queues them here through
//! [`MovementState::queue_teleport`] and [`MovementState::queue_knockback`].

pub mod collision;
pub mod simulate;

use log::debug;
use shared::{
    Aabb, InputFlags, PlayerAuthInput, Rotation, Vec3, PLAYER_EYE_HEIGHT, PLAYER_HEIGHT,
    PLAYER_SNEAK_EYE_HEIGHT, PLAYER_SNEAK_HEIGHT, PLAYER_WIDTH,
};

pub const GRAVITY: f32 = 0.08;
pub const SLOW_FALLING_GRAVITY: f32 = 0.01;
pub const JUMP_VELOCITY: f32 = 0.42;
pub const DEFAULT_MOVEMENT_SPEED: f32 = 0.1;
pub const AIR_SPEED: f32 = 0.02;
pub const SPRINT_AIR_SPEED: f32 = 0.026;
pub const JUMP_DELAY_TICKS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeleportRequest {
    /// Feet position.
    pub position: Vec3,
    pub on_ground: bool,
    /// Smoothed teleports keep the current velocity and let simulation continue.
    pub smoothed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementFlags {
    pub sprinting: bool,
    pub sneaking: bool,
    pub jumping: bool,
    pub pressing_jump: bool,
    pub pressing_sneak: bool,
    pub on_ground: bool,
    pub collide_x: bool,
    pub collide_y: bool,
    pub collide_z: bool,
    pub penetrated_last_frame: bool,
    pub stuck_in_collider: bool,
    /// The server disabled client-side prediction, so the client position is trusted.
    pub no_client_predictions: bool,
    /// Simulation is enabled for this player's gamemode and configuration.
    pub can_simulate: bool,
    pub flying: bool,
    pub no_clip: bool,
    pub immobile: bool,
    pub may_fly: bool,
    /// Flight granted by abilities; flying ticks are trusted rather than simulated.
    pub trust_fly: bool,
}

/// Result of comparing the client's position against the prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validation {
    Accepted,
    /// Send the client back to the predicted state.
    Corrected {
        position: Vec3,
        velocity: Vec3,
        on_ground: bool,
    },
    /// The tick could not be simulated and the client position was taken as is.
    Trusted,
}

#[derive(Debug, Clone)]
pub struct MovementState {
    /// Feet position.
    pub pos: Vec3,
    pub last_pos: Vec3,
    pub vel: Vec3,
    pub last_vel: Vec3,
    /// Motion applied by the last simulated tick.
    pub mov: Vec3,
    pub last_mov: Vec3,
    pub rotation: Rotation,
    pub last_rotation: Rotation,
    pub impulse_forward: f32,
    pub impulse_strafe: f32,
    pub width: f32,
    pub height: f32,
    pub gravity: f32,
    pub jump_height: f32,
    pub movement_speed: f32,
    pub air_speed: f32,
    pub knockback: Option<Vec3>,
    pub teleport: Option<TeleportRequest>,
    pub flags: MovementFlags,
    pub jump_delay: u32,
    /// Last position the player stood at without overlapping a collider.
    pub known_safe_pos: Vec3,
    /// Corrections sent but not yet acknowledged.
    pub pending_corrections: u32,
    /// Feet position from the latest input.
    pub client_pos: Vec3,
    pub client_tick: u64,
    pub ticks_since_teleport: u32,
    pub ticks_since_knockback: u32,
}

impl MovementState {
    pub fn new(feet: Vec3) -> Self {
        Self {
            pos: feet,
            last_pos: feet,
            vel: Vec3::ZERO,
            last_vel: Vec3::ZERO,
            mov: Vec3::ZERO,
            last_mov: Vec3::ZERO,
            rotation: Rotation::default(),
            last_rotation: Rotation::default(),
            impulse_forward: 0.0,
            impulse_strafe: 0.0,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
            gravity: GRAVITY,
            jump_height: JUMP_VELOCITY,
            movement_speed: DEFAULT_MOVEMENT_SPEED,
            air_speed: AIR_SPEED,
            knockback: None,
            teleport: None,
            flags: MovementFlags {
                can_simulate: true,
                ..MovementFlags::default()
            },
            jump_delay: 0,
            known_safe_pos: feet,
            pending_corrections: 0,
            client_pos: feet,
            client_tick: 0,
            ticks_since_teleport: 0,
            ticks_since_knockback: u32::MAX,
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        Aabb::from_bottom_center(self.pos, self.width, self.height)
    }

    pub fn eye_height(&self) -> f32 {
        if self.flags.sneaking {
            PLAYER_SNEAK_EYE_HEIGHT
        } else {
            PLAYER_EYE_HEIGHT
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        self.pos + Vec3::new(0.0, self.eye_height(), 0.0)
    }

    /// Whether the tick should be simulated at all.
    pub fn can_simulate(&self) -> bool {
        self.flags.can_simulate
            && !self.flags.no_clip
            && !self.flags.no_client_predictions
            && !(self.flags.flying && self.flags.trust_fly)
    }

    pub fn queue_teleport(&mut self, position: Vec3, on_ground: bool, smoothed: bool) {
        self.teleport = Some(TeleportRequest {
            position,
            on_ground,
            smoothed,
        });
    }

    pub fn queue_knockback(&mut self, velocity: Vec3) {
        self.knockback = Some(velocity);
    }

    pub fn has_teleport(&self) -> bool {
        self.teleport.is_some()
    }

    /// Copies this tick's inputs from the client packet.
    pub fn update_input(&mut self, input: &PlayerAuthInput) {
        let flags = input.input_data;
        self.last_rotation = self.rotation;
        self.rotation = Rotation::new(input.pitch, input.head_yaw, input.yaw);
        self.impulse_forward = input.move_forward.clamp(-1.0, 1.0);
        self.impulse_strafe = input.move_strafe.clamp(-1.0, 1.0);
        self.client_pos = input.position - Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0);
        self.client_tick = input.tick;

        if flags.has(InputFlags::START_SPRINTING) {
            self.flags.sprinting = true;
        }
        if flags.has(InputFlags::STOP_SPRINTING) {
            self.flags.sprinting = false;
        }
        if flags.has(InputFlags::START_FLYING) && self.flags.may_fly {
            self.flags.flying = true;
            self.flags.trust_fly = true;
        }
        if flags.has(InputFlags::STOP_FLYING) {
            self.flags.flying = false;
        }
        // the held sneak bit is resent every tick, start and stop only mark edges
        self.flags.sneaking = (flags.has(InputFlags::SNEAKING) || flags.has(InputFlags::START_SNEAKING))
            && !flags.has(InputFlags::STOP_SNEAKING);
        self.flags.pressing_jump = flags.has(InputFlags::JUMP_DOWN);
        self.flags.pressing_sneak = flags.has(InputFlags::SNEAK_DOWN);
        self.flags.jumping = flags.has(InputFlags::START_JUMPING) || flags.has(InputFlags::JUMPING);

        self.height = if self.flags.sneaking {
            PLAYER_SNEAK_HEIGHT
        } else {
            PLAYER_HEIGHT
        };
    }

    /// Compares the client's position against the simulated one.
    pub fn validate(&mut self, threshold: f32) -> Validation {
        let client = self.client_pos;
        if std::mem::take(&mut self.flags.stuck_in_collider) {
            self.pending_corrections += 1;
            return Validation::Corrected {
                position: self.pos,
                velocity: self.vel,
                on_ground: self.flags.on_ground,
            };
        }
        if !client.is_finite() {
            self.pending_corrections += 1;
            return Validation::Corrected {
                position: self.pos,
                velocity: self.vel,
                on_ground: self.flags.on_ground,
            };
        }

        let deviation = client.distance(self.pos);
        if deviation <= threshold {
            self.pos = client;
            return Validation::Accepted;
        }

        debug!(
            "Movement deviated by {:.4} (client {:?}, server {:?})",
            deviation, client, self.pos
        );
        self.pending_corrections += 1;
        Validation::Corrected {
            position: self.pos,
            velocity: self.vel,
            on_ground: self.flags.on_ground,
        }
    }

    /// Takes the client's position verbatim.
    pub fn trust_client(&mut self) -> Validation {
        if self.client_pos.is_finite() {
            self.last_pos = self.pos;
            self.pos = self.client_pos;
        }
        self.vel = self.pos - self.last_pos;
        Validation::Trusted
    }

    /// Called from the ack engine once the client has applied a correction.
    pub fn correction_acknowledged(&mut self) {
        self.pending_corrections = self.pending_corrections.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn input_at(feet: Vec3) -> PlayerAuthInput {
        PlayerAuthInput::idle(1, feet + Vec3::new(0.0, PLAYER_EYE_HEIGHT, 0.0))
    }

    #[test]
    fn test_input_converts_eye_to_feet() {
        let mut state = MovementState::new(Vec3::new(0.5, 64.0, 0.5));
        state.update_input(&input_at(Vec3::new(1.0, 65.0, 1.0)));
        assert_approx_eq!(state.client_pos.y, 65.0, 1e-4);
    }

    #[test]
    fn test_sneak_flags_shrink_box() {
        let mut state = MovementState::new(Vec3::new(0.5, 64.0, 0.5));
        let mut input = input_at(state.pos);
        input.input_data.set(InputFlags::START_SNEAKING);
        state.update_input(&input);
        assert!(state.flags.sneaking);
        assert_approx_eq!(state.height, PLAYER_SNEAK_HEIGHT);
        assert_approx_eq!(state.eye_height(), PLAYER_SNEAK_EYE_HEIGHT);

        let mut input = input_at(state.pos);
        input.input_data.set(InputFlags::STOP_SNEAKING);
        state.update_input(&input);
        assert!(!state.flags.sneaking);
    }

    #[test]
    fn test_sneaking_follows_held_bit() {
        let mut state = MovementState::new(Vec3::new(0.5, 64.0, 0.5));
        let mut input = input_at(state.pos);
        input.input_data.set(InputFlags::SNEAKING);
        state.update_input(&input);
        assert!(state.flags.sneaking);

        // released without a stop edge
        state.update_input(&input_at(state.pos));
        assert!(!state.flags.sneaking);
        assert_approx_eq!(state.height, PLAYER_HEIGHT);
    }

    #[test]
    fn test_flying_requires_permission() {
        let mut state = MovementState::new(Vec3::ZERO);
        let mut input = input_at(Vec3::ZERO);
        input.input_data.set(InputFlags::START_FLYING);
        state.update_input(&input);
        assert!(!state.flags.flying);

        state.flags.may_fly = true;
        state.update_input(&input);
        assert!(state.flags.flying);
        assert!(!state.can_simulate());
    }

    #[test]
    fn test_validation_within_threshold_accepts_client() {
        let mut state = MovementState::new(Vec3::new(0.5, 64.0, 0.5));
        state.client_pos = Vec3::new(0.6, 64.0, 0.5);
        assert_eq!(state.validate(0.3), Validation::Accepted);
        assert_approx_eq!(state.pos.x, 0.6);
    }

    #[test]
    fn test_validation_beyond_threshold_corrects() {
        let mut state = MovementState::new(Vec3::new(0.5, 64.0, 0.5));
        state.client_pos = Vec3::new(2.0, 64.0, 0.5);
        match state.validate(0.3) {
            Validation::Corrected { position, .. } => assert_approx_eq!(position.x, 0.5),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(state.pending_corrections, 1);
        state.correction_acknowledged();
        assert_eq!(state.pending_corrections, 0);
    }

    #[test]
    fn test_non_finite_client_position_is_corrected() {
        let mut state = MovementState::new(Vec3::new(0.5, 64.0, 0.5));
        state.client_pos = Vec3::new(f32::NAN, 64.0, 0.5);
        assert!(matches!(state.validate(0.3), Validation::Corrected { .. }));
        assert!(state.pos.is_finite());
    }
}
