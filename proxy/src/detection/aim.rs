use super::{Detection, DetectionMetadata, Report};
use crate::player::Player;
use shared::{wrap_degrees, InputMode, Packet};

/// Yaw changes below this are treated as no rotation.
const MIN_DELTA: f32 = 1.0;
const ROUNDING_TOLERANCE: f32 = 1e-5;

/// Mouse rotations that land on whole degrees, a trait of aim assistance
/// that writes rotations directly instead of accumulating mouse deltas.
pub struct AimA {
    metadata: DetectionMetadata,
}

impl AimA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(15.0, 5.0, 10.0).with_trust(200),
        }
    }
}

impl Default for AimA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for AimA {
    fn id(&self) -> &'static str {
        "AimA"
    }

    fn kind(&self) -> &'static str {
        "Aim"
    }

    fn subtype(&self) -> &'static str {
        "A"
    }

    fn punishable(&self) -> bool {
        false
    }

    fn metadata(&self) -> &DetectionMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut DetectionMetadata {
        &mut self.metadata
    }

    fn post_client_packet(&mut self, packet: &Packet, player: &Player, report: &mut Report) {
        let Packet::PlayerAuthInput(input) = packet else {
            return;
        };
        if input.input_mode != InputMode::Mouse {
            return;
        }
        let movement = &player.movement;
        let delta = wrap_degrees(movement.rotation.yaw - movement.last_rotation.yaw);
        if delta.abs() < MIN_DELTA {
            return;
        }
        if (delta - delta.round()).abs() < ROUNDING_TOLERANCE {
            report.fail(format!("yaw_delta={:.5}", delta));
        } else {
            self.metadata.pass(0.25);
        }
    }
}
