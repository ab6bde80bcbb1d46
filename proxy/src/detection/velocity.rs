use super::{Detection, DetectionMetadata, Report};
use crate::player::Player;
use shared::Packet;

/// Vertical knockback smaller than this is not measured.
const MIN_VERTICAL: f32 = 0.05;
const MIN_RATIO: f32 = 0.5;

/// Vertical knockback the client did not take.
pub struct VelocityA {
    metadata: DetectionMetadata,
}

impl VelocityA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(10.0, 2.0, 4.0),
        }
    }
}

impl Default for VelocityA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for VelocityA {
    fn id(&self) -> &'static str {
        "VelocityA"
    }

    fn kind(&self) -> &'static str {
        "Velocity"
    }

    fn subtype(&self) -> &'static str {
        "A"
    }

    fn metadata(&self) -> &DetectionMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut DetectionMetadata {
        &mut self.metadata
    }

    fn post_client_packet(&mut self, packet: &Packet, player: &Player, report: &mut Report) {
        if !matches!(packet, Packet::PlayerAuthInput(_)) {
            return;
        }
        let movement = &player.movement;
        if movement.ticks_since_knockback != 0 || movement.mov.y <= MIN_VERTICAL || movement.flags.collide_y {
            return;
        }
        let taken = movement.client_pos.y - movement.last_pos.y;
        let ratio = taken / movement.mov.y;
        if ratio < MIN_RATIO {
            report.fail(format!("ratio={:.3}", ratio));
        } else {
            self.metadata.pass(0.1);
        }
    }
}
