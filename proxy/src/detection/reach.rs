//! Reach checks over the attack the combat validator just resolved.

use super::{Detection, DetectionMetadata, Report};
use crate::combat::REACH_EPSILON;
use crate::player::Player;
use shared::Packet;

fn is_input(packet: &Packet) -> bool {
    matches!(packet, Packet::PlayerAuthInput(_))
}

/// Crosshair attacks whose closest ray hit lies beyond the reach limit.
pub struct ReachA {
    metadata: DetectionMetadata,
}

impl ReachA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(10.0, 2.0, 4.0),
        }
    }
}

impl Default for ReachA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for ReachA {
    fn id(&self) -> &'static str {
        "ReachA"
    }

    fn kind(&self) -> &'static str {
        "Reach"
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
        if !is_input(packet) {
            return;
        }
        let Some(attack) = player.combat.last_report.as_ref() else {
            return;
        };
        if attack.touch || attack.result.occluded {
            return;
        }
        let Some(distance) = attack.result.min_raycast() else {
            return;
        };
        if distance > player.config.combat.max_reach + REACH_EPSILON {
            report.fail(format!("distance={:.4}", distance));
        } else {
            self.metadata.pass(0.01);
        }
    }
}

/// Touch attacks whose closest point on the victim lies beyond the reach limit.
pub struct ReachB {
    metadata: DetectionMetadata,
}

impl ReachB {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(10.0, 2.0, 4.0),
        }
    }
}

impl Default for ReachB {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for ReachB {
    fn id(&self) -> &'static str {
        "ReachB"
    }

    fn kind(&self) -> &'static str {
        "Reach"
    }

    fn subtype(&self) -> &'static str {
        "B"
    }

    fn metadata(&self) -> &DetectionMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut DetectionMetadata {
        &mut self.metadata
    }

    fn post_client_packet(&mut self, packet: &Packet, player: &Player, report: &mut Report) {
        if !is_input(packet) {
            return;
        }
        let Some(attack) = player.combat.last_report.as_ref() else {
            return;
        };
        if !attack.touch {
            return;
        }
        let Some(distance) = attack.result.min_raw() else {
            return;
        };
        if distance > player.config.combat.max_reach + REACH_EPSILON {
            report.fail(format!("raw={:.4}", distance));
        } else {
            self.metadata.pass(0.01);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::post;
    use super::*;
    use crate::combat::CombatResult;
    use crate::player::test_support::player;
    use crate::player::AttackReport;
    use shared::{PlayerAuthInput, Vec3};

    fn report(touch: bool, ray: Vec<f32>, raw: Vec<f32>) -> AttackReport {
        AttackReport {
            target: 5,
            client_tick: 1,
            touch,
            mispredicted: false,
            result: CombatResult {
                hit_valid: false,
                raycast_distances: ray,
                raw_distances: raw,
                occluded: false,
            },
        }
    }

    fn input() -> Packet {
        Packet::PlayerAuthInput(PlayerAuthInput::idle(1, Vec3::ZERO))
    }

    #[test]
    fn test_long_ray_flags() {
        let mut player = player();
        player.combat.last_report = Some(report(false, vec![3.4, 3.2], vec![3.1]));
        let mut detection = ReachA::new();
        assert!(post(&mut detection, &input(), &player).failed());
    }

    #[test]
    fn test_ray_within_reach_passes() {
        let mut player = player();
        player.combat.last_report = Some(report(false, vec![2.9], vec![2.8]));
        let mut detection = ReachA::new();
        assert!(!post(&mut detection, &input(), &player).failed());
    }

    #[test]
    fn test_no_attack_no_check() {
        let player = player();
        let mut detection = ReachA::new();
        assert!(!post(&mut detection, &input(), &player).failed());
    }

    #[test]
    fn test_touch_uses_raw_distance() {
        let mut player = player();
        player.combat.last_report = Some(report(true, vec![], vec![3.05]));
        assert!(!post(&mut ReachA::new(), &input(), &player).failed());
        assert!(post(&mut ReachB::new(), &input(), &player).failed());

        player.combat.last_report = Some(report(true, vec![], vec![2.5]));
        assert!(!post(&mut ReachB::new(), &input(), &player).failed());
    }
}
