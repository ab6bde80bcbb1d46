use super::{Detection, DetectionMetadata, Report};
use crate::player::Player;
use shared::{Packet, TransactionData, UseItemOnEntityAction};

/// Client ticks an attack may trail the swing that caused it.
const SWING_WINDOW: u64 = 5;

/// Attacks sent without swinging the arm.
pub struct KillAuraA {
    metadata: DetectionMetadata,
}

impl KillAuraA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(5.0, 1.0, 1.0),
        }
    }
}

impl Default for KillAuraA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for KillAuraA {
    fn id(&self) -> &'static str {
        "KillAuraA"
    }

    fn kind(&self) -> &'static str {
        "KillAura"
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

    fn on_client_packet(&mut self, packet: &Packet, player: &Player, report: &mut Report) {
        let Packet::InventoryTransaction {
            data: TransactionData::UseItemOnEntity(data),
            ..
        } = packet
        else {
            return;
        };
        if data.action != UseItemOnEntityAction::Attack {
            return;
        }
        match player.last_swing_tick {
            Some(swing) if player.client_tick.saturating_sub(swing) <= SWING_WINDOW => {}
            Some(swing) => report.fail(format!("last_swing={} tick={}", swing, player.client_tick)),
            None => report.fail("never swung"),
        }
    }
}
