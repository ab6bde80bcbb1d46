use super::{Detection, DetectionMetadata, Report};
use crate::player::Player;
use shared::{Face, Packet, TransactionData, UseItemAction, UseItemData};

const CLICK_TOLERANCE: f32 = 1e-3;

/// Placements whose click vector could not have come from looking at the block.
pub struct ScaffoldA {
    metadata: DetectionMetadata,
}

impl ScaffoldA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(10.0, 1.0, 2.0),
        }
    }

    fn check(&mut self, data: &UseItemData, report: &mut Report) {
        if data.action != UseItemAction::ClickBlock || data.held_item.block_runtime_id == 0 {
            return;
        }
        if Face::from_index(data.face).is_none() {
            report.fail(format!("face={}", data.face));
            return;
        }
        let click = data.click_position;
        let in_block = |v: f32| v.is_finite() && (-CLICK_TOLERANCE..=1.0 + CLICK_TOLERANCE).contains(&v);
        if !(in_block(click.x) && in_block(click.y) && in_block(click.z)) {
            report.fail(format!("click={:?}", click));
        }
    }
}

impl Default for ScaffoldA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for ScaffoldA {
    fn id(&self) -> &'static str {
        "ScaffoldA"
    }

    fn kind(&self) -> &'static str {
        "Scaffold"
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

    fn on_client_packet(&mut self, packet: &Packet, _player: &Player, report: &mut Report) {
        match packet {
            Packet::InventoryTransaction {
                data: TransactionData::UseItem(data),
                ..
            } => self.check(data, report),
            Packet::PlayerAuthInput(input) => {
                if let Some(data) = input.item_interaction.as_ref() {
                    self.check(data, report);
                }
            }
            _ => {}
        }
    }
}
