use std::collections::VecDeque;

use super::{Detection, DetectionMetadata, Report};
use crate::player::Player;
use shared::{InputFlags, Packet, TransactionData, UseItemAction, UseItemOnEntityAction};

/// Clicks are counted over one second of client ticks.
const WINDOW_TICKS: u64 = 20;

/// Clicks per second above the configured limits.
pub struct AutoClickerA {
    metadata: DetectionMetadata,
    left: VecDeque<u64>,
    right: VecDeque<u64>,
}

impl AutoClickerA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(15.0, 1.0, 2.0),
            left: VecDeque::with_capacity(64),
            right: VecDeque::with_capacity(64),
        }
    }

    fn prune(clicks: &mut VecDeque<u64>, tick: u64) {
        while clicks.front().is_some_and(|&t| t + WINDOW_TICKS <= tick) {
            clicks.pop_front();
        }
    }

    fn left_cps(&self) -> usize {
        self.left.len()
    }

    fn right_cps(&self) -> usize {
        self.right.len()
    }
}

impl Default for AutoClickerA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for AutoClickerA {
    fn id(&self) -> &'static str {
        "AutoClickerA"
    }

    fn kind(&self) -> &'static str {
        "AutoClicker"
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
        let tick = player.client_tick;
        match packet {
            Packet::InventoryTransaction { data, .. } => match data {
                TransactionData::UseItemOnEntity(data) if data.action == UseItemOnEntityAction::Attack => {
                    self.left.push_back(tick);
                }
                TransactionData::UseItem(data)
                    if matches!(data.action, UseItemAction::ClickBlock | UseItemAction::ClickAir) =>
                {
                    self.right.push_back(tick);
                }
                _ => return,
            },
            Packet::PlayerAuthInput(input) => {
                if input.input_data.has(InputFlags::MISSED_SWING) {
                    self.left.push_back(input.tick);
                }
                Self::prune(&mut self.left, input.tick);
                Self::prune(&mut self.right, input.tick);
                return;
            }
            _ => return,
        }

        Self::prune(&mut self.left, tick);
        Self::prune(&mut self.right, tick);
        let combat = &player.config.combat;
        if self.left_cps() > combat.left_cps_limit as usize {
            report.fail(format!("left_cps={}", self.left_cps()));
        } else if self.right_cps() > combat.right_cps_limit as usize {
            report.fail(format!("right_cps={}", self.right_cps()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client;
    use super::*;
    use crate::player::test_support::player;
    use shared::{ItemStack, UseItemOnEntityData, Vec3};

    fn attack() -> Packet {
        Packet::InventoryTransaction {
            request_id: 0,
            data: TransactionData::UseItemOnEntity(UseItemOnEntityData {
                target_runtime_id: 5,
                action: UseItemOnEntityAction::Attack,
                hotbar_slot: 0,
                held_item: ItemStack::empty(),
                position: Vec3::ZERO,
                click_position: Vec3::ZERO,
            }),
        }
    }

    #[test]
    fn test_clicks_within_limit() {
        let mut player = player();
        let mut detection = AutoClickerA::new();
        for tick in 0..40 {
            player.client_tick = tick;
            // ten clicks per second
            if tick % 2 == 0 {
                assert!(!client(&mut detection, &attack(), &player).failed());
            }
        }
    }

    #[test]
    fn test_click_burst_fails() {
        let mut player = player();
        player.client_tick = 100;
        let mut detection = AutoClickerA::new();
        let mut failed = false;
        for _ in 0..25 {
            failed |= client(&mut detection, &attack(), &player).failed();
        }
        assert!(failed);
        assert_eq!(detection.left_cps(), 25);
    }

    #[test]
    fn test_old_clicks_expire() {
        let mut player = player();
        let mut detection = AutoClickerA::new();
        player.client_tick = 10;
        for _ in 0..15 {
            client(&mut detection, &attack(), &player);
        }
        player.client_tick = 30;
        client(&mut detection, &attack(), &player);
        assert_eq!(detection.left_cps(), 1);
    }
}
