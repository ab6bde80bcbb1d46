//! Packets no vanilla client produces.

use super::{Detection, DetectionMetadata, Report};
use crate::player::Player;
use shared::{BlockActionType, Packet, TransactionData, UseItemOnEntityAction};

macro_rules! detection_ids {
    ($subtype:literal) => {
        fn id(&self) -> &'static str {
            concat!("BadPacket", $subtype)
        }

        fn kind(&self) -> &'static str {
            "BadPacket"
        }

        fn subtype(&self) -> &'static str {
            $subtype
        }

        fn metadata(&self) -> &DetectionMetadata {
            &self.metadata
        }

        fn metadata_mut(&mut self) -> &mut DetectionMetadata {
            &mut self.metadata
        }
    };
}

/// Input ticks that skip or repeat.
pub struct BadPacketA {
    metadata: DetectionMetadata,
    last_tick: Option<u64>,
}

impl BadPacketA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(5.0, 1.0, 1.0),
            last_tick: None,
        }
    }
}

impl Default for BadPacketA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for BadPacketA {
    detection_ids!("A");

    fn on_client_packet(&mut self, packet: &Packet, _player: &Player, report: &mut Report) {
        let Packet::PlayerAuthInput(input) = packet else {
            return;
        };
        if let Some(last) = self.last_tick {
            if input.tick != last.wrapping_add(1) {
                report.fail(format!("last={} tick={}", last, input.tick));
            }
        }
        self.last_tick = Some(input.tick);
    }
}

/// Attacks aimed at the attacker itself.
pub struct BadPacketB {
    metadata: DetectionMetadata,
}

impl BadPacketB {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(1.0, 1.0, 1.0),
        }
    }
}

impl Default for BadPacketB {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for BadPacketB {
    detection_ids!("B");

    fn on_client_packet(&mut self, packet: &Packet, player: &Player, report: &mut Report) {
        let Packet::InventoryTransaction {
            data: TransactionData::UseItemOnEntity(data),
            ..
        } = packet
        else {
            return;
        };
        if data.action == UseItemOnEntityAction::Attack && data.target_runtime_id == player.remap.client_self() {
            report.fail("self attack");
            report.cancel();
        }
    }
}

/// Pitch outside the range a camera can face.
pub struct BadPacketC {
    metadata: DetectionMetadata,
}

impl BadPacketC {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(1.0, 1.0, 1.0),
        }
    }
}

impl Default for BadPacketC {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for BadPacketC {
    detection_ids!("C");

    fn on_client_packet(&mut self, packet: &Packet, _player: &Player, report: &mut Report) {
        let Packet::PlayerAuthInput(input) = packet else {
            return;
        };
        if !input.pitch.is_finite() || input.pitch.abs() > 90.0 {
            report.fail(format!("pitch={}", input.pitch));
        }
    }
}

/// Blocks destroyed without ever being mined.
pub struct BadPacketD {
    metadata: DetectionMetadata,
}

impl BadPacketD {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(5.0, 1.0, 1.0),
        }
    }
}

impl Default for BadPacketD {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for BadPacketD {
    detection_ids!("D");

    fn on_client_packet(&mut self, packet: &Packet, player: &Player, report: &mut Report) {
        let Packet::PlayerAuthInput(input) = packet else {
            return;
        };
        if !player.gamemode.is_validated() {
            return;
        }
        let mut mining = player.world_updater.breaking().is_some();
        for action in &input.block_actions {
            match action.action {
                BlockActionType::StartBreak | BlockActionType::ContinueBreak | BlockActionType::CrackBreak => {
                    mining = true;
                }
                BlockActionType::AbortBreak => mining = false,
                BlockActionType::PredictDestroyBlock if !mining => {
                    report.fail(format!("destroy at {:?}", action.position));
                    return;
                }
                _ => {}
            }
        }
    }
}
