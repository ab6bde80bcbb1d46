//! Block-break timing.

use crate::component::effects::{HASTE, MINING_FATIGUE};
use crate::component::Effects;
use crate::world::block::{Block, ToolKind};
use shared::{BlockPos, ItemStack};

/// Accrued progress at which a break may complete.
pub const BREAK_COMPLETE: f32 = 0.999;
const HARVEST_DIVISOR: f32 = 30.0;
const WRONG_TOOL_DIVISOR: f32 = 100.0;
const AIRBORNE_PENALTY: f32 = 5.0;
/// Floor of the haste divisor, reached at amplifier 4.
const MIN_HASTE_DIVISOR: f32 = 0.2;

/// Tool kind and base mining speed of an item.
pub fn held_tool(item: &ItemStack) -> (ToolKind, f32) {
    if item.is_empty() {
        return (ToolKind::None, 1.0);
    }
    let name = item.name.trim_start_matches("minecraft:");
    if name == "shears" {
        return (ToolKind::Shears, 5.0);
    }
    let kind = match name.rsplit('_').next() {
        Some("pickaxe") => ToolKind::Pickaxe,
        Some("axe") => ToolKind::Axe,
        Some("shovel") => ToolKind::Shovel,
        Some("hoe") => ToolKind::Hoe,
        Some("sword") => ToolKind::Sword,
        _ => return (ToolKind::None, 1.0),
    };
    let speed = match name.split('_').next() {
        Some("wooden") => 2.0,
        Some("stone") => 4.0,
        Some("iron") => 6.0,
        Some("diamond") => 8.0,
        Some("netherite") => 9.0,
        Some("golden") => 12.0,
        _ => 1.0,
    };
    let speed = if kind == ToolKind::Sword { 1.5 } else { speed };
    (kind, speed)
}

/// Ticks the client needs to break `block` with `held`, before rounding.
///
/// Unbreakable blocks take forever; blocks with no hardness break instantly.
pub fn expected_break_ticks(block: &Block, held: &ItemStack, effects: &Effects, on_ground: bool) -> f32 {
    if block.hardness < 0.0 {
        return f32::INFINITY;
    }
    if block.hardness == 0.0 {
        return 0.0;
    }

    let (tool, mut speed) = held_tool(held);
    let correct_tool = tool != ToolKind::None && tool == block.tool;
    if !correct_tool {
        speed = 1.0;
    }
    if block.is_cobweb() && tool == ToolKind::Sword {
        speed = 15.0;
    }

    let divisor = if block.requires_tool && !correct_tool {
        WRONG_TOOL_DIVISOR
    } else {
        HARVEST_DIVISOR
    };
    let mut ticks = (block.hardness * divisor / speed - 1e-4).ceil();

    if let Some(haste) = effects.get(HASTE) {
        ticks /= (1.0 - 0.2 * haste.amplifier as f32).max(MIN_HASTE_DIVISOR);
    }
    if let Some(fatigue) = effects.get(MINING_FATIGUE) {
        ticks *= 1.0 + 0.3 * fatigue.amplifier as f32;
    }
    if !on_ground {
        ticks *= AIRBORNE_PENALTY;
    }
    ticks
}

/// A break in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakProgress {
    pub position: BlockPos,
    pub progress: f32,
    pub ticks: u32,
    instant: bool,
}

impl BreakProgress {
    /// Starts a break; an expectation of at most one tick completes immediately.
    pub fn start(position: BlockPos, expected_ticks: f32) -> Self {
        Self {
            position,
            progress: 0.0,
            ticks: 0,
            instant: expected_ticks <= 1.0,
        }
    }

    /// Adds one tick of progress under the current conditions.
    pub fn accrue(&mut self, expected_ticks: f32) {
        self.ticks += 1;
        if expected_ticks <= 0.0 {
            self.progress = 1.0;
        } else if expected_ticks.is_finite() {
            self.progress += 1.0 / expected_ticks;
        }
    }

    pub fn can_destroy(&self) -> bool {
        self.instant || self.progress >= BREAK_COMPLETE
    }
}
