//! Shadow copy of the client's inventory windows.
//!
//! Item stack requests are applied optimistically as soon as the client sends
//! them. Each request keeps an undo log so a rejection can be rolled back: the
//! proxy undoes every outstanding request from the newest down to the rejected
//! one, drops the rejected one and replays the rest.

use log::debug;
use shared::{ItemStack, StackRequest, StackRequestAction, StackResponse, StackSlot};
use std::collections::HashMap;

pub const WINDOW_INVENTORY: u32 = 0;
pub const WINDOW_OFFHAND: u32 = 119;
pub const WINDOW_ARMOUR: u32 = 120;
pub const WINDOW_UI: u32 = 124;

pub const INVENTORY_SIZE: usize = 36;
pub const ARMOUR_SLOTS: usize = 4;
pub const UI_SLOTS: usize = 51;

/// Upper bound on any window the server may describe.
pub const MAX_WINDOW_SLOTS: usize = 256;

/// Knockback resistance granted by each netherite armour piece.
pub const NETHERITE_KNOCKBACK_RESISTANCE: f32 = 0.1;

#[derive(Debug, Clone)]
struct PendingRequest {
    request: StackRequest,
    undo: Vec<(StackSlot, ItemStack)>,
}

#[derive(Debug, Clone)]
pub struct Inventory {
    windows: HashMap<u32, Vec<ItemStack>>,
    held_slot: u32,
    pending: Vec<PendingRequest>,
}

impl Inventory {
    pub fn new() -> Self {
        let mut windows = HashMap::new();
        windows.insert(WINDOW_INVENTORY, vec![ItemStack::empty(); INVENTORY_SIZE]);
        windows.insert(WINDOW_ARMOUR, vec![ItemStack::empty(); ARMOUR_SLOTS]);
        windows.insert(WINDOW_OFFHAND, vec![ItemStack::empty(); 1]);
        windows.insert(WINDOW_UI, vec![ItemStack::empty(); UI_SLOTS]);
        Self {
            windows,
            held_slot: 0,
            pending: Vec::new(),
        }
    }

    pub fn set_content(&mut self, window: u32, mut items: Vec<ItemStack>) {
        items.truncate(MAX_WINDOW_SLOTS);
        self.windows.insert(window, items);
    }

    /// Server-side slot update. Grows the window up to `MAX_WINDOW_SLOTS`.
    pub fn set_slot(&mut self, window: u32, slot: u32, item: ItemStack) -> bool {
        let slot = slot as usize;
        if slot >= MAX_WINDOW_SLOTS {
            return false;
        }
        let items = self.windows.entry(window).or_default();
        if items.len() <= slot {
            items.resize(slot + 1, ItemStack::empty());
        }
        items[slot] = item;
        true
    }

    pub fn window_len(&self, window: u32) -> usize {
        self.windows.get(&window).map_or(0, Vec::len)
    }

    fn has_slot(&self, slot: StackSlot) -> bool {
        (slot.slot as usize) < self.window_len(slot.window)
    }

    pub fn slot(&self, window: u32, slot: u32) -> ItemStack {
        self.windows
            .get(&window)
            .and_then(|items| items.get(slot as usize))
            .cloned()
            .unwrap_or_default()
    }

    pub fn held_slot(&self) -> u32 {
        self.held_slot
    }

    pub fn set_held_slot(&mut self, slot: u32) {
        self.held_slot = slot.min(8);
    }

    pub fn held_item(&self) -> ItemStack {
        self.slot(WINDOW_INVENTORY, self.held_slot)
    }

    pub fn armour(&self) -> Vec<ItemStack> {
        (0..ARMOUR_SLOTS as u32)
            .map(|slot| self.slot(WINDOW_ARMOUR, slot))
            .collect()
    }

    pub fn knockback_resistance(&self) -> f32 {
        self.armour()
            .iter()
            .filter(|item| !item.is_empty() && item.name.starts_with("minecraft:netherite_"))
            .count() as f32
            * NETHERITE_KNOCKBACK_RESISTANCE
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    fn write(&mut self, slot: StackSlot, item: ItemStack, undo: &mut Vec<(StackSlot, ItemStack)>) {
        undo.push((slot, self.slot(slot.window, slot.slot)));
        self.set_slot(slot.window, slot.slot, item);
    }

    fn move_items(
        &mut self,
        count: u16,
        source: StackSlot,
        destination: StackSlot,
        undo: &mut Vec<(StackSlot, ItemStack)>,
    ) {
        let mut from = self.slot(source.window, source.slot);
        let mut to = self.slot(destination.window, destination.slot);
        if from.is_empty() {
            return;
        }
        if !to.is_empty() && to.network_id != from.network_id {
            return;
        }
        let moved = count.min(from.count).min(u16::MAX - to.count);
        if to.is_empty() {
            to = from.clone();
            to.count = 0;
        }
        to.count += moved;
        from.count -= moved;
        if from.count == 0 {
            from = ItemStack::empty();
        }
        self.write(source, from, undo);
        self.write(destination, to, undo);
    }

    fn apply_action(&mut self, action: &StackRequestAction, undo: &mut Vec<(StackSlot, ItemStack)>) {
        match *action {
            StackRequestAction::Take {
                count,
                source,
                destination,
            }
            | StackRequestAction::Place {
                count,
                source,
                destination,
            } => self.move_items(count, source, destination, undo),
            StackRequestAction::Swap {
                source,
                destination,
            } => {
                let a = self.slot(source.window, source.slot);
                let b = self.slot(destination.window, destination.slot);
                self.write(source, b, undo);
                self.write(destination, a, undo);
            }
            StackRequestAction::Drop { count, source } | StackRequestAction::Destroy { count, source } => {
                let mut item = self.slot(source.window, source.slot);
                item.count = item.count.saturating_sub(count);
                if item.count == 0 {
                    item = ItemStack::empty();
                }
                self.write(source, item, undo);
            }
        }
    }

    fn apply(&mut self, request: &StackRequest) -> Vec<(StackSlot, ItemStack)> {
        let mut undo = Vec::new();
        for action in &request.actions {
            self.apply_action(action, &mut undo);
        }
        undo
    }

    fn rollback(&mut self, undo: &[(StackSlot, ItemStack)]) {
        for (slot, item) in undo.iter().rev() {
            self.set_slot(slot.window, slot.slot, item.clone());
        }
    }

    /// Applies a client request optimistically. Requests naming a slot
    /// outside a known window are not applied.
    pub fn request(&mut self, request: StackRequest) -> bool {
        let in_bounds = request.actions.iter().all(|action| match *action {
            StackRequestAction::Take {
                source,
                destination,
                ..
            }
            | StackRequestAction::Place {
                source,
                destination,
                ..
            }
            | StackRequestAction::Swap {
                source,
                destination,
            } => self.has_slot(source) && self.has_slot(destination),
            StackRequestAction::Drop { source, .. } | StackRequestAction::Destroy { source, .. } => {
                self.has_slot(source)
            }
        });
        if !in_bounds {
            debug!("Stack request {} names an unknown slot", request.request_id);
            return false;
        }
        let undo = self.apply(&request);
        self.pending.push(PendingRequest { request, undo });
        true
    }

    /// Settles outstanding requests with the server's verdicts.
    pub fn respond(&mut self, responses: &[StackResponse]) {
        for response in responses {
            let Some(index) = self
                .pending
                .iter()
                .position(|p| p.request.request_id == response.request_id)
            else {
                continue;
            };

            if response.success {
                self.pending.remove(index);
                continue;
            }

            let undos: Vec<Vec<(StackSlot, ItemStack)>> = self.pending[index..]
                .iter()
                .rev()
                .map(|p| p.undo.clone())
                .collect();
            for undo in &undos {
                self.rollback(undo);
            }
            let replay: Vec<StackRequest> = self
                .pending
                .drain(index..)
                .skip(1)
                .map(|p| p.request)
                .collect();
            for request in replay {
                self.request(request);
            }
        }
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}
