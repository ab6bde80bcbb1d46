use std::collections::HashMap;

pub const SPEED: i32 = 1;
pub const SLOWNESS: i32 = 2;
pub const HASTE: i32 = 3;
pub const MINING_FATIGUE: i32 = 4;
pub const JUMP_BOOST: i32 = 8;
pub const LEVITATION: i32 = 24;
pub const SLOW_FALLING: i32 = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    /// Zero-based, as sent on the wire.
    pub amplifier: i32,
    /// Negative durations never expire.
    pub remaining_ticks: i32,
}

impl Effect {
    /// One-based effect level.
    pub fn level(&self) -> i32 {
        self.amplifier + 1
    }
}

/// Mirror of the effects the client believes it has.
#[derive(Debug, Clone, Default)]
pub struct Effects {
    active: HashMap<i32, Effect>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: i32, amplifier: i32, duration: i32) {
        self.active.insert(
            id,
            Effect {
                amplifier,
                remaining_ticks: duration,
            },
        );
    }

    pub fn remove(&mut self, id: i32) -> Option<Effect> {
        self.active.remove(&id)
    }

    pub fn get(&self, id: i32) -> Option<&Effect> {
        self.active.get(&id)
    }

    /// Level of an effect, zero when it is not active.
    pub fn level(&self, id: i32) -> i32 {
        self.get(id).map_or(0, Effect::level)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn tick(&mut self) {
        self.active.retain(|_, effect| {
            if effect.remaining_ticks < 0 {
                return true;
            }
            effect.remaining_ticks -= 1;
            effect.remaining_ticks > 0
        });
    }
}
