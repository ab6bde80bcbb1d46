//! Per-session flood protection.

use std::time::{Duration, Instant};

/// Undecodable client frames tolerated per window.
pub const DECODE_ERROR_BUDGET: u32 = 20;
pub const DECODE_ERROR_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Drop,
    /// Returned once, for the first packet past the spam limit.
    Disconnect,
}

/// Counts client packets within one server tick.
#[derive(Debug)]
pub struct RateLimiter {
    normal: u32,
    spammed: u32,
    count: u32,
    disconnected: bool,
}

impl RateLimiter {
    pub fn new(normal: u32, spammed: u32) -> Self {
        Self {
            normal,
            spammed: spammed.max(normal),
            count: 0,
            disconnected: false,
        }
    }

    pub fn record(&mut self) -> RateDecision {
        self.count = self.count.saturating_add(1);
        if self.disconnected {
            return RateDecision::Drop;
        }
        if self.count > self.spammed {
            self.disconnected = true;
            RateDecision::Disconnect
        } else if self.count > self.normal {
            RateDecision::Drop
        } else {
            RateDecision::Allow
        }
    }

    /// Starts a new tick.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Sliding count of decode failures, with a one-per-window log gate.
#[derive(Debug)]
pub struct DecodeBudget {
    window_start: Instant,
    errors: u32,
    last_log: Option<Instant>,
}

impl DecodeBudget {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            errors: 0,
            last_log: None,
        }
    }

    /// Records a failure. Returns false once the budget is exhausted.
    pub fn record(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= DECODE_ERROR_WINDOW {
            self.window_start = now;
            self.errors = 0;
        }
        self.errors += 1;
        self.errors <= DECODE_ERROR_BUDGET
    }

    pub fn should_log(&mut self, now: Instant) -> bool {
        match self.last_log {
            Some(last) if now.duration_since(last) < DECODE_ERROR_WINDOW => false,
            _ => {
                self.last_log = Some(now);
                true
            }
        }
    }
}
