use super::{Detection, DetectionMetadata, Report};
use crate::player::Player;
use shared::Packet;

/// Inputs the client may run ahead of the server clock.
const MAX_BALANCE: i64 = 5;
/// Lag compensation the client may bank while stalled.
const MIN_BALANCE: i64 = -20;

/// Clients sending inputs faster than the server ticks.
pub struct TimerA {
    metadata: DetectionMetadata,
    balance: i64,
}

impl TimerA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(10.0, 3.0, 6.0),
            balance: 0,
        }
    }
}

impl Default for TimerA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for TimerA {
    fn id(&self) -> &'static str {
        "TimerA"
    }

    fn kind(&self) -> &'static str {
        "Timer"
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
        if !matches!(packet, Packet::PlayerAuthInput(_)) {
            return;
        }
        self.balance += 1;
        if self.balance > MAX_BALANCE {
            report.fail(format!("balance={}", self.balance));
            self.balance = 0;
        }
    }

    fn on_tick(&mut self, _player: &Player, _report: &mut Report) {
        self.balance = (self.balance - 1).max(MIN_BALANCE);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client;
    use super::*;
    use crate::player::test_support::player;
    use shared::{PlayerAuthInput, Vec3};

    fn input() -> Packet {
        Packet::PlayerAuthInput(PlayerAuthInput::idle(1, Vec3::ZERO))
    }

    #[test]
    fn test_matching_rate_passes() {
        let player = player();
        let mut detection = TimerA::new();
        for _ in 0..200 {
            assert!(!client(&mut detection, &input(), &player).failed());
            detection.on_tick(&player, &mut Report::default());
        }
    }

    #[test]
    fn test_double_rate_fails() {
        let player = player();
        let mut detection = TimerA::new();
        let mut failures = 0;
        for _ in 0..40 {
            for _ in 0..2 {
                if client(&mut detection, &input(), &player).failed() {
                    failures += 1;
                }
            }
            detection.on_tick(&player, &mut Report::default());
        }
        assert!(failures >= 5);
    }

    #[test]
    fn test_catch_up_after_stall() {
        let player = player();
        let mut detection = TimerA::new();
        for _ in 0..60 {
            detection.on_tick(&player, &mut Report::default());
        }
        assert_eq!(detection.balance, MIN_BALANCE);
        for _ in 0..25 {
            assert!(!client(&mut detection, &input(), &player).failed());
        }
    }
}
