//! Cheat detections.
//!
//! Each detector is a small state machine that watches the packet stream of
//! one player. Detectors never mutate the player; they report a failure (and
//! optionally ask for the packet to be cancelled) through a [`Report`], and
//! the [`DetectionHost`] turns failures into violations and punishments.
//!
//! A failure first fills the detector's buffer. Only once the buffer reaches
//! `fail_buffer` does it count as a violation, weighted by how recently the
//! detector last flagged when a trust duration is set. A punishable detector
//! that reaches `max_violations` disconnects the player.

pub mod aim;
pub mod autoclicker;
pub mod badpacket;
pub mod edition;
pub mod killaura;
pub mod reach;
pub mod scaffold;
pub mod timer;
pub mod velocity;

use crate::config::{render_flag_message, Config};
use crate::player::Player;
use log::{debug, warn};
use shared::Packet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionMetadata {
    pub violations: f32,
    pub max_violations: f32,
    pub buffer: f32,
    pub fail_buffer: f32,
    pub max_buffer: f32,
    /// Ticks over which a flag's weight decays to zero; non-positive disables decay.
    pub trust_duration: i64,
    /// Server tick of the latest violation.
    pub last_flagged: u64,
}

impl DetectionMetadata {
    pub fn new(max_violations: f32, fail_buffer: f32, max_buffer: f32) -> Self {
        Self {
            violations: 0.0,
            max_violations,
            buffer: 0.0,
            fail_buffer,
            max_buffer,
            trust_duration: -1,
            last_flagged: 0,
        }
    }

    pub fn with_trust(mut self, ticks: i64) -> Self {
        self.trust_duration = ticks;
        self
    }

    /// Registers a failure at `tick`. Returns whether it became a violation.
    pub fn fail(&mut self, tick: u64) -> bool {
        self.buffer = (self.buffer + 1.0).min(self.max_buffer);
        if self.buffer < self.fail_buffer {
            return false;
        }
        if self.trust_duration > 0 {
            let trust = self.trust_duration as f32;
            let since = tick.saturating_sub(self.last_flagged) as f32;
            self.violations += (trust - since).max(0.0) / trust;
        } else {
            self.violations += 1.0;
        }
        self.last_flagged = tick;
        true
    }

    /// Drains the buffer after legitimate behaviour.
    pub fn pass(&mut self, amount: f32) {
        self.buffer = (self.buffer - amount).max(0.0);
    }

    pub fn exceeded(&self) -> bool {
        self.violations >= self.max_violations
    }
}

/// What a detector found in one callback.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Report {
    failure: Option<String>,
    cancel: bool,
}

impl Report {
    pub fn fail(&mut self, extra: impl Into<String>) {
        self.failure = Some(extra.into());
    }

    /// Drops the packet being inspected.
    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

pub trait Detection: Send {
    /// Type and subtype joined, used as the configuration key.
    fn id(&self) -> &'static str;
    fn kind(&self) -> &'static str;
    fn subtype(&self) -> &'static str;
    fn punishable(&self) -> bool {
        true
    }
    fn metadata(&self) -> &DetectionMetadata;
    fn metadata_mut(&mut self) -> &mut DetectionMetadata;

    /// Runs before the player handles a client packet.
    fn on_client_packet(&mut self, _packet: &Packet, _player: &Player, _report: &mut Report) {}
    /// Runs after the player handled a client packet.
    fn post_client_packet(&mut self, _packet: &Packet, _player: &Player, _report: &mut Report) {}
    fn on_server_packet(&mut self, _packet: &Packet, _player: &Player, _report: &mut Report) {}
    fn on_tick(&mut self, _player: &Player, _report: &mut Report) {}
}

/// Every detector, in evaluation order.
pub fn roster() -> Vec<Box<dyn Detection>> {
    vec![
        Box::new(reach::ReachA::new()),
        Box::new(reach::ReachB::new()),
        Box::new(aim::AimA::new()),
        Box::new(killaura::KillAuraA::new()),
        Box::new(autoclicker::AutoClickerA::new()),
        Box::new(timer::TimerA::new()),
        Box::new(velocity::VelocityA::new()),
        Box::new(edition::EditionFakerA::new()),
        Box::new(badpacket::BadPacketA::new()),
        Box::new(badpacket::BadPacketB::new()),
        Box::new(badpacket::BadPacketC::new()),
        Box::new(badpacket::BadPacketD::new()),
        Box::new(scaffold::ScaffoldA::new()),
    ]
}

/// Combined result of running every detector over one event.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Verdict {
    pub cancel: bool,
    /// Disconnect message when a punishable detector ran out of violations.
    pub punishment: Option<String>,
}

pub struct DetectionHost {
    detections: Vec<Box<dyn Detection>>,
    config: Arc<Config>,
}

impl DetectionHost {
    /// The full roster minus disabled detectors, with configured limits applied.
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_detections(config, roster())
    }

    pub fn with_detections(config: Arc<Config>, detections: Vec<Box<dyn Detection>>) -> Self {
        let detections = detections
            .into_iter()
            .filter(|d| !config.detection(d.id()).is_some_and(|c| c.disabled))
            .map(|mut d| {
                if let Some(max) = config.detection(d.id()).and_then(|c| c.max_violations) {
                    d.metadata_mut().max_violations = max;
                }
                d
            })
            .collect();
        Self { detections, config }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&dyn Detection> {
        self.detections
            .iter()
            .find(|d| d.id() == id)
            .map(|d| d.as_ref())
    }

    pub fn on_client_packet(&mut self, packet: &Packet, player: &Player) -> Verdict {
        self.dispatch(player, |d, report| d.on_client_packet(packet, player, report))
    }

    pub fn post_client_packet(&mut self, packet: &Packet, player: &Player) -> Verdict {
        self.dispatch(player, |d, report| d.post_client_packet(packet, player, report))
    }

    pub fn on_server_packet(&mut self, packet: &Packet, player: &Player) -> Verdict {
        self.dispatch(player, |d, report| d.on_server_packet(packet, player, report))
    }

    pub fn on_tick(&mut self, player: &Player) -> Verdict {
        self.dispatch(player, |d, report| d.on_tick(player, report))
    }

    fn dispatch<F>(&mut self, player: &Player, mut callback: F) -> Verdict
    where
        F: FnMut(&mut dyn Detection, &mut Report),
    {
        let mut verdict = Verdict::default();
        for detection in self.detections.iter_mut() {
            let mut report = Report::default();
            callback(detection.as_mut(), &mut report);
            verdict.cancel |= report.cancel;
            let Some(extra) = report.failure else {
                continue;
            };
            if let Some(message) = flag(detection.as_mut(), player, &self.config, &extra) {
                verdict.punishment.get_or_insert(message);
            }
        }
        verdict
    }
}

fn flag(detection: &mut dyn Detection, player: &Player, config: &Config, extra: &str) -> Option<String> {
    let (id, kind, subtype) = (detection.id(), detection.kind(), detection.subtype());
    let punishable = detection.punishable();
    let metadata = detection.metadata_mut();
    if !metadata.fail(player.server_tick) {
        debug!(
            "[{}] {} buffering ({:.1}/{:.1}) {}",
            player.name, id, metadata.buffer, metadata.fail_buffer, extra
        );
        return None;
    }
    warn!(
        "[{}] Flagged {} ({}) x{:.2} {}",
        player.name, kind, subtype, metadata.violations, extra
    );
    if !punishable || !metadata.exceeded() {
        return None;
    }
    Some(render_flag_message(
        config.flag_message(id),
        &player.name,
        kind,
        subtype,
        metadata.violations,
    ))
}
