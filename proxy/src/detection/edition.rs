use super::{Detection, DetectionMetadata, Report};
use crate::player::Player;
use shared::{DeviceOs, InputMode, Packet};

/// Clients lying about the platform they run on.
pub struct EditionFakerA {
    metadata: DetectionMetadata,
    checked: bool,
}

impl EditionFakerA {
    pub fn new() -> Self {
        Self {
            metadata: DetectionMetadata::new(1.0, 1.0, 1.0),
            checked: false,
        }
    }
}

impl Default for EditionFakerA {
    fn default() -> Self {
        Self::new()
    }
}

impl Detection for EditionFakerA {
    fn id(&self) -> &'static str {
        "EditionFakerA"
    }

    fn kind(&self) -> &'static str {
        "EditionFaker"
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
        let Packet::PlayerAuthInput(input) = packet else {
            return;
        };
        if self.checked {
            return;
        }
        self.checked = true;

        let os = player.identity.device_os;
        if os == DeviceOs::Unknown {
            report.fail("os=unknown");
        } else if input.input_mode == InputMode::Touch
            && !os.is_mobile()
            && !player.config.combat.allow_non_mobile_touch
        {
            report.fail(format!("os={:?} input=touch", os));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client;
    use super::*;
    use crate::player::test_support::player;
    use shared::{PlayerAuthInput, Vec3};

    fn input(mode: InputMode) -> Packet {
        let mut input = PlayerAuthInput::idle(1, Vec3::ZERO);
        input.input_mode = mode;
        Packet::PlayerAuthInput(input)
    }

    #[test]
    fn test_desktop_touch_fails_once() {
        let mut player = player();
        player.identity.device_os = DeviceOs::Win10;
        let mut detection = EditionFakerA::new();
        assert!(client(&mut detection, &input(InputMode::Touch), &player).failed());
        assert!(!client(&mut detection, &input(InputMode::Touch), &player).failed());
    }

    #[test]
    fn test_mobile_touch_passes() {
        let mut player = player();
        player.identity.device_os = DeviceOs::Android;
        assert!(!client(&mut EditionFakerA::new(), &input(InputMode::Touch), &player).failed());
    }

    #[test]
    fn test_unknown_os_fails() {
        let mut player = player();
        player.identity.device_os = DeviceOs::Unknown;
        assert!(client(&mut EditionFakerA::new(), &input(InputMode::Mouse), &player).failed());
    }
}
