//! TOML configuration for the proxy.
//!
//! Every section is optional; a missing key falls back to its default so an
//! empty file is a valid configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_FLAG_MESSAGE: &str =
    "{player} flagged {detection_type} ({detection_subtype}) x{violations}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub proxy: ProxyConfig,
    pub combat: CombatConfig,
    pub movement: MovementConfig,
    pub network: NetworkConfig,
    pub detections: HashMap<String, DetectionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub listen: String,
    pub upstream: String,
    pub max_sessions: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:19133".to_string(),
            upstream: "127.0.0.1:19132".to_string(),
            max_sessions: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub max_reach: f32,
    pub allow_non_mobile_touch: bool,
    pub left_cps_limit: u32,
    pub right_cps_limit: u32,
    /// Judge attacks against the client-visible tracker instead of rewinding the server one.
    pub ack_dependent: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_reach: 2.9,
            allow_non_mobile_touch: false,
            left_cps_limit: 20,
            right_cps_limit: 20,
            ack_dependent: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub correction_threshold: f32,
    pub simulation_enabled: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            correction_threshold: 0.3,
            simulation_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub rate_limit_normal: u32,
    pub rate_limit_spammed: u32,
    pub nsl_timeout_ticks: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rate_limit_normal: 200,
            rate_limit_spammed: 1000,
            nsl_timeout_ticks: 1200,
        }
    }
}

/// Per-detector overrides, keyed by the detector id (for example `ReachA`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub flag_message: Option<String>,
    pub max_violations: Option<f32>,
    pub disabled: bool,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn detection(&self, id: &str) -> Option<&DetectionConfig> {
        self.detections.get(id)
    }

    pub fn flag_message(&self, id: &str) -> &str {
        self.detection(id)
            .and_then(|d| d.flag_message.as_deref())
            .unwrap_or(DEFAULT_FLAG_MESSAGE)
    }
}

/// Fills the `{player}`, `{detection_type}`, `{detection_subtype}` and `{violations}` placeholders.
pub fn render_flag_message(
    template: &str,
    player: &str,
    detection_type: &str,
    detection_subtype: &str,
    violations: f32,
) -> String {
    template
        .replace("{player}", player)
        .replace("{detection_type}", detection_type)
        .replace("{detection_subtype}", detection_subtype)
        .replace("{violations}", &format!("{}", violations.floor() as i64))
}
