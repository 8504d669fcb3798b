//! Input engine configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// How the outbound packetizer behaves each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketizerMode {
    /// All five queues; metadata, controller or pointer activity triggers a send.
    #[default]
    Primary,
    /// Controller queue only, for the on-screen controller channel.
    Simplified,
}

impl PacketizerMode {
    pub fn default_tick_ms(self) -> u64 {
        match self {
            PacketizerMode::Primary => 4,
            PacketizerMode::Simplified => 16,
        }
    }
}

/// Where decoded vibration commands are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VibrationMode {
    /// Forward to the embedding host shell as `deviceVibration`.
    Device,
    /// Forward to the embedding host shell as `nativeVibration`.
    #[default]
    Native,
    /// Drive the local controller's dual-motor actuator.
    Local,
}

/// Trigger rumble played locally whenever a merged trigger is pulled hard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceTriggerRumble {
    #[default]
    Off,
    All,
    Left,
    Right,
}

/// Per-drain caps. A drain takes at most `limit - 1` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    pub metadata: usize,
    pub controller: usize,
    pub pointer: usize,
    pub mouse: usize,
    pub keyboard: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            metadata: 30,
            controller: 30,
            pointer: 2,
            mouse: 30,
            keyboard: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub mode: PacketizerMode,
    /// Packetizer period. Falls back to the mode's default when unset.
    pub tick_interval_ms: Option<u64>,
    pub legacy_keyboard: bool,
    pub touch: bool,
    pub mouse_keyboard: bool,
    pub physical_polling: bool,
    pub polling_rate_hz: u32,
    pub deadzone: f32,
    /// Percentage in `[0, 100]`.
    pub edge_compensation: f32,
    pub batch: BatchLimits,
    pub vibration: bool,
    pub rumble_enabled: bool,
    pub vibration_mode: VibrationMode,
    pub force_trigger_rumble: ForceTriggerRumble,
    /// Control label to raw button index overrides.
    pub gamepad_mapping: Option<BTreeMap<String, usize>>,
    /// Key label to control overrides, e.g. `"KeyW": "LeftThumbYAxis-"`.
    pub keyboard_bindings: Option<BTreeMap<String, String>>,
    pub max_touchpoints: u8,
    pub hotplug_interval_ms: u64,
    pub surface_width: u32,
    pub surface_height: u32,
    pub mouse_scale: i32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: PacketizerMode::Primary,
            tick_interval_ms: None,
            legacy_keyboard: true,
            touch: false,
            mouse_keyboard: false,
            physical_polling: true,
            polling_rate_hz: 250,
            deadzone: 0.2,
            edge_compensation: 0.0,
            batch: BatchLimits::default(),
            vibration: true,
            rumble_enabled: true,
            vibration_mode: VibrationMode::Native,
            force_trigger_rumble: ForceTriggerRumble::Off,
            gamepad_mapping: None,
            keyboard_bindings: None,
            max_touchpoints: 2,
            hotplug_interval_ms: 500,
            surface_width: 1920,
            surface_height: 1080,
            mouse_scale: 10,
        }
    }
}

impl InputConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&raw)?;
        debug!("loaded input config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
            .unwrap_or_else(|| self.mode.default_tick_ms())
    }

    /// Physical poll period derived from the polling rate.
    pub fn poll_interval_ms(&self) -> u64 {
        (1000 / self.polling_rate_hz.max(1) as u64).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.deadzone) {
            return Err(Error::config(format!(
                "deadzone must be in [0, 1), got {}",
                self.deadzone
            )));
        }
        if !(0.0..=100.0).contains(&self.edge_compensation) {
            return Err(Error::config(format!(
                "edge_compensation must be a percentage in [0, 100], got {}",
                self.edge_compensation
            )));
        }
        if self.tick_interval_ms() == 0 {
            return Err(Error::config("tick_interval_ms must be non-zero"));
        }
        if self.polling_rate_hz == 0 {
            return Err(Error::config("polling_rate_hz must be non-zero"));
        }
        if self.hotplug_interval_ms == 0 {
            return Err(Error::config("hotplug_interval_ms must be non-zero"));
        }
        if self.surface_width == 0 || self.surface_height == 0 {
            return Err(Error::config("surface dimensions must be non-zero"));
        }
        let batch = &self.batch;
        if [
            batch.metadata,
            batch.controller,
            batch.pointer,
            batch.mouse,
            batch.keyboard,
        ]
        .contains(&0)
        {
            return Err(Error::config("batch limits must be non-zero"));
        }
        Ok(())
    }
}
