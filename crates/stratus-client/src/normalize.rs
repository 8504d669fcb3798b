use stratus_common::{Error, Result};

/// Magnitude above which edge compensation kicks in.
pub const EDGE_THRESHOLD: f32 = 0.8;

/// Deadzone-clamp and edge-compensate a raw stick reading.
///
/// `edge_compensation` is a percentage in `[0, 100]`. Callers must reject a
/// deadzone of 1 or more before calling; see [`AxisNormalizer::new`].
pub fn normalize_axis(raw: f32, deadzone: f32, edge_compensation: f32) -> f32 {
    if !raw.is_finite() || raw.abs() < deadzone {
        return 0.0;
    }
    let mut value = (raw - raw.signum() * deadzone) / (1.0 - deadzone);
    if value.abs() > EDGE_THRESHOLD {
        value += value.signum() * (edge_compensation / 100.0);
    }
    value.clamp(-1.0, 1.0)
}

/// Validated deadzone and edge compensation pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisNormalizer {
    deadzone: f32,
    edge_compensation: f32,
}

impl AxisNormalizer {
    pub fn new(deadzone: f32, edge_compensation: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&deadzone) {
            return Err(Error::config(format!(
                "deadzone must be in [0, 1), got {deadzone}"
            )));
        }
        if !(0.0..=100.0).contains(&edge_compensation) {
            return Err(Error::config(format!(
                "edge compensation must be in [0, 100], got {edge_compensation}"
            )));
        }
        Ok(Self {
            deadzone,
            edge_compensation,
        })
    }

    pub fn apply(&self, raw: f32) -> f32 {
        normalize_axis(raw, self.deadzone, self.edge_compensation)
    }

    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }
}

impl Default for AxisNormalizer {
    fn default() -> Self {
        Self {
            deadzone: 0.2,
            edge_compensation: 0.0,
        }
    }
}
