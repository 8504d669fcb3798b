//! Inbound report decoding.
//!
//! Vibration layout:
//! `[ReportType (1B)][Reserved (1B)][RumbleType (1B)][GamepadIndex (1B)][Reserved (1B)]`
//! `[LeftMotor %][RightMotor %][LeftTrigger %][RightTrigger %]`
//! `[Duration (2B LE)][Delay ms (2B LE)][Repeat (1B)]`

use bytes::Buf;
use serde::Serialize;

use crate::ReportType;

pub const VIBRATION_REPORT_SIZE: usize = 14;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("report too short: {0} bytes")]
    TooShort(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RumbleType {
    FourMotor,
    Other(u8),
}

impl From<u8> for RumbleType {
    fn from(value: u8) -> Self {
        match value {
            0 => RumbleType::FourMotor,
            other => RumbleType::Other(other),
        }
    }
}

/// Decoded vibration command, motor intensities scaled to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RumbleCommand {
    pub rumble_type: RumbleType,
    pub gamepad_index: u8,
    pub left_motor: f32,
    pub right_motor: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
    /// Duration exactly as carried on the wire.
    pub duration_raw: u16,
    pub delay_ms: u16,
    pub repeat: u8,
}

impl RumbleCommand {
    /// Effect parameters in actuator terms. The wire duration is in tenths
    /// of a millisecond.
    pub fn rumble_data(&self) -> RumbleData {
        RumbleData {
            start_delay: 0.0,
            duration: self.duration_raw as f32 / 10.0,
            weak_magnitude: self.right_motor,
            strong_magnitude: self.left_motor,
            left_trigger: self.left_trigger,
            right_trigger: self.right_trigger,
        }
    }

    /// Spacing between repeated replays.
    pub fn repeat_interval_ms(&self) -> u64 {
        self.delay_ms as u64 + self.duration_raw as u64
    }
}

/// Effect parameters handed to an actuator or serialized for a host bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RumbleData {
    pub start_delay: f32,
    pub duration: f32,
    pub weak_magnitude: f32,
    pub strong_magnitude: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

/// A decoded inbound report. Tags other than vibration are kept so callers
/// can log them, and are otherwise ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InboundReport {
    Vibration(RumbleCommand),
    Ignored { report_type: u8 },
}

pub fn decode_inbound(bytes: &[u8]) -> Result<InboundReport, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::TooShort(0));
    }
    let report_type = bytes[0];
    if report_type as u16 != ReportType::VIBRATION.bits() {
        return Ok(InboundReport::Ignored { report_type });
    }
    if bytes.len() < VIBRATION_REPORT_SIZE {
        return Err(DecodeError::TooShort(bytes.len()));
    }

    let mut buf = &bytes[2..VIBRATION_REPORT_SIZE];
    let rumble_type = RumbleType::from(buf.get_u8());
    let gamepad_index = buf.get_u8();
    buf.advance(1);
    let left_motor = percent(buf.get_u8());
    let right_motor = percent(buf.get_u8());
    let left_trigger = percent(buf.get_u8());
    let right_trigger = percent(buf.get_u8());
    let duration_raw = buf.get_u16_le();
    let delay_ms = buf.get_u16_le();
    let repeat = buf.get_u8();

    Ok(InboundReport::Vibration(RumbleCommand {
        rumble_type,
        gamepad_index,
        left_motor,
        right_motor,
        left_trigger,
        right_trigger,
        duration_raw,
        delay_ms,
        repeat,
    }))
}

fn percent(value: u8) -> f32 {
    value as f32 / 100.0
}
