//! Collaborator seams: the data channel, the control channel and the
//! embedding host shell.

use anyhow::Result;
use bytes::Bytes;
use serde::Serialize;
use stratus_core::RumbleData;

/// Ordered, message-oriented binary channel carrying input packets.
pub trait InputTransport: Send {
    fn send(&mut self, payload: Bytes) -> Result<()>;
}

/// Lifecycle and inbound traffic of the data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(Bytes),
    Closed,
    Error(String),
}

/// Sibling channel carrying controller hot-plug notifications.
pub trait ControlChannel: Send {
    fn is_open(&self) -> bool;
    fn send_gamepad_added(&mut self, index: u8) -> Result<()>;
    fn send_gamepad_removed(&mut self, index: u8) -> Result<()>;
}

/// Message sink of an embedding host shell.
pub trait HostBridge: Send {
    fn post(&mut self, envelope: &BridgeEnvelope) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgeMessageType {
    DeviceVibration,
    NativeVibration,
    AudioVibration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VibrationMessage {
    pub rumble_data: RumbleData,
    pub repeat: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BridgeEnvelope {
    #[serde(rename = "type")]
    pub kind: BridgeMessageType,
    pub message: VibrationMessage,
}

impl BridgeEnvelope {
    pub fn vibration(kind: BridgeMessageType, rumble_data: RumbleData, repeat: u8) -> Self {
        Self {
            kind,
            message: VibrationMessage {
                rumble_data,
                repeat,
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Hot-plug notification as carried on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamepadChanged {
    pub message: &'static str,
    pub gamepad_index: u8,
    pub was_added: bool,
}

impl GamepadChanged {
    pub fn new(gamepad_index: u8, was_added: bool) -> Self {
        Self {
            message: "gamepadChanged",
            gamepad_index,
            was_added,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
