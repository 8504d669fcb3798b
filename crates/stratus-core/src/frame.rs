//! Canonical per-tick frame model shared by every input source.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every labelled control a controller source can report.
///
/// Triggers are listed here because physical devices expose them in the
/// button array; on the wire they travel as analog values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Nexus,
    Menu,
    View,
    A,
    B,
    X,
    Y,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    LeftShoulder,
    RightShoulder,
    LeftThumb,
    RightThumb,
    LeftTrigger,
    RightTrigger,
}

impl Button {
    /// Digital buttons, in wire bit order.
    pub const DIGITAL: [Button; 15] = [
        Button::Nexus,
        Button::Menu,
        Button::View,
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::DPadUp,
        Button::DPadDown,
        Button::DPadLeft,
        Button::DPadRight,
        Button::LeftShoulder,
        Button::RightShoulder,
        Button::LeftThumb,
        Button::RightThumb,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Button::Nexus => "Nexus",
            Button::Menu => "Menu",
            Button::View => "View",
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
            Button::DPadUp => "DPadUp",
            Button::DPadDown => "DPadDown",
            Button::DPadLeft => "DPadLeft",
            Button::DPadRight => "DPadRight",
            Button::LeftShoulder => "LeftShoulder",
            Button::RightShoulder => "RightShoulder",
            Button::LeftThumb => "LeftThumb",
            Button::RightThumb => "RightThumb",
            Button::LeftTrigger => "LeftTrigger",
            Button::RightTrigger => "RightTrigger",
        }
    }

    /// Bit in the gamepad section's button mask. Triggers have none.
    pub fn wire_bit(self) -> Option<u16> {
        let bit = match self {
            Button::Nexus => 1 << 1,
            Button::Menu => 1 << 2,
            Button::View => 1 << 3,
            Button::A => 1 << 4,
            Button::B => 1 << 5,
            Button::X => 1 << 6,
            Button::Y => 1 << 7,
            Button::DPadUp => 1 << 8,
            Button::DPadDown => 1 << 9,
            Button::DPadLeft => 1 << 10,
            Button::DPadRight => 1 << 11,
            Button::LeftShoulder => 1 << 12,
            Button::RightShoulder => 1 << 13,
            Button::LeftThumb => 1 << 14,
            Button::RightThumb => 1 << 15,
            Button::LeftTrigger | Button::RightTrigger => return None,
        };
        Some(bit)
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown control label `{0}`")]
pub struct UnknownLabel(pub String);

impl FromStr for Button {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Button::DIGITAL
            .iter()
            .chain([Button::LeftTrigger, Button::RightTrigger].iter())
            .copied()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Thumbstick axes. Values are in `[-1, 1]`, Y positive is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    LeftThumbXAxis,
    LeftThumbYAxis,
    RightThumbXAxis,
    RightThumbYAxis,
}

impl Axis {
    pub const ALL: [Axis; 4] = [
        Axis::LeftThumbXAxis,
        Axis::LeftThumbYAxis,
        Axis::RightThumbXAxis,
        Axis::RightThumbYAxis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::LeftThumbXAxis => "LeftThumbXAxis",
            Axis::LeftThumbYAxis => "LeftThumbYAxis",
            Axis::RightThumbXAxis => "RightThumbXAxis",
            Axis::RightThumbYAxis => "RightThumbYAxis",
        }
    }
}

impl FromStr for Axis {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Axis::ALL
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// One logical controller's instantaneous state.
///
/// Every field is always present; sources that do not drive a control leave
/// it at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControllerFrame {
    pub gamepad_index: u8,

    pub nexus: f32,
    pub menu: f32,
    pub view: f32,
    pub a: f32,
    pub b: f32,
    pub x: f32,
    pub y: f32,
    pub d_pad_up: f32,
    pub d_pad_down: f32,
    pub d_pad_left: f32,
    pub d_pad_right: f32,
    pub left_shoulder: f32,
    pub right_shoulder: f32,
    pub left_thumb: f32,
    pub right_thumb: f32,

    pub left_thumb_x_axis: f32,
    pub left_thumb_y_axis: f32,
    pub right_thumb_x_axis: f32,
    pub right_thumb_y_axis: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl ControllerFrame {
    pub fn with_index(gamepad_index: u8) -> Self {
        Self {
            gamepad_index,
            ..Self::default()
        }
    }

    pub fn button(&self, button: Button) -> f32 {
        match button {
            Button::Nexus => self.nexus,
            Button::Menu => self.menu,
            Button::View => self.view,
            Button::A => self.a,
            Button::B => self.b,
            Button::X => self.x,
            Button::Y => self.y,
            Button::DPadUp => self.d_pad_up,
            Button::DPadDown => self.d_pad_down,
            Button::DPadLeft => self.d_pad_left,
            Button::DPadRight => self.d_pad_right,
            Button::LeftShoulder => self.left_shoulder,
            Button::RightShoulder => self.right_shoulder,
            Button::LeftThumb => self.left_thumb,
            Button::RightThumb => self.right_thumb,
            Button::LeftTrigger => self.left_trigger,
            Button::RightTrigger => self.right_trigger,
        }
    }

    pub fn button_mut(&mut self, button: Button) -> &mut f32 {
        match button {
            Button::Nexus => &mut self.nexus,
            Button::Menu => &mut self.menu,
            Button::View => &mut self.view,
            Button::A => &mut self.a,
            Button::B => &mut self.b,
            Button::X => &mut self.x,
            Button::Y => &mut self.y,
            Button::DPadUp => &mut self.d_pad_up,
            Button::DPadDown => &mut self.d_pad_down,
            Button::DPadLeft => &mut self.d_pad_left,
            Button::DPadRight => &mut self.d_pad_right,
            Button::LeftShoulder => &mut self.left_shoulder,
            Button::RightShoulder => &mut self.right_shoulder,
            Button::LeftThumb => &mut self.left_thumb,
            Button::RightThumb => &mut self.right_thumb,
            Button::LeftTrigger => &mut self.left_trigger,
            Button::RightTrigger => &mut self.right_trigger,
        }
    }

    pub fn set_button(&mut self, button: Button, value: f32) {
        *self.button_mut(button) = value;
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::LeftThumbXAxis => self.left_thumb_x_axis,
            Axis::LeftThumbYAxis => self.left_thumb_y_axis,
            Axis::RightThumbXAxis => self.right_thumb_x_axis,
            Axis::RightThumbYAxis => self.right_thumb_y_axis,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut f32 {
        match axis {
            Axis::LeftThumbXAxis => &mut self.left_thumb_x_axis,
            Axis::LeftThumbYAxis => &mut self.left_thumb_y_axis,
            Axis::RightThumbXAxis => &mut self.right_thumb_x_axis,
            Axis::RightThumbYAxis => &mut self.right_thumb_y_axis,
        }
    }

    pub fn set_axis(&mut self, axis: Axis, value: f32) {
        *self.axis_mut(axis) = value;
    }

    /// Wire button mask. A button counts as pressed when its value is above zero.
    pub fn button_mask(&self) -> u16 {
        Button::DIGITAL
            .iter()
            .filter(|b| self.button(**b) > 0.0)
            .filter_map(|b| b.wire_bit())
            .fold(0, |mask, bit| mask | bit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TouchPhase {
    Down = 1,
    Move = 2,
    Up = 3,
    Cancel = 4,
}

/// One pointer sub-event, already projected onto the remote surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchSample {
    pub phase: TouchPhase,
    pub pointer_id: u32,
    /// Absolute position in `0..=65535` on both axes.
    pub x: u16,
    pub y: u16,
    /// Contact pressure in `0..=255`.
    pub pressure: u8,
    pub width: u8,
    pub height: u8,
}

/// Ordered pointer sub-events for one pointer within a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerFrame {
    pub events: Vec<TouchSample>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseMode {
    #[default]
    Relative = 0,
    Absolute = 1,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseFrame {
    pub x: i32,
    pub y: i32,
    pub wheel_x: i32,
    pub wheel_y: i32,
    pub buttons: u8,
    pub mode: MouseMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardFrame {
    pub pressed: bool,
    pub key_code: u16,
    pub key: String,
}

/// Client-side frame timing, keyed by a server-supplied correlation key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetadata {
    pub server_data_key: u32,
    pub first_frame_packet_arrival_time_ms: u32,
    pub frame_submitted_time_ms: u32,
    pub frame_decoded_time_ms: u32,
    pub frame_rendered_time_ms: u32,
    pub frame_packet_time: u32,
    pub frame_date_now: u32,
}
