//! Controller state sources and the platform seam they read from.

pub mod gamepad;
pub mod keyboard;
pub mod pointer;
pub mod virtual_pad;

pub use gamepad::{GamepadMapper, GamepadMapping, NEXUS_OVERRIDE_KEY};
pub use keyboard::{KeyBinding, KeyboardController};
pub use pointer::{PointerAction, PointerInput, PointerKind, PointerRouter};
pub use virtual_pad::VirtualController;

use anyhow::Result;
use stratus_core::RumbleData;

/// One physical controller as reported by the platform, before mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGamepad {
    pub index: u8,
    pub connected: bool,
    /// Button values in the platform's standard order.
    pub buttons: Vec<f32>,
    /// Stick axes, Y positive down.
    pub axes: Vec<f32>,
}

/// Force feedback capabilities of a connected controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorCaps {
    pub dual_rumble: bool,
    pub trigger_rumble: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    DualRumble,
    TriggerRumble,
}

/// Platform gamepad access: state snapshots and actuators.
pub trait GamepadProvider {
    /// Slot-indexed snapshot. `None` marks an empty slot.
    fn gamepads(&mut self) -> Vec<Option<RawGamepad>>;

    /// `None` when the slot is empty or the controller has no actuator.
    fn actuator(&self, index: u8) -> Option<ActuatorCaps>;

    fn play_effect(&mut self, index: u8, kind: EffectKind, data: &RumbleData) -> Result<()>;
}

/// Provider with no controllers attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGamepads;

impl GamepadProvider for NoGamepads {
    fn gamepads(&mut self) -> Vec<Option<RawGamepad>> {
        Vec::new()
    }

    fn actuator(&self, _index: u8) -> Option<ActuatorCaps> {
        None
    }

    fn play_effect(&mut self, index: u8, _kind: EffectKind, _data: &RumbleData) -> Result<()> {
        anyhow::bail!("no gamepad in slot {index}")
    }
}

impl<P: GamepadProvider + ?Sized> GamepadProvider for Box<P> {
    fn gamepads(&mut self) -> Vec<Option<RawGamepad>> {
        (**self).gamepads()
    }

    fn actuator(&self, index: u8) -> Option<ActuatorCaps> {
        (**self).actuator(index)
    }

    fn play_effect(&mut self, index: u8, kind: EffectKind, data: &RumbleData) -> Result<()> {
        (**self).play_effect(index, kind, data)
    }
}

/// Connected-slot flags for the first `slots` entries of a snapshot.
pub fn presence(provider: &mut dyn GamepadProvider, slots: usize) -> Vec<bool> {
    let snapshot = provider.gamepads();
    (0..slots)
        .map(|i| {
            snapshot
                .get(i)
                .and_then(|slot| slot.as_ref())
                .map(|pad| pad.connected)
                .unwrap_or(false)
        })
        .collect()
}
