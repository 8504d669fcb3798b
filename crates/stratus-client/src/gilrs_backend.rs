//! Physical gamepads through gilrs.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Repeat, Replay, Ticks};
use gilrs::{Axis, Button, GamepadId, Gilrs};
use stratus_core::{RumbleData, MAX_GAMEPADS};
use tracing::debug;

use crate::devices::{ActuatorCaps, EffectKind, GamepadProvider, RawGamepad};

/// Standard-layout button order as read by the mapper.
const BUTTON_ORDER: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

pub struct GilrsDevices {
    gilrs: Gilrs,
    effects: HashMap<u8, Effect>,
}

impl GilrsDevices {
    pub fn new() -> Result<Self> {
        let gilrs = Gilrs::new().map_err(|e| anyhow!("gilrs init failed: {e}"))?;
        Ok(Self {
            gilrs,
            effects: HashMap::new(),
        })
    }

    fn id_for(&self, index: u8) -> Option<GamepadId> {
        self.gilrs
            .gamepads()
            .find(|(id, gamepad)| usize::from(*id) == index as usize && gamepad.is_connected())
            .map(|(id, _)| id)
    }
}

impl GamepadProvider for GilrsDevices {
    fn gamepads(&mut self) -> Vec<Option<RawGamepad>> {
        // Pump pending events so cached state is current.
        while self.gilrs.next_event().is_some() {}

        let mut slots = vec![None; MAX_GAMEPADS];
        for (id, gamepad) in self.gilrs.gamepads() {
            let slot = usize::from(id);
            if slot >= MAX_GAMEPADS || !gamepad.is_connected() {
                continue;
            }
            let buttons = BUTTON_ORDER
                .iter()
                .map(|b| gamepad.button_data(*b).map(|d| d.value()).unwrap_or(0.0))
                .collect();
            // gilrs reports up as positive Y; the standard layout is down-positive.
            let axes = vec![
                gamepad.value(Axis::LeftStickX),
                -gamepad.value(Axis::LeftStickY),
                gamepad.value(Axis::RightStickX),
                -gamepad.value(Axis::RightStickY),
            ];
            slots[slot] = Some(RawGamepad {
                index: slot as u8,
                connected: true,
                buttons,
                axes,
            });
        }
        slots
    }

    fn actuator(&self, index: u8) -> Option<ActuatorCaps> {
        let id = self.id_for(index)?;
        self.gilrs.gamepad(id).is_ff_supported().then_some(ActuatorCaps {
            dual_rumble: true,
            trigger_rumble: false,
        })
    }

    fn play_effect(&mut self, index: u8, kind: EffectKind, data: &RumbleData) -> Result<()> {
        if kind == EffectKind::TriggerRumble {
            bail!("trigger rumble is not supported by gilrs");
        }
        let Some(id) = self.id_for(index) else {
            bail!("no gamepad in slot {index}");
        };

        let play_for = Ticks::from_ms(data.duration.max(0.0).round() as u32);
        let scheduling = Replay {
            play_for,
            ..Default::default()
        };
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong {
                    magnitude: magnitude(data.strong_magnitude),
                },
                scheduling,
                ..Default::default()
            })
            .add_effect(BaseEffect {
                kind: BaseEffectType::Weak {
                    magnitude: magnitude(data.weak_magnitude),
                },
                scheduling,
                ..Default::default()
            })
            .repeat(Repeat::For(play_for))
            .gamepads(&[id])
            .finish(&mut self.gilrs)
            .map_err(|e| anyhow!("building effect for slot {index}: {e}"))?;
        effect
            .play()
            .map_err(|e| anyhow!("playing effect on slot {index}: {e}"))?;
        debug!("slot {index} rumble for {:.1} ms", data.duration);

        // Replacing the previous effect drops and stops it.
        self.effects.insert(index, effect);
        Ok(())
    }
}

fn magnitude(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16
}
