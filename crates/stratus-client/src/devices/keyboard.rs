//! Keyboard-as-controller source.
//!
//! Key codes follow the DOM `KeyboardEvent.code` naming (`KeyW`, `ArrowUp`,
//! `Space`). Bindings map a code to a button, or to one direction of a stick
//! axis written as `<Axis>+` / `<Axis>-`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use stratus_common::{Error, Result};
use stratus_core::{Axis, Button, ControllerFrame};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyBinding {
    Button(Button),
    Axis(Axis, f32),
}

impl FromStr for KeyBinding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let axis_direction = s
            .strip_suffix('+')
            .map(|label| (label, 1.0))
            .or_else(|| s.strip_suffix('-').map(|label| (label, -1.0)));
        if let Some((label, direction)) = axis_direction {
            let axis = label
                .parse::<Axis>()
                .map_err(|err| Error::config(format!("keyboard binding: {err}")))?;
            return Ok(KeyBinding::Axis(axis, direction));
        }
        s.parse::<Button>()
            .map(KeyBinding::Button)
            .map_err(|err| Error::config(format!("keyboard binding: {err}")))
    }
}

fn default_bindings() -> HashMap<String, KeyBinding> {
    use KeyBinding::{Axis as Stick, Button as Btn};
    [
        ("KeyW", Stick(Axis::LeftThumbYAxis, -1.0)),
        ("KeyS", Stick(Axis::LeftThumbYAxis, 1.0)),
        ("KeyA", Stick(Axis::LeftThumbXAxis, -1.0)),
        ("KeyD", Stick(Axis::LeftThumbXAxis, 1.0)),
        ("KeyI", Stick(Axis::RightThumbYAxis, -1.0)),
        ("KeyK", Stick(Axis::RightThumbYAxis, 1.0)),
        ("KeyJ", Stick(Axis::RightThumbXAxis, -1.0)),
        ("KeyL", Stick(Axis::RightThumbXAxis, 1.0)),
        ("ArrowUp", Btn(Button::DPadUp)),
        ("ArrowDown", Btn(Button::DPadDown)),
        ("ArrowLeft", Btn(Button::DPadLeft)),
        ("ArrowRight", Btn(Button::DPadRight)),
        ("Enter", Btn(Button::A)),
        ("Space", Btn(Button::A)),
        ("Backspace", Btn(Button::B)),
        ("Escape", Btn(Button::B)),
        ("KeyX", Btn(Button::X)),
        ("KeyY", Btn(Button::Y)),
        ("KeyQ", Btn(Button::LeftShoulder)),
        ("KeyE", Btn(Button::RightShoulder)),
        ("KeyZ", Btn(Button::LeftTrigger)),
        ("KeyC", Btn(Button::RightTrigger)),
        ("KeyF", Btn(Button::LeftThumb)),
        ("KeyG", Btn(Button::RightThumb)),
        ("Tab", Btn(Button::View)),
        ("KeyM", Btn(Button::Menu)),
        ("Home", Btn(Button::Nexus)),
    ]
    .into_iter()
    .map(|(code, binding)| (code.to_string(), binding))
    .collect()
}

#[derive(Debug, Clone)]
pub struct KeyboardController {
    bindings: HashMap<String, KeyBinding>,
    held: BTreeSet<String>,
}

impl Default for KeyboardController {
    fn default() -> Self {
        Self {
            bindings: default_bindings(),
            held: BTreeSet::new(),
        }
    }
}

impl KeyboardController {
    /// Overrides are layered on top of the default bindings.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut controller = Self::default();
        for (code, binding) in overrides {
            controller
                .bindings
                .insert(code.clone(), binding.parse::<KeyBinding>()?);
        }
        Ok(controller)
    }

    pub fn binding(&self, code: &str) -> Option<KeyBinding> {
        self.bindings.get(code).copied()
    }

    /// Track a key transition. Returns whether the key is bound.
    pub fn on_key(&mut self, code: &str, pressed: bool) -> bool {
        if !self.bindings.contains_key(code) {
            return false;
        }
        if pressed {
            self.held.insert(code.to_string());
        } else {
            self.held.remove(code);
        }
        true
    }

    pub fn release_all(&mut self) {
        self.held.clear();
    }

    /// Current state as controller 0. Opposing stick keys cancel out.
    pub fn request_state(&self) -> ControllerFrame {
        let mut frame = ControllerFrame::with_index(0);
        for code in &self.held {
            match self.bindings.get(code) {
                Some(KeyBinding::Button(button)) => frame.set_button(*button, 1.0),
                Some(KeyBinding::Axis(axis, direction)) => {
                    let value = (frame.axis(*axis) + direction).clamp(-1.0, 1.0);
                    frame.set_axis(*axis, value);
                }
                None => {}
            }
        }
        frame
    }
}
