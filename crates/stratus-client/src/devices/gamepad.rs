//! Physical controller source: raw button/axis arrays to controller frames.

use std::collections::BTreeMap;

use stratus_common::{Error, InputConfig, Result};
use stratus_core::{Axis, Button, ControllerFrame, MAX_GAMEPADS};

use super::GamepadProvider;
use crate::normalize::AxisNormalizer;

/// Key code that forces Nexus on the first physical controller while held.
pub const NEXUS_OVERRIDE_KEY: &str = "KeyN";

/// Standard-layout button indices.
const DEFAULT_BUTTONS: [(Button, usize); 17] = [
    (Button::A, 0),
    (Button::B, 1),
    (Button::X, 2),
    (Button::Y, 3),
    (Button::LeftShoulder, 4),
    (Button::RightShoulder, 5),
    (Button::LeftTrigger, 6),
    (Button::RightTrigger, 7),
    (Button::View, 8),
    (Button::Menu, 9),
    (Button::LeftThumb, 10),
    (Button::RightThumb, 11),
    (Button::DPadUp, 12),
    (Button::DPadDown, 13),
    (Button::DPadLeft, 14),
    (Button::DPadRight, 15),
    (Button::Nexus, 16),
];

const AXES: [(Axis, usize); 4] = [
    (Axis::LeftThumbXAxis, 0),
    (Axis::LeftThumbYAxis, 1),
    (Axis::RightThumbXAxis, 2),
    (Axis::RightThumbYAxis, 3),
];

/// Control label to raw button index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadMapping {
    buttons: Vec<(Button, usize)>,
}

impl Default for GamepadMapping {
    fn default() -> Self {
        Self {
            buttons: DEFAULT_BUTTONS.to_vec(),
        }
    }
}

impl GamepadMapping {
    /// A custom table replaces the default one entirely.
    pub fn from_labels(labels: &BTreeMap<String, usize>) -> Result<Self> {
        let buttons = labels
            .iter()
            .map(|(label, index)| {
                label
                    .parse::<Button>()
                    .map(|button| (button, *index))
                    .map_err(|err| Error::config(format!("gamepad mapping: {err}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { buttons })
    }

    pub fn index_of(&self, button: Button) -> Option<usize> {
        self.buttons
            .iter()
            .find(|(b, _)| *b == button)
            .map(|(_, index)| *index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GamepadMapper {
    mapping: GamepadMapping,
    normalizer: AxisNormalizer,
    nexus_override: bool,
}

impl GamepadMapper {
    pub fn new(mapping: GamepadMapping, normalizer: AxisNormalizer) -> Self {
        Self {
            mapping,
            normalizer,
            nexus_override: false,
        }
    }

    pub fn from_config(config: &InputConfig) -> Result<Self> {
        let mapping = match &config.gamepad_mapping {
            Some(labels) => GamepadMapping::from_labels(labels)?,
            None => GamepadMapping::default(),
        };
        let normalizer = AxisNormalizer::new(config.deadzone, config.edge_compensation)?;
        Ok(Self::new(mapping, normalizer))
    }

    pub fn set_nexus_override(&mut self, held: bool) {
        self.nexus_override = held;
    }

    pub fn nexus_override(&self) -> bool {
        self.nexus_override
    }

    /// Map raw arrays to a frame. Out-of-range indices read as zero, and
    /// holding View and Menu together becomes a single Nexus press.
    pub fn map_state(&self, buttons: &[f32], axes: &[f32]) -> ControllerFrame {
        let mut frame = ControllerFrame::default();
        for &(button, index) in &self.mapping.buttons {
            frame.set_button(button, buttons.get(index).copied().unwrap_or(0.0));
        }
        for (axis, index) in AXES {
            let raw = axes.get(index).copied().unwrap_or(0.0);
            frame.set_axis(axis, self.normalizer.apply(raw));
        }
        if frame.view > 0.0 && frame.menu > 0.0 {
            frame.view = 0.0;
            frame.menu = 0.0;
            frame.nexus = 1.0;
        }
        frame
    }

    /// Frames for every connected controller in an addressable slot, in
    /// slot order.
    pub fn request_states(&self, provider: &mut dyn GamepadProvider) -> Vec<ControllerFrame> {
        provider
            .gamepads()
            .into_iter()
            .take(MAX_GAMEPADS)
            .flatten()
            .filter(|pad| pad.connected)
            .map(|pad| {
                let mut frame = self.map_state(&pad.buttons, &pad.axes);
                frame.gamepad_index = pad.index;
                frame
            })
            .collect()
    }

    /// Force Nexus on the first sampled controller while the override key
    /// is held. Only the physical poll loop applies this.
    pub fn apply_nexus_override(&self, frames: &mut [ControllerFrame]) {
        if !self.nexus_override {
            return;
        }
        if let Some(first) = frames.first_mut() {
            first.nexus = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::testing::FakeGamepads;

    fn pressed(indices: &[usize]) -> Vec<f32> {
        let mut buttons = vec![0.0; 17];
        for i in indices {
            buttons[*i] = 1.0;
        }
        buttons
    }

    #[test]
    fn default_mapping_reads_standard_layout() {
        let mapper = GamepadMapper::default();
        let frame = mapper.map_state(&pressed(&[0, 12]), &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(frame.a, 1.0);
        assert_eq!(frame.d_pad_up, 1.0);
        assert_eq!(frame.b, 0.0);
        assert_eq!(frame.left_thumb_y_axis, 1.0);
    }

    #[test]
    fn view_and_menu_chord_becomes_nexus() {
        let mapper = GamepadMapper::default();
        let frame = mapper.map_state(&pressed(&[8, 9]), &[]);
        assert_eq!(frame.nexus, 1.0);
        assert_eq!(frame.view, 0.0);
        assert_eq!(frame.menu, 0.0);

        let frame = mapper.map_state(&pressed(&[8]), &[]);
        assert_eq!(frame.view, 1.0);
        assert_eq!(frame.nexus, 0.0);
    }

    #[test]
    fn short_arrays_read_as_zero() {
        let mapper = GamepadMapper::default();
        let frame = mapper.map_state(&[1.0], &[0.9]);
        assert_eq!(frame.a, 1.0);
        assert_eq!(frame.nexus, 0.0);
        assert_eq!(frame.right_trigger, 0.0);
        assert_eq!(frame.left_thumb_y_axis, 0.0);
        assert!(frame.left_thumb_x_axis > 0.8);
    }

    #[test]
    fn axes_pass_through_the_deadzone() {
        let mapper = GamepadMapper::default();
        let frame = mapper.map_state(&[], &[0.1, -0.6, 0.0, 0.0]);
        assert_eq!(frame.left_thumb_x_axis, 0.0);
        assert!((frame.left_thumb_y_axis + 0.5).abs() < 1e-6);
    }

    #[test]
    fn triggers_keep_their_analog_value() {
        let mapper = GamepadMapper::default();
        let mut buttons = vec![0.0; 17];
        buttons[6] = 0.35;
        let frame = mapper.map_state(&buttons, &[]);
        assert_eq!(frame.left_trigger, 0.35);
    }

    #[test]
    fn custom_mapping_replaces_the_default() {
        let labels = BTreeMap::from([("A".to_string(), 3), ("b".to_string(), 0)]);
        let mapping = GamepadMapping::from_labels(&labels).unwrap();
        assert_eq!(mapping.index_of(Button::A), Some(3));
        assert_eq!(mapping.index_of(Button::B), Some(0));
        assert_eq!(mapping.index_of(Button::X), None);

        let mapper = GamepadMapper::new(mapping, AxisNormalizer::default());
        let frame = mapper.map_state(&pressed(&[3]), &[]);
        assert_eq!(frame.a, 1.0);
        assert_eq!(frame.y, 0.0);
    }

    #[test]
    fn unknown_mapping_label_is_a_config_error() {
        let labels = BTreeMap::from([("Turbo".to_string(), 1)]);
        assert!(matches!(
            GamepadMapping::from_labels(&labels),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn request_states_skips_empty_slots_and_keeps_indices() {
        let mut fake = FakeGamepads::with_pad(1, pressed(&[1]), vec![]);
        fake.set_pad(3, pressed(&[0]), vec![]);
        let mapper = GamepadMapper::default();

        let frames = mapper.request_states(&mut fake);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].gamepad_index, 1);
        assert_eq!(frames[0].b, 1.0);
        assert_eq!(frames[1].gamepad_index, 3);
        assert_eq!(frames[1].a, 1.0);
    }

    #[test]
    fn nexus_override_marks_first_controller() {
        let mut fake = FakeGamepads::with_pad(0, pressed(&[]), vec![]);
        fake.set_pad(1, pressed(&[]), vec![]);
        let mut mapper = GamepadMapper::default();
        mapper.set_nexus_override(true);

        let mut frames = mapper.request_states(&mut fake);
        assert_eq!(frames[0].nexus, 0.0);
        mapper.apply_nexus_override(&mut frames);
        assert_eq!(frames[0].nexus, 1.0);
        assert_eq!(frames[1].nexus, 0.0);

        mapper.set_nexus_override(false);
        let mut frames = mapper.request_states(&mut fake);
        mapper.apply_nexus_override(&mut frames);
        assert_eq!(frames[0].nexus, 0.0);
    }

    #[test]
    fn from_config_validates_deadzone() {
        let config = InputConfig {
            deadzone: 1.5,
            ..Default::default()
        };
        assert!(GamepadMapper::from_config(&config).is_err());
        assert!(GamepadMapper::from_config(&InputConfig::default()).is_ok());
    }
}
