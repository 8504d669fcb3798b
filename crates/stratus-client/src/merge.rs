//! Combines the controller sources into the single frame sent each tick.

use stratus_core::{Axis, Button, ControllerFrame};

/// Keep the reading with the larger magnitude. Ties go to `b`.
pub fn merge_axis(a: f32, b: f32) -> f32 {
    if a.abs() > b.abs() {
        a
    } else {
        b
    }
}

const ANALOG: [Button; 2] = [Button::LeftTrigger, Button::RightTrigger];

/// Merge up to three controller frames.
///
/// Digital buttons take the highest value of any source, so a press anywhere
/// is a press. Sticks and triggers merge `primary` against `secondary` by
/// magnitude, and that result against `adhoc`. The index comes from the
/// first source present.
pub fn merge_frames(
    primary: Option<&ControllerFrame>,
    secondary: Option<&ControllerFrame>,
    adhoc: Option<&ControllerFrame>,
) -> ControllerFrame {
    let sources = [primary, secondary, adhoc];
    let index = sources
        .iter()
        .flatten()
        .map(|frame| frame.gamepad_index)
        .next()
        .unwrap_or(0);
    let mut merged = ControllerFrame::with_index(index);

    for button in Button::DIGITAL {
        let value = sources
            .iter()
            .flatten()
            .map(|frame| frame.button(button))
            .fold(0.0_f32, f32::max);
        merged.set_button(button, value);
    }

    let read = |frame: Option<&ControllerFrame>, control: Control| {
        frame.map(|f| control.read(f)).unwrap_or(0.0)
    };
    let controls = Axis::ALL
        .into_iter()
        .map(Control::Axis)
        .chain(ANALOG.into_iter().map(Control::Analog));
    for control in controls {
        let pair = merge_axis(read(primary, control), read(secondary, control));
        let value = merge_axis(pair, read(adhoc, control));
        control.write(&mut merged, value);
    }

    merged
}

#[derive(Clone, Copy)]
enum Control {
    Axis(Axis),
    Analog(Button),
}

impl Control {
    fn read(self, frame: &ControllerFrame) -> f32 {
        match self {
            Control::Axis(axis) => frame.axis(axis),
            Control::Analog(button) => frame.button(button),
        }
    }

    fn write(self, frame: &mut ControllerFrame, value: f32) {
        match self {
            Control::Axis(axis) => frame.set_axis(axis, value),
            Control::Analog(button) => frame.set_button(button, value),
        }
    }
}
