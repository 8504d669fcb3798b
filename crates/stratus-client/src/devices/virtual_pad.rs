//! On-screen controller source. Every mutation yields the full updated
//! frame, which the channel enqueues immediately.

use stratus_core::{Button, ControllerFrame, MAX_GAMEPADS};

#[derive(Debug, Clone)]
pub struct VirtualController {
    shadow: [ControllerFrame; MAX_GAMEPADS],
    pressing: bool,
}

impl Default for VirtualController {
    fn default() -> Self {
        Self {
            shadow: std::array::from_fn(|i| ControllerFrame::with_index(i as u8)),
            pressing: false,
        }
    }
}

impl VirtualController {
    /// True between a press start and its matching end.
    pub fn is_pressing(&self) -> bool {
        self.pressing
    }

    pub fn state(&self, index: u8) -> Option<&ControllerFrame> {
        self.shadow.get(index as usize)
    }

    pub fn press_start(&mut self, index: u8, button: Button) -> Option<ControllerFrame> {
        let frame = self.shadow.get_mut(index as usize)?;
        frame.set_button(button, 1.0);
        self.pressing = true;
        Some(*frame)
    }

    pub fn press_end(&mut self, index: u8, button: Button) -> Option<ControllerFrame> {
        let frame = self.shadow.get_mut(index as usize)?;
        frame.set_button(button, 0.0);
        self.pressing = false;
        Some(*frame)
    }

    /// Screen-space stick input: `y` grows upward, so it is inverted.
    pub fn move_left_stick(&mut self, index: u8, x: f32, y: f32) -> Option<ControllerFrame> {
        let frame = self.shadow.get_mut(index as usize)?;
        frame.left_thumb_x_axis = x.clamp(-1.0, 1.0);
        frame.left_thumb_y_axis = (-y).clamp(-1.0, 1.0);
        Some(*frame)
    }

    pub fn move_right_stick(&mut self, index: u8, x: f32, y: f32) -> Option<ControllerFrame> {
        let frame = self.shadow.get_mut(index as usize)?;
        frame.right_thumb_x_axis = x.clamp(-1.0, 1.0);
        frame.right_thumb_y_axis = (-y).clamp(-1.0, 1.0);
        Some(*frame)
    }
}
