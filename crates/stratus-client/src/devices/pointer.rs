//! Pointer and raw keyboard routing.
//!
//! A click decides whether the pointer drives the remote mouse or touch
//! surface. Locked mouse movement becomes relative `MouseFrame`s, touch
//! contacts are buffered per pointer id until the next tick, and raw key
//! transitions are only captured while the mouse is locked.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use stratus_core::{KeyboardFrame, MouseFrame, MouseMode, PointerFrame, TouchPhase, TouchSample};

/// Delay before a raw key transition is queued a second time.
pub const KEY_DUPLICATE_DELAY: Duration = Duration::from_millis(16);

/// Aspect ratio of the remote surface.
const REMOTE_ASPECT: f32 = 1920.0 / 1080.0;
const SURFACE_MAX: f32 = 65535.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

/// A local pointer event. Positions are in local view pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub pointer_id: u32,
    pub kind: PointerKind,
    pub phase: TouchPhase,
    pub x: f32,
    pub y: f32,
    pub movement_x: f32,
    pub movement_y: f32,
    pub buttons: u8,
    /// Normalized contact pressure in `[0, 1]`.
    pub pressure: f32,
    pub width: f32,
    pub height: f32,
}

impl PointerInput {
    pub fn mouse(phase: TouchPhase, movement_x: f32, movement_y: f32, buttons: u8) -> Self {
        Self {
            pointer_id: 1,
            kind: PointerKind::Mouse,
            phase,
            x: 0.0,
            y: 0.0,
            movement_x,
            movement_y,
            buttons,
            pressure: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    pub fn touch(pointer_id: u32, phase: TouchPhase, x: f32, y: f32) -> Self {
        Self {
            pointer_id,
            kind: PointerKind::Touch,
            phase,
            x,
            y,
            movement_x: 0.0,
            movement_y: 0.0,
            buttons: 0,
            pressure: 0.5,
            width: 1.0,
            height: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// The host should lock the pointer to the view.
    RequestLock,
    Mouse(MouseFrame),
}

/// Project a local view position onto the 16:9 remote surface, removing
/// letterbox bars, and scale it to `0..=65535`.
pub fn to_surface(x: f32, y: f32, view_width: f32, view_height: f32) -> (u16, u16) {
    if view_width <= 0.0 || view_height <= 0.0 {
        return (0, 0);
    }
    let (mut x, mut y) = (x, y);
    let (mut width, mut height) = (view_width, view_height);
    if REMOTE_ASPECT > view_width / view_height {
        height = width / REMOTE_ASPECT;
        y -= (view_height - height) / 2.0;
    } else {
        width = height * REMOTE_ASPECT;
        x -= (view_width - width) / 2.0;
    }
    let scale = |value: f32, extent: f32| {
        (value * SURFACE_MAX / extent).round().clamp(0.0, SURFACE_MAX) as u16
    };
    (scale(x, width), scale(y, height))
}

fn to_byte(value: f32) -> u8 {
    value.round().clamp(0.0, u8::MAX as f32) as u8
}

#[derive(Debug)]
pub struct PointerRouter {
    mouse_keyboard: bool,
    mouse_scale: i32,
    view_width: f32,
    view_height: f32,

    mouse_active: bool,
    mouse_locked: bool,
    touch_active: bool,

    touches: BTreeMap<u32, Vec<TouchSample>>,
    keys_down: HashSet<u16>,
    pending_keys: VecDeque<(Instant, KeyboardFrame)>,
}

impl PointerRouter {
    pub fn new(mouse_keyboard: bool, mouse_scale: i32, view_width: u32, view_height: u32) -> Self {
        Self {
            mouse_keyboard,
            mouse_scale,
            view_width: view_width as f32,
            view_height: view_height as f32,
            mouse_active: false,
            mouse_locked: false,
            touch_active: false,
            touches: BTreeMap::new(),
            keys_down: HashSet::new(),
            pending_keys: VecDeque::new(),
        }
    }

    pub fn mouse_active(&self) -> bool {
        self.mouse_active
    }

    pub fn mouse_locked(&self) -> bool {
        self.mouse_locked
    }

    pub fn touch_active(&self) -> bool {
        self.touch_active
    }

    /// Lock state reported back by the host.
    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.mouse_locked = locked;
        if !locked {
            self.keys_down.clear();
        }
    }

    pub fn on_pointer_click(&mut self, input: &PointerInput) -> Option<PointerAction> {
        match input.kind {
            PointerKind::Touch => {
                self.mouse_active = false;
                self.touch_active = true;
            }
            PointerKind::Mouse => {
                self.mouse_active = true;
                self.touch_active = false;
            }
            PointerKind::Pen => {}
        }

        let action = if self.mouse_keyboard && self.mouse_active && !self.mouse_locked {
            Some(PointerAction::RequestLock)
        } else {
            self.locked_mouse_frame(input).map(PointerAction::Mouse)
        };
        self.buffer_touch(input);
        action
    }

    pub fn on_pointer_move(&mut self, input: &PointerInput) -> Option<MouseFrame> {
        let frame = self.locked_mouse_frame(input);
        self.buffer_touch(input);
        frame
    }

    /// Buffered touch contacts, one frame per pointer id, oldest id first.
    pub fn take_touch_frames(&mut self) -> Vec<PointerFrame> {
        std::mem::take(&mut self.touches)
            .into_values()
            .map(|events| PointerFrame { events })
            .collect()
    }

    /// Raw key transition. Returns the frame to queue now; a duplicate is
    /// held back for [`KEY_DUPLICATE_DELAY`].
    pub fn on_key(
        &mut self,
        now: Instant,
        pressed: bool,
        key_code: u16,
        key: &str,
    ) -> Option<KeyboardFrame> {
        if !(self.mouse_active && self.mouse_locked) {
            return None;
        }
        if pressed && !self.keys_down.insert(key_code) {
            return None;
        }
        if !pressed {
            self.keys_down.remove(&key_code);
        }
        let frame = KeyboardFrame {
            pressed,
            key_code,
            key: key.to_string(),
        };
        self.pending_keys
            .push_back((now + KEY_DUPLICATE_DELAY, frame.clone()));
        Some(frame)
    }

    /// Duplicates whose delay has elapsed, in the order they were scheduled.
    pub fn flush_due_keys(&mut self, now: Instant) -> Vec<KeyboardFrame> {
        let mut due = Vec::new();
        while let Some((at, _)) = self.pending_keys.front() {
            if *at > now {
                break;
            }
            if let Some((_, frame)) = self.pending_keys.pop_front() {
                due.push(frame);
            }
        }
        due
    }

    fn locked_mouse_frame(&self, input: &PointerInput) -> Option<MouseFrame> {
        if !(self.mouse_active && self.mouse_locked) {
            return None;
        }
        Some(MouseFrame {
            x: (input.movement_x * self.mouse_scale as f32).round() as i32,
            y: (input.movement_y * self.mouse_scale as f32).round() as i32,
            wheel_x: 0,
            wheel_y: 0,
            buttons: input.buttons,
            mode: MouseMode::Relative,
        })
    }

    fn buffer_touch(&mut self, input: &PointerInput) {
        if !self.touch_active {
            return;
        }
        let (x, y) = to_surface(input.x, input.y, self.view_width, self.view_height);
        self.touches
            .entry(input.pointer_id)
            .or_default()
            .push(TouchSample {
                phase: input.phase,
                pointer_id: input.pointer_id,
                x,
                y,
                pressure: to_byte(input.pressure * u8::MAX as f32),
                width: to_byte(input.width),
                height: to_byte(input.height),
            });
    }
}
