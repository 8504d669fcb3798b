//! Controller hot-plug detection for the control channel.

use stratus_core::MAX_GAMEPADS;
use tracing::{info, warn};

use crate::transport::ControlChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugEvent {
    Added(u8),
    Removed(u8),
}

/// Tracks which slots are populated. Slot 0 is always assumed present and
/// never reported.
#[derive(Debug, Clone, Default)]
pub struct HotplugMonitor {
    active: [bool; MAX_GAMEPADS],
}

impl HotplugMonitor {
    pub fn reset(&mut self) {
        self.active = [false; MAX_GAMEPADS];
    }

    pub fn is_active(&self, index: u8) -> bool {
        self.active.get(index as usize).copied().unwrap_or(false)
    }

    /// Compare against `present` and record the first difference in slots
    /// 1..=3. Later differences wait for the next scan.
    pub fn scan(&mut self, present: &[bool]) -> Option<HotplugEvent> {
        for index in 1..MAX_GAMEPADS {
            let now_present = present.get(index).copied().unwrap_or(false);
            if self.active[index] == now_present {
                continue;
            }
            self.active[index] = now_present;
            let index = index as u8;
            return Some(if now_present {
                HotplugEvent::Added(index)
            } else {
                HotplugEvent::Removed(index)
            });
        }
        None
    }

    /// Scan and notify the control channel. Nothing is scanned while the
    /// channel is closed, so transitions are reported once it opens.
    pub fn poll(
        &mut self,
        present: &[bool],
        control: &mut dyn ControlChannel,
    ) -> Option<HotplugEvent> {
        if !control.is_open() {
            return None;
        }
        let event = self.scan(present)?;
        let result = match event {
            HotplugEvent::Added(index) => {
                info!("gamepad {index} connected");
                control.send_gamepad_added(index)
            }
            HotplugEvent::Removed(index) => {
                info!("gamepad {index} disconnected");
                control.send_gamepad_removed(index)
            }
        };
        if let Err(err) = result {
            warn!("failed to notify control channel: {err:#}");
        }
        Some(event)
    }
}
