//! Vibration dispatch: host bridge forwarding or local actuator playback
//! with cancellable per-slot repeat timers.

use std::time::{Duration, Instant};

use stratus_common::{ForceTriggerRumble, VibrationMode};
use stratus_core::{ControllerFrame, RumbleCommand, RumbleData, MAX_GAMEPADS};
use tracing::{debug, warn};

use crate::devices::{EffectKind, GamepadProvider};
use crate::transport::{BridgeEnvelope, BridgeMessageType, HostBridge};

/// Weak-motor blend applies while the right motor is below this level.
const BLEND_CEILING: f32 = 0.6;
const FORCED_TRIGGER_MS: f32 = 50.0;
const FORCED_TRIGGER_THRESHOLD: f32 = 0.5;
const MIN_REPEAT_PERIOD: Duration = Duration::from_millis(1);

/// What happened to one decoded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Vibration is globally disabled.
    Dropped,
    Forwarded(BridgeMessageType),
    /// Local playback; `None` when the command carried no motion.
    Played(Option<EffectKind>),
    /// No bridge, actuator or permission to play.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
struct RepeatTimer {
    data: RumbleData,
    remaining: u8,
    period: Duration,
    next_due: Instant,
}

/// Outstanding replays, one timer per gamepad slot.
#[derive(Debug, Default)]
pub struct RumbleRepeater {
    slots: [Option<RepeatTimer>; MAX_GAMEPADS],
}

impl RumbleRepeater {
    /// First replay fires one period after `now`.
    pub fn schedule(
        &mut self,
        index: u8,
        data: RumbleData,
        count: u8,
        period: Duration,
        now: Instant,
    ) {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return;
        };
        if count == 0 {
            *slot = None;
            return;
        }
        let period = period.max(MIN_REPEAT_PERIOD);
        *slot = Some(RepeatTimer {
            data,
            remaining: count,
            period,
            next_due: now + period,
        });
    }

    pub fn cancel(&mut self, index: u8) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            *slot = None;
        }
    }

    pub fn cancel_all(&mut self) {
        self.slots = Default::default();
    }

    pub fn is_active(&self, index: u8) -> bool {
        matches!(self.slots.get(index as usize), Some(Some(_)))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().flatten().map(|timer| timer.next_due).min()
    }

    /// Replays due at `now`, at most one per slot. Exhausted timers are cleared.
    pub fn take_due(&mut self, now: Instant) -> Vec<(u8, RumbleData)> {
        let mut due = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(timer) = slot.as_mut() else {
                continue;
            };
            if timer.next_due > now {
                continue;
            }
            due.push((index as u8, timer.data));
            timer.remaining -= 1;
            timer.next_due += timer.period;
            if timer.remaining == 0 {
                *slot = None;
            }
        }
        due
    }
}

/// Weak-motor magnitude with trigger intensity blended in.
pub fn blend_weak_magnitude(command: &RumbleCommand) -> f32 {
    let main = if command.right_motor < BLEND_CEILING {
        (BLEND_CEILING - command.right_motor) / 2.0
    } else {
        0.0
    };
    let triggers = (command.left_trigger + command.right_trigger) / 4.0;
    (command.right_motor + main.min(triggers)).min(1.0)
}

#[derive(Debug)]
pub struct RumbleDispatcher {
    vibration: bool,
    rumble_enabled: bool,
    mode: VibrationMode,
    repeater: RumbleRepeater,
}

impl RumbleDispatcher {
    pub fn new(vibration: bool, rumble_enabled: bool, mode: VibrationMode) -> Self {
        Self {
            vibration,
            rumble_enabled,
            mode,
            repeater: RumbleRepeater::default(),
        }
    }

    pub fn set_vibration(&mut self, enabled: bool) {
        self.vibration = enabled;
    }

    pub fn set_rumble_enabled(&mut self, enabled: bool) {
        self.rumble_enabled = enabled;
    }

    pub fn set_mode(&mut self, mode: VibrationMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> VibrationMode {
        self.mode
    }

    pub fn repeater(&self) -> &RumbleRepeater {
        &self.repeater
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.repeater.next_deadline()
    }

    pub fn cancel_all(&mut self) {
        self.repeater.cancel_all();
    }

    pub fn dispatch(
        &mut self,
        command: &RumbleCommand,
        now: Instant,
        devices: &mut dyn GamepadProvider,
        bridge: Option<&mut (dyn HostBridge + 'static)>,
    ) -> DispatchOutcome {
        if !self.vibration {
            debug!("vibration disabled, dropping command for slot {}", command.gamepad_index);
            return DispatchOutcome::Dropped;
        }
        match self.mode {
            VibrationMode::Device => {
                self.forward(BridgeMessageType::DeviceVibration, command, bridge)
            }
            VibrationMode::Native => {
                self.forward(BridgeMessageType::NativeVibration, command, bridge)
            }
            VibrationMode::Local => self.play_local(command, now, devices),
        }
    }

    fn forward(
        &self,
        kind: BridgeMessageType,
        command: &RumbleCommand,
        bridge: Option<&mut (dyn HostBridge + 'static)>,
    ) -> DispatchOutcome {
        let Some(bridge) = bridge else {
            debug!("no host bridge attached, skipping {:?}", kind);
            return DispatchOutcome::Skipped;
        };
        let envelope = BridgeEnvelope::vibration(kind, command.rumble_data(), command.repeat);
        if let Err(err) = bridge.post(&envelope) {
            warn!("host bridge rejected vibration: {err:#}");
            return DispatchOutcome::Skipped;
        }
        DispatchOutcome::Forwarded(kind)
    }

    fn play_local(
        &mut self,
        command: &RumbleCommand,
        now: Instant,
        devices: &mut dyn GamepadProvider,
    ) -> DispatchOutcome {
        let index = command.gamepad_index;
        let Some(caps) = devices.actuator(index) else {
            debug!("no actuator on slot {index}");
            return DispatchOutcome::Skipped;
        };
        if !self.rumble_enabled {
            return DispatchOutcome::Skipped;
        }
        self.repeater.cancel(index);

        let mut data = command.rumble_data();
        data.weak_magnitude = blend_weak_magnitude(command);

        let effect = if !caps.dual_rumble {
            None
        } else if caps.trigger_rumble {
            if data.left_trigger > 0.0 || data.right_trigger > 0.0 {
                std::mem::swap(&mut data.left_trigger, &mut data.right_trigger);
                data.duration /= 2.0;
                Some(EffectKind::TriggerRumble)
            } else if data.weak_magnitude > 0.0 || data.strong_magnitude > 0.0 {
                Some(EffectKind::DualRumble)
            } else {
                None
            }
        } else {
            Some(EffectKind::DualRumble)
        };

        if let Some(kind) = effect {
            if let Err(err) = devices.play_effect(index, kind, &data) {
                warn!("slot {index} {kind:?} failed: {err:#}");
            }
        }
        if caps.dual_rumble && command.repeat > 0 {
            let period = Duration::from_millis(command.repeat_interval_ms());
            self.repeater.schedule(index, data, command.repeat, period, now);
        }
        DispatchOutcome::Played(effect)
    }

    /// Play replays that are due. Replays use the dual-motor effect.
    pub fn fire_due(&mut self, now: Instant, devices: &mut dyn GamepadProvider) -> usize {
        let due = self.repeater.take_due(now);
        let mut played = 0;
        for (index, data) in due {
            if devices.actuator(index).is_none() {
                debug!("slot {index} gone, cancelling replays");
                self.repeater.cancel(index);
                continue;
            }
            match devices.play_effect(index, EffectKind::DualRumble, &data) {
                Ok(()) => played += 1,
                Err(err) => debug!("slot {index} replay failed: {err:#}"),
            }
        }
        played
    }

    /// Short trigger pulse on slot 0 for hard trigger pulls.
    pub fn force_trigger_rumble(
        &self,
        setting: ForceTriggerRumble,
        frame: &ControllerFrame,
        devices: &mut dyn GamepadProvider,
    ) {
        if setting == ForceTriggerRumble::Off {
            return;
        }
        let Some(caps) = devices.actuator(0) else {
            return;
        };
        if !(caps.dual_rumble && caps.trigger_rumble) {
            return;
        }
        let left_pulled = frame.left_trigger > FORCED_TRIGGER_THRESHOLD;
        let right_pulled = frame.right_trigger > FORCED_TRIGGER_THRESHOLD;
        let (left, right) = match setting {
            ForceTriggerRumble::All if left_pulled || right_pulled => (
                if left_pulled { frame.left_trigger } else { 0.0 },
                if right_pulled { frame.right_trigger } else { 0.0 },
            ),
            ForceTriggerRumble::Left if left_pulled => (frame.left_trigger, 0.0),
            ForceTriggerRumble::Right if right_pulled => (0.0, frame.right_trigger),
            _ => return,
        };
        let data = RumbleData {
            start_delay: 0.0,
            duration: FORCED_TRIGGER_MS,
            weak_magnitude: 1.0,
            strong_magnitude: 0.0,
            left_trigger: right,
            right_trigger: left,
        };
        if let Err(err) = devices.play_effect(0, EffectKind::TriggerRumble, &data) {
            debug!("forced trigger rumble failed: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::testing::FakeGamepads;
    use crate::devices::ActuatorCaps;
    use crate::transport::testing::RecordingBridge;
    use stratus_core::RumbleType;

    const DUAL: ActuatorCaps = ActuatorCaps {
        dual_rumble: true,
        trigger_rumble: false,
    };
    const TRIGGERS: ActuatorCaps = ActuatorCaps {
        dual_rumble: true,
        trigger_rumble: true,
    };

    fn command(motors: [f32; 4], duration_raw: u16, delay_ms: u16, repeat: u8) -> RumbleCommand {
        RumbleCommand {
            rumble_type: RumbleType::FourMotor,
            gamepad_index: 0,
            left_motor: motors[0],
            right_motor: motors[1],
            left_trigger: motors[2],
            right_trigger: motors[3],
            duration_raw,
            delay_ms,
            repeat,
        }
    }

    fn local() -> RumbleDispatcher {
        RumbleDispatcher::new(true, true, VibrationMode::Local)
    }

    #[test]
    fn disabled_vibration_drops_everything() {
        let mut dispatcher = RumbleDispatcher::new(false, true, VibrationMode::Native);
        let mut bridge = RecordingBridge::default();
        let outcome = dispatcher.dispatch(
            &command([0.5, 0.5, 0.0, 0.0], 100, 0, 0),
            Instant::now(),
            &mut FakeGamepads::default(),
            Some(&mut bridge),
        );
        assert_eq!(outcome, DispatchOutcome::Dropped);
        assert!(bridge.posted().is_empty());
    }

    #[test]
    fn bridge_modes_forward_rumble_data() {
        for (mode, kind) in [
            (VibrationMode::Device, BridgeMessageType::DeviceVibration),
            (VibrationMode::Native, BridgeMessageType::NativeVibration),
        ] {
            let mut dispatcher = RumbleDispatcher::new(true, true, mode);
            let mut bridge = RecordingBridge::default();
            let outcome = dispatcher.dispatch(
                &command([0.6, 0.4, 0.0, 0.0], 500, 0, 1),
                Instant::now(),
                &mut FakeGamepads::default(),
                Some(&mut bridge),
            );
            assert_eq!(outcome, DispatchOutcome::Forwarded(kind));
            let posted = bridge.posted();
            assert_eq!(posted.len(), 1);
            assert_eq!(posted[0].kind, kind);
            assert_eq!(posted[0].message.repeat, 1);
            assert_eq!(posted[0].message.rumble_data.duration, 50.0);
            assert_eq!(posted[0].message.rumble_data.strong_magnitude, 0.6);
        }
    }

    #[test]
    fn bridge_mode_without_bridge_is_skipped() {
        let mut dispatcher = RumbleDispatcher::new(true, true, VibrationMode::Device);
        let outcome = dispatcher.dispatch(
            &command([0.6, 0.4, 0.0, 0.0], 500, 0, 0),
            Instant::now(),
            &mut FakeGamepads::default(),
            None,
        );
        assert_eq!(outcome, DispatchOutcome::Skipped);
    }

    #[test]
    fn missing_actuator_is_skipped() {
        let mut dispatcher = local();
        let outcome = dispatcher.dispatch(
            &command([0.6, 0.4, 0.0, 0.0], 500, 0, 2),
            Instant::now(),
            &mut FakeGamepads::default(),
            None,
        );
        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert!(dispatcher.next_deadline().is_none());
    }

    #[test]
    fn rumble_disabled_skips_local_playback() {
        let mut dispatcher = local();
        dispatcher.set_rumble_enabled(false);
        let mut devices = FakeGamepads::default();
        devices.set_caps(0, DUAL);
        let outcome = dispatcher.dispatch(
            &command([0.6, 0.4, 0.0, 0.0], 500, 0, 0),
            Instant::now(),
            &mut devices,
            None,
        );
        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert!(devices.played.is_empty());
    }

    #[test]
    fn dual_rumble_plays_main_motors() {
        let mut dispatcher = local();
        let mut devices = FakeGamepads::default();
        devices.set_caps(0, DUAL);
        let outcome = dispatcher.dispatch(
            &command([0.6, 0.4, 0.0, 0.0], 500, 0, 0),
            Instant::now(),
            &mut devices,
            None,
        );
        assert_eq!(outcome, DispatchOutcome::Played(Some(EffectKind::DualRumble)));
        let (index, kind, data) = devices.played[0];
        assert_eq!((index, kind), (0, EffectKind::DualRumble));
        assert_eq!(data.strong_magnitude, 0.6);
        // No trigger motion, so nothing blends in.
        assert_eq!(data.weak_magnitude, 0.4);
        assert_eq!(data.duration, 50.0);
    }

    #[test]
    fn weak_magnitude_blends_trigger_intensity() {
        // main = (0.6 - 0.2) / 2 = 0.2, triggers = (0.4 + 0.4) / 4 = 0.2
        let blended = blend_weak_magnitude(&command([0.0, 0.2, 0.4, 0.4], 0, 0, 0));
        assert!((blended - 0.4).abs() < 1e-6);
        // The smaller of the two contributions wins.
        let blended = blend_weak_magnitude(&command([0.0, 0.5, 1.0, 1.0], 0, 0, 0));
        assert!((blended - 0.55).abs() < 1e-6);
        // No blend once the right motor is strong enough, capped at 1.
        assert_eq!(blend_weak_magnitude(&command([0.0, 1.0, 1.0, 1.0], 0, 0, 0)), 1.0);
    }

    #[test]
    fn trigger_capable_actuator_swaps_and_halves() {
        let mut dispatcher = local();
        let mut devices = FakeGamepads::default();
        devices.set_caps(0, TRIGGERS);
        let outcome = dispatcher.dispatch(
            &command([0.0, 0.0, 0.25, 0.75], 1000, 0, 0),
            Instant::now(),
            &mut devices,
            None,
        );
        assert_eq!(outcome, DispatchOutcome::Played(Some(EffectKind::TriggerRumble)));
        let (_, kind, data) = devices.played[0];
        assert_eq!(kind, EffectKind::TriggerRumble);
        assert_eq!(data.left_trigger, 0.75);
        assert_eq!(data.right_trigger, 0.25);
        assert_eq!(data.duration, 50.0);
    }

    #[test]
    fn trigger_capable_actuator_without_motion_plays_nothing() {
        let mut dispatcher = local();
        let mut devices = FakeGamepads::default();
        devices.set_caps(0, TRIGGERS);
        let outcome = dispatcher.dispatch(
            &command([0.0, 0.0, 0.0, 0.0], 1000, 0, 0),
            Instant::now(),
            &mut devices,
            None,
        );
        assert_eq!(outcome, DispatchOutcome::Played(None));
        assert!(devices.played.is_empty());
    }

    #[test]
    fn repeats_replay_exactly_count_times() {
        let mut dispatcher = local();
        let mut devices = FakeGamepads::default();
        devices.set_caps(0, DUAL);
        let start = Instant::now();
        // duration_raw 500 + delay 100 = 600 ms spacing.
        dispatcher.dispatch(&command([0.5, 0.5, 0.0, 0.0], 500, 100, 2), start, &mut devices, None);
        assert_eq!(devices.played.len(), 1);
        assert_eq!(dispatcher.next_deadline(), Some(start + Duration::from_millis(600)));

        assert_eq!(dispatcher.fire_due(start + Duration::from_millis(599), &mut devices), 0);
        assert_eq!(dispatcher.fire_due(start + Duration::from_millis(600), &mut devices), 1);
        assert_eq!(dispatcher.next_deadline(), Some(start + Duration::from_millis(1200)));
        assert_eq!(dispatcher.fire_due(start + Duration::from_millis(1200), &mut devices), 1);
        assert_eq!(dispatcher.next_deadline(), None);
        assert!(!dispatcher.repeater().is_active(0));
        assert_eq!(devices.played.len(), 3);
        assert!(devices.played.iter().all(|(_, kind, _)| *kind == EffectKind::DualRumble));
    }

    #[test]
    fn new_command_cancels_pending_replays() {
        let mut dispatcher = local();
        let mut devices = FakeGamepads::default();
        devices.set_caps(0, DUAL);
        let start = Instant::now();
        dispatcher.dispatch(&command([0.5, 0.5, 0.0, 0.0], 100, 0, 5), start, &mut devices, None);
        assert!(dispatcher.repeater().is_active(0));
        dispatcher.dispatch(&command([0.5, 0.5, 0.0, 0.0], 100, 0, 0), start, &mut devices, None);
        assert!(!dispatcher.repeater().is_active(0));
    }

    #[test]
    fn cancel_all_sweeps_every_slot() {
        let mut repeater = RumbleRepeater::default();
        let now = Instant::now();
        for index in 0..MAX_GAMEPADS as u8 {
            repeater.schedule(index, RumbleData::default(), 3, Duration::from_millis(10), now);
        }
        repeater.schedule(7, RumbleData::default(), 3, Duration::from_millis(10), now);
        assert!(repeater.next_deadline().is_some());
        repeater.cancel_all();
        assert!(repeater.next_deadline().is_none());
        assert!(repeater.take_due(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn unplugged_slot_cancels_its_replays() {
        let mut dispatcher = local();
        let mut devices = FakeGamepads::default();
        devices.set_caps(1, DUAL);
        let start = Instant::now();
        let mut cmd = command([0.5, 0.5, 0.0, 0.0], 100, 0, 3);
        cmd.gamepad_index = 1;
        dispatcher.dispatch(&cmd, start, &mut devices, None);

        devices.caps[1] = None;
        assert_eq!(dispatcher.fire_due(start + Duration::from_millis(100), &mut devices), 0);
        assert!(!dispatcher.repeater().is_active(1));
    }

    #[test]
    fn forced_trigger_rumble_pulses_pulled_side() {
        let dispatcher = local();
        let mut devices = FakeGamepads::default();
        devices.set_caps(0, TRIGGERS);
        let mut frame = ControllerFrame::default();
        frame.left_trigger = 0.9;
        frame.right_trigger = 0.3;

        dispatcher.force_trigger_rumble(ForceTriggerRumble::Right, &frame, &mut devices);
        assert!(devices.played.is_empty());

        dispatcher.force_trigger_rumble(ForceTriggerRumble::All, &frame, &mut devices);
        let (index, kind, data) = devices.played[0];
        assert_eq!((index, kind), (0, EffectKind::TriggerRumble));
        assert_eq!(data.duration, 50.0);
        // Sides are swapped on the way to the actuator.
        assert_eq!(data.right_trigger, 0.9);
        assert_eq!(data.left_trigger, 0.0);

        dispatcher.force_trigger_rumble(ForceTriggerRumble::Off, &frame, &mut devices);
        assert_eq!(devices.played.len(), 1);
    }
}
