//! The input channel: frame sources, outbound queues and the packetizer
//! state machine, plus inbound vibration handling.

use std::time::Instant;

use bytes::Bytes;
use stratus_common::helpers::elapsed_ms;
use stratus_common::{
    BatchLimits, ForceTriggerRumble, InputConfig, PacketizerMode, Result, VibrationMode,
};
use stratus_core::{
    decode_inbound, encode_client_metadata, encode_input_packet, Button, ControllerFrame,
    FrameMetadata, InboundReport, PacketSections,
};
use tracing::{debug, info, trace, warn};

use crate::devices::{
    GamepadMapper, GamepadProvider, KeyboardController, PointerAction, PointerInput,
    PointerRouter, VirtualController, NEXUS_OVERRIDE_KEY,
};
use crate::merge::merge_frames;
use crate::queue::{Drained, OutboundQueues};
use crate::rumble::{DispatchOutcome, RumbleDispatcher};
use crate::transport::{HostBridge, InputTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Open,
    Running,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTransition {
    pub from: ChannelState,
    pub to: ChannelState,
    pub event: ChannelEvent,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("invalid channel transition from {0:?} via {1:?}")]
    InvalidTransition(ChannelState, ChannelEvent),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub packets_sent: u64,
    pub send_failures: u64,
    pub legacy_merges: u64,
    pub vibration_commands: u64,
    pub ignored_reports: u64,
}

pub struct InputChannel {
    state: ChannelState,
    mode: PacketizerMode,
    legacy_keyboard: bool,
    touch: bool,
    force_trigger_rumble: ForceTriggerRumble,
    max_touchpoints: u8,
    limits: BatchLimits,
    sequence: u32,
    epoch: Instant,
    stats: ChannelStats,

    queues: OutboundQueues,
    mapper: GamepadMapper,
    keyboard: KeyboardController,
    virtual_pad: VirtualController,
    pointer: PointerRouter,
    adhoc: Option<ControllerFrame>,
    rumble: RumbleDispatcher,

    transport: Box<dyn InputTransport>,
    bridge: Option<Box<dyn HostBridge>>,
}

impl InputChannel {
    pub fn new(
        config: &InputConfig,
        transport: Box<dyn InputTransport>,
        bridge: Option<Box<dyn HostBridge>>,
        epoch: Instant,
    ) -> Result<Self> {
        config.validate()?;
        let keyboard = match &config.keyboard_bindings {
            Some(overrides) => KeyboardController::with_overrides(overrides)?,
            None => KeyboardController::default(),
        };
        Ok(Self {
            state: ChannelState::Idle,
            mode: config.mode,
            legacy_keyboard: config.legacy_keyboard,
            touch: config.touch,
            force_trigger_rumble: config.force_trigger_rumble,
            max_touchpoints: config.max_touchpoints,
            limits: config.batch,
            sequence: 0,
            epoch,
            stats: ChannelStats::default(),
            queues: OutboundQueues::default(),
            mapper: GamepadMapper::from_config(config)?,
            keyboard,
            virtual_pad: VirtualController::default(),
            pointer: PointerRouter::new(
                config.mouse_keyboard,
                config.mouse_scale,
                config.surface_width,
                config.surface_height,
            ),
            adhoc: None,
            rumble: RumbleDispatcher::new(
                config.vibration,
                config.rumble_enabled,
                config.vibration_mode,
            ),
            transport,
            bridge,
        })
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn queues(&self) -> &OutboundQueues {
        &self.queues
    }

    /// Idle to Open. Sends the client-metadata handshake with sequence 0.
    pub fn open(&mut self, now: Instant) -> std::result::Result<ChannelTransition, ChannelError> {
        let transition = self.transition(ChannelEvent::Open)?;
        let handshake = encode_client_metadata(
            self.sequence,
            elapsed_ms(self.epoch, now),
            self.max_touchpoints,
        );
        self.send(handshake);
        info!("input channel open ({:?} mode)", self.mode);
        Ok(transition)
    }

    /// Open to Running. The owner starts ticking after this.
    pub fn start(&mut self) -> std::result::Result<ChannelTransition, ChannelError> {
        self.transition(ChannelEvent::Start)
    }

    /// Running to Closed.
    pub fn stop(&mut self) -> std::result::Result<ChannelTransition, ChannelError> {
        let transition = self.transition(ChannelEvent::Stop)?;
        self.teardown();
        Ok(transition)
    }

    /// Close from any state, e.g. when the transport goes away.
    pub fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        debug!("input channel closing from {:?}", self.state);
        self.state = ChannelState::Closed;
        self.teardown();
    }

    fn teardown(&mut self) {
        self.rumble.cancel_all();
        self.queues.clear();
        info!(
            "input channel closed after {} packets (seq {})",
            self.stats.packets_sent, self.sequence
        );
    }

    fn transition(
        &mut self,
        event: ChannelEvent,
    ) -> std::result::Result<ChannelTransition, ChannelError> {
        let next = match (self.state, event) {
            (ChannelState::Idle, ChannelEvent::Open) => ChannelState::Open,
            (ChannelState::Open, ChannelEvent::Start) => ChannelState::Running,
            (ChannelState::Running, ChannelEvent::Stop) => ChannelState::Closed,
            (from, event) => return Err(ChannelError::InvalidTransition(from, event)),
        };
        let from = self.state;
        self.state = next;
        Ok(ChannelTransition {
            from,
            to: next,
            event,
        })
    }

    /// One packetizer tick. Returns the sequence number of the packet sent,
    /// if any.
    pub fn tick(&mut self, now: Instant, devices: &mut dyn GamepadProvider) -> Option<u32> {
        if self.state != ChannelState::Running {
            return None;
        }
        let drained = match self.mode {
            PacketizerMode::Primary => {
                if self.legacy_keyboard
                    && !self.virtual_pad.is_pressing()
                    && self.queues.controller.is_empty()
                {
                    self.queue_legacy_merge(devices);
                }
                let touches = self.pointer.take_touch_frames();
                if self.touch {
                    for frame in touches {
                        self.queues.pointer.push(frame);
                    }
                }
                for frame in self.pointer.flush_due_keys(now) {
                    self.queues.keyboard.push(frame);
                }
                self.queues.drain(&self.limits)
            }
            PacketizerMode::Simplified => Drained {
                controller: self.queues.controller.drain_batch(self.limits.controller),
                ..Default::default()
            },
        };

        if !drained.triggers_send() {
            if !drained.is_empty() {
                trace!(
                    "discarding {} mouse / {} keyboard frames without a trigger section",
                    drained.mouse.len(),
                    drained.keyboard.len()
                );
            }
            return None;
        }

        self.sequence = self.sequence.wrapping_add(1);
        let sections = PacketSections {
            metadata: &drained.metadata,
            gamepad: &drained.controller,
            pointer: &drained.pointer,
            mouse: &drained.mouse,
            keyboard: &drained.keyboard,
        };
        let packet = encode_input_packet(self.sequence, elapsed_ms(self.epoch, now), &sections);
        self.send(packet);
        Some(self.sequence)
    }

    fn queue_legacy_merge(&mut self, devices: &mut dyn GamepadProvider) {
        let physical = self.mapper.request_states(devices);
        let keyboard = self.keyboard.request_state();
        let adhoc = self.adhoc.take();
        let merged = merge_frames(physical.first(), Some(&keyboard), adhoc.as_ref());
        self.queues.controller.push(merged);
        self.stats.legacy_merges += 1;
        self.rumble
            .force_trigger_rumble(self.force_trigger_rumble, &merged, devices);
    }

    /// Physical poll loop body: sample and queue every connected controller.
    pub fn poll_physical(&mut self, devices: &mut dyn GamepadProvider) -> usize {
        if self.state != ChannelState::Running || self.virtual_pad.is_pressing() {
            return 0;
        }
        let mut frames = self.mapper.request_states(devices);
        self.mapper.apply_nexus_override(&mut frames);
        let count = frames.len();
        for frame in frames {
            self.queues.controller.push(frame);
        }
        count
    }

    fn send(&mut self, packet: Bytes) {
        let len = packet.len();
        match self.transport.send(packet) {
            Ok(()) => {
                self.stats.packets_sent += 1;
                trace!("sent {len} byte input packet (seq {})", self.sequence);
            }
            Err(err) => {
                self.stats.send_failures += 1;
                warn!("input packet {} lost: {err:#}", self.sequence);
            }
        }
    }

    /// Decode and dispatch one inbound message.
    pub fn on_message(
        &mut self,
        payload: &[u8],
        now: Instant,
        devices: &mut dyn GamepadProvider,
    ) -> Option<DispatchOutcome> {
        match decode_inbound(payload) {
            Ok(InboundReport::Vibration(command)) => {
                self.stats.vibration_commands += 1;
                let bridge = self.bridge.as_deref_mut();
                let outcome = self.rumble.dispatch(&command, now, devices, bridge);
                debug!("vibration for slot {}: {outcome:?}", command.gamepad_index);
                Some(outcome)
            }
            Ok(InboundReport::Ignored { report_type }) => {
                self.stats.ignored_reports += 1;
                debug!("ignoring inbound report type {report_type}");
                None
            }
            Err(err) => {
                self.stats.ignored_reports += 1;
                debug!("dropping inbound report: {err}");
                None
            }
        }
    }

    pub fn next_rumble_deadline(&self) -> Option<Instant> {
        self.rumble.next_deadline()
    }

    pub fn fire_rumble_repeats(
        &mut self,
        now: Instant,
        devices: &mut dyn GamepadProvider,
    ) -> usize {
        self.rumble.fire_due(now, devices)
    }

    pub fn queue_controller_state(&mut self, frame: ControllerFrame) {
        self.queues.controller.push(frame);
    }

    pub fn press_button_start(&mut self, index: u8, button: Button) {
        if let Some(frame) = self.virtual_pad.press_start(index, button) {
            self.queues.controller.push(frame);
        }
    }

    pub fn press_button_end(&mut self, index: u8, button: Button) {
        if let Some(frame) = self.virtual_pad.press_end(index, button) {
            self.queues.controller.push(frame);
        }
    }

    pub fn move_left_stick(&mut self, index: u8, x: f32, y: f32) {
        if let Some(frame) = self.virtual_pad.move_left_stick(index, x, y) {
            self.queues.controller.push(frame);
        }
    }

    pub fn move_right_stick(&mut self, index: u8, x: f32, y: f32) {
        if let Some(frame) = self.virtual_pad.move_right_stick(index, x, y) {
            self.queues.controller.push(frame);
        }
    }

    /// Only the primary packetizer drains the metadata, pointer, mouse and
    /// keyboard queues, so nothing is buffered for them otherwise.
    fn carries_side_input(&self) -> bool {
        self.mode == PacketizerMode::Primary
    }

    /// Route a key transition to every keyboard consumer: the Nexus
    /// override, the keyboard-as-controller source and raw keyboard frames.
    pub fn on_key(&mut self, now: Instant, code: &str, key_code: u16, key: &str, pressed: bool) {
        if code == NEXUS_OVERRIDE_KEY {
            self.mapper.set_nexus_override(pressed);
        }
        self.keyboard.on_key(code, pressed);
        if !self.carries_side_input() {
            return;
        }
        if let Some(frame) = self.pointer.on_key(now, pressed, key_code, key) {
            self.queues.keyboard.push(frame);
        }
    }

    pub fn on_pointer_click(&mut self, input: &PointerInput) -> Option<PointerAction> {
        if !self.carries_side_input() {
            return None;
        }
        let action = self.pointer.on_pointer_click(input);
        if let Some(PointerAction::Mouse(frame)) = action {
            self.queues.mouse.push(frame);
        }
        action
    }

    pub fn on_pointer_move(&mut self, input: &PointerInput) {
        if !self.carries_side_input() {
            return;
        }
        if let Some(frame) = self.pointer.on_pointer_move(input) {
            self.queues.mouse.push(frame);
        }
    }

    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.pointer.set_pointer_locked(locked);
    }

    /// Stamp the render time and queue the frame's timing metadata.
    pub fn add_processed_frame(&mut self, mut metadata: FrameMetadata, now: Instant) {
        if !self.carries_side_input() {
            return;
        }
        metadata.frame_rendered_time_ms = elapsed_ms(self.epoch, now) as u32;
        self.queues.metadata.push(metadata);
    }

    /// One-shot frame merged into the next legacy merge.
    pub fn set_adhoc_state(&mut self, frame: ControllerFrame) {
        self.adhoc = Some(frame);
    }

    pub fn set_vibration(&mut self, enabled: bool) {
        self.rumble.set_vibration(enabled);
    }

    pub fn set_rumble_enabled(&mut self, enabled: bool) {
        self.rumble.set_rumble_enabled(enabled);
    }

    pub fn set_vibration_mode(&mut self, mode: VibrationMode) {
        self.rumble.set_mode(mode);
    }

    pub fn set_legacy_keyboard(&mut self, enabled: bool) {
        self.legacy_keyboard = enabled;
        if !enabled {
            self.keyboard.release_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Buf;
    use stratus_core::packet::PACKET_HEADER_SIZE;
    use stratus_core::{ReportType, TouchPhase};

    use super::*;
    use crate::devices::testing::FakeGamepads;
    use crate::devices::ActuatorCaps;
    use crate::transport::testing::{RecordingBridge, RecordingTransport};

    fn channel_with(config: InputConfig) -> (InputChannel, RecordingTransport) {
        let transport = RecordingTransport::default();
        let channel =
            InputChannel::new(&config, Box::new(transport.clone()), None, Instant::now()).unwrap();
        (channel, transport)
    }

    fn running(config: InputConfig) -> (InputChannel, RecordingTransport) {
        let (mut channel, transport) = channel_with(config);
        channel.open(Instant::now()).unwrap();
        channel.start().unwrap();
        (channel, transport)
    }

    fn header(packet: &[u8]) -> (u16, u32) {
        let mut buf = packet;
        let report = buf.get_u16_le();
        let sequence = buf.get_u32_le();
        (report, sequence)
    }

    fn no_legacy() -> InputConfig {
        InputConfig {
            legacy_keyboard: false,
            ..Default::default()
        }
    }

    #[test]
    fn lifecycle_follows_idle_open_running_closed() {
        let (mut channel, transport) = channel_with(InputConfig::default());
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(
            channel.start(),
            Err(ChannelError::InvalidTransition(ChannelState::Idle, ChannelEvent::Start))
        );

        let transition = channel.open(Instant::now()).unwrap();
        assert_eq!(transition.to, ChannelState::Open);
        assert!(channel.open(Instant::now()).is_err());
        channel.start().unwrap();
        assert_eq!(channel.state(), ChannelState::Running);
        channel.stop().unwrap();
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.stop().is_err());

        // Only the handshake went out.
        assert_eq!(transport.packets().len(), 1);
    }

    #[test]
    fn handshake_uses_sequence_zero() {
        let (mut channel, transport) = channel_with(InputConfig::default());
        channel.open(Instant::now()).unwrap();
        let packets = transport.packets();
        let (report, sequence) = header(&packets[0]);
        assert_eq!(report, ReportType::CLIENT_METADATA.bits());
        assert_eq!(sequence, 0);
        assert_eq!(packets[0].len(), PACKET_HEADER_SIZE + 1);
        assert_eq!(packets[0][PACKET_HEADER_SIZE], 2);
        assert_eq!(channel.sequence(), 0);
    }

    #[test]
    fn ticks_do_nothing_until_running() {
        let (mut channel, transport) = channel_with(InputConfig::default());
        channel.press_button_start(0, Button::A);
        assert_eq!(channel.tick(Instant::now(), &mut FakeGamepads::default()), None);
        assert!(transport.packets().is_empty());
    }

    #[test]
    fn legacy_merge_carries_held_keyboard_button() {
        let (mut channel, transport) = running(InputConfig::default());
        let mut devices = FakeGamepads::with_pad(0, vec![0.0; 17], vec![0.0; 4]);
        channel.on_key(Instant::now(), "Enter", 13, "Enter", true);

        assert_eq!(channel.tick(Instant::now(), &mut devices), Some(1));
        let packets = transport.packets();
        let packet = &packets[1];
        let (report, sequence) = header(packet);
        assert_eq!(report, ReportType::GAMEPAD.bits());
        assert_eq!(sequence, 1);

        let mut body = &packet[PACKET_HEADER_SIZE..];
        assert_eq!(body.get_u8(), 1);
        assert_eq!(body.get_u8(), 0);
        let mask = body.get_u16_le();
        assert_eq!(mask, Button::A.wire_bit().unwrap());
        for _ in 0..4 {
            assert_eq!(body.get_i16_le(), 0);
        }
    }

    #[test]
    fn legacy_merge_is_skipped_while_frames_are_queued() {
        let (mut channel, _transport) = running(InputConfig::default());
        let mut devices = FakeGamepads::default();
        channel.queue_controller_state(ControllerFrame::with_index(2));
        channel.tick(Instant::now(), &mut devices);
        assert_eq!(channel.stats().legacy_merges, 0);
        channel.tick(Instant::now(), &mut devices);
        assert_eq!(channel.stats().legacy_merges, 1);
    }

    #[test]
    fn virtual_press_suppresses_legacy_and_physical_sampling() {
        let (mut channel, _transport) = running(InputConfig::default());
        let mut devices = FakeGamepads::with_pad(0, vec![1.0; 17], vec![]);
        channel.press_button_start(0, Button::Y);
        assert_eq!(channel.poll_physical(&mut devices), 0);
        channel.tick(Instant::now(), &mut devices);
        channel.tick(Instant::now(), &mut devices);
        assert_eq!(channel.stats().legacy_merges, 0);

        channel.press_button_end(0, Button::Y);
        assert_eq!(channel.poll_physical(&mut devices), 1);
    }

    #[test]
    fn sequence_increments_only_when_sending() {
        let (mut channel, transport) = running(no_legacy());
        let mut devices = FakeGamepads::default();
        let now = Instant::now();
        assert_eq!(channel.tick(now, &mut devices), None);
        assert_eq!(channel.tick(now, &mut devices), None);
        assert_eq!(channel.sequence(), 0);

        channel.press_button_start(0, Button::A);
        assert_eq!(channel.tick(now, &mut devices), Some(1));
        assert_eq!(channel.tick(now, &mut devices), None);
        channel.press_button_end(0, Button::A);
        assert_eq!(channel.tick(now, &mut devices), Some(2));

        let sequences: Vec<u32> = transport.packets().iter().map(|p| header(p).1).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn mouse_only_ticks_send_nothing() {
        let config = InputConfig {
            legacy_keyboard: false,
            mouse_keyboard: true,
            ..Default::default()
        };
        let (mut channel, transport) = running(config);
        let mut devices = FakeGamepads::default();
        let click = PointerInput::mouse(TouchPhase::Down, 0.0, 0.0, 1);
        channel.on_pointer_click(&click);
        channel.set_pointer_locked(true);
        for _ in 0..40 {
            channel.on_pointer_move(&PointerInput::mouse(TouchPhase::Move, 1.0, 1.0, 0));
        }
        assert_eq!(channel.queues().mouse.len(), 40);

        assert_eq!(channel.tick(Instant::now(), &mut devices), None);
        assert_eq!(transport.packets().len(), 1);
        assert_eq!(channel.sequence(), 0);
        // The drained batch is gone even though nothing was sent.
        assert_eq!(channel.queues().mouse.len(), 11);
    }

    #[test]
    fn mouse_frames_ride_along_with_controller_frames() {
        let config = InputConfig {
            legacy_keyboard: false,
            mouse_keyboard: true,
            ..Default::default()
        };
        let (mut channel, transport) = running(config);
        channel.on_pointer_click(&PointerInput::mouse(TouchPhase::Down, 0.0, 0.0, 0));
        channel.set_pointer_locked(true);
        channel.on_pointer_move(&PointerInput::mouse(TouchPhase::Move, 2.0, 0.0, 0));
        channel.move_left_stick(0, 0.5, 0.0);

        channel.tick(Instant::now(), &mut FakeGamepads::default());
        let (report, _) = header(&transport.packets()[1]);
        assert_eq!(report, (ReportType::GAMEPAD | ReportType::MOUSE).bits());
    }

    #[test]
    fn touch_frames_flush_into_the_pointer_section() {
        let config = InputConfig {
            legacy_keyboard: false,
            touch: true,
            ..Default::default()
        };
        let (mut channel, transport) = running(config);
        channel.on_pointer_click(&PointerInput::touch(1, TouchPhase::Down, 10.0, 10.0));
        channel.on_pointer_click(&PointerInput::touch(2, TouchPhase::Down, 20.0, 20.0));

        let mut devices = FakeGamepads::default();
        assert_eq!(channel.tick(Instant::now(), &mut devices), Some(1));
        let (report, _) = header(&transport.packets()[1]);
        assert_eq!(report, ReportType::POINTER.bits());
        // Pointer batches hold a single frame; the second waits a tick.
        assert_eq!(channel.queues().pointer.len(), 1);
        assert_eq!(channel.tick(Instant::now(), &mut devices), Some(2));
    }

    #[test]
    fn touch_disabled_discards_buffered_contacts() {
        let (mut channel, _transport) = running(no_legacy());
        channel.on_pointer_click(&PointerInput::touch(1, TouchPhase::Down, 10.0, 10.0));
        assert_eq!(channel.tick(Instant::now(), &mut FakeGamepads::default()), None);
        assert!(channel.queues().pointer.is_empty());
    }

    #[test]
    fn raw_keys_are_duplicated_after_the_delay() {
        let config = InputConfig {
            legacy_keyboard: false,
            mouse_keyboard: true,
            ..Default::default()
        };
        let (mut channel, transport) = running(config);
        channel.on_pointer_click(&PointerInput::mouse(TouchPhase::Down, 0.0, 0.0, 0));
        channel.set_pointer_locked(true);
        let start = Instant::now();
        channel.on_key(start, "KeyW", 87, "w", true);
        assert_eq!(channel.queues().keyboard.len(), 1);

        let mut devices = FakeGamepads::default();
        assert_eq!(channel.tick(start, &mut devices), None);
        assert!(channel.queues().keyboard.is_empty());

        channel.move_left_stick(0, 0.0, 1.0);
        assert_eq!(channel.tick(start + Duration::from_millis(16), &mut devices), Some(1));
        let (report, _) = header(&transport.packets()[1]);
        assert_eq!(report, (ReportType::GAMEPAD | ReportType::KEYBOARD).bits());
    }

    #[test]
    fn simplified_mode_drains_only_controller_frames() {
        let config = InputConfig {
            mode: PacketizerMode::Simplified,
            ..Default::default()
        };
        let (mut channel, transport) = running(config);
        let mut devices = FakeGamepads::with_pad(0, vec![1.0; 17], vec![]);
        channel.add_processed_frame(FrameMetadata::default(), Instant::now());

        // No legacy merge, and metadata is not collected at all.
        assert_eq!(channel.tick(Instant::now(), &mut devices), None);
        assert!(channel.queues().metadata.is_empty());

        channel.press_button_start(0, Button::B);
        assert_eq!(channel.tick(Instant::now(), &mut devices), Some(1));
        let (report, _) = header(&transport.packets()[1]);
        assert_eq!(report, ReportType::GAMEPAD.bits());
    }

    #[test]
    fn simplified_mode_keeps_side_queues_empty() {
        let config = InputConfig {
            mode: PacketizerMode::Simplified,
            mouse_keyboard: true,
            touch: true,
            ..Default::default()
        };
        let (mut channel, _transport) = running(config);
        let mut devices = FakeGamepads::default();
        channel.set_pointer_locked(true);
        let start = Instant::now();
        for i in 0..1000u64 {
            let now = start + Duration::from_millis(i);
            channel.on_pointer_click(&PointerInput::mouse(TouchPhase::Down, 0.0, 0.0, 1));
            channel.on_pointer_move(&PointerInput::mouse(TouchPhase::Move, 1.0, 1.0, 0));
            channel.on_pointer_click(&PointerInput::touch(1, TouchPhase::Down, 5.0, 5.0));
            channel.on_key(now, "KeyW", 87, "w", i % 2 == 0);
            channel.add_processed_frame(FrameMetadata::default(), now);
            channel.tick(now, &mut devices);
        }
        let queues = channel.queues();
        assert!(queues.mouse.is_empty());
        assert!(queues.metadata.is_empty());
        assert!(queues.keyboard.is_empty());
        assert!(queues.pointer.is_empty());
        assert_eq!(channel.sequence(), 0);
    }

    #[test]
    fn nexus_override_stays_out_of_the_legacy_merge() {
        let (mut channel, transport) = running(InputConfig::default());
        let mut devices = FakeGamepads::with_pad(0, vec![0.0; 17], vec![]);
        channel.on_key(Instant::now(), NEXUS_OVERRIDE_KEY, 78, "n", true);
        assert_eq!(channel.tick(Instant::now(), &mut devices), Some(1));
        let packet = &transport.packets()[1];
        let mut body = &packet[PACKET_HEADER_SIZE + 2..];
        assert_eq!(body.get_u16_le(), 0);
    }

    #[test]
    fn processed_frame_metadata_triggers_a_send() {
        let (mut channel, transport) = running(no_legacy());
        let epoch_plus = Instant::now() + Duration::from_millis(250);
        channel.add_processed_frame(
            FrameMetadata {
                server_data_key: 77,
                ..Default::default()
            },
            epoch_plus,
        );
        assert_eq!(channel.tick(epoch_plus, &mut FakeGamepads::default()), Some(1));
        let packet = &transport.packets()[1];
        let (report, _) = header(packet);
        assert_eq!(report, ReportType::METADATA.bits());
        let mut body = &packet[PACKET_HEADER_SIZE..];
        assert_eq!(body.get_u8(), 1);
        assert_eq!(body.get_u32_le(), 77);
        body.advance(12);
        assert!(body.get_u32_le() >= 250);
    }

    #[test]
    fn adhoc_state_is_merged_once() {
        let (mut channel, transport) = running(InputConfig::default());
        let mut devices = FakeGamepads::default();
        let mut adhoc = ControllerFrame::default();
        adhoc.x = 1.0;
        channel.set_adhoc_state(adhoc);

        channel.tick(Instant::now(), &mut devices);
        channel.tick(Instant::now(), &mut devices);
        let packets = transport.packets();
        let mask_of = |packet: &Bytes| {
            let mut body = &packet[PACKET_HEADER_SIZE + 2..];
            body.get_u16_le()
        };
        assert_eq!(mask_of(&packets[1]), Button::X.wire_bit().unwrap());
        assert_eq!(mask_of(&packets[2]), 0);
    }

    #[test]
    fn nexus_override_key_reaches_the_first_controller() {
        let (mut channel, _transport) = running(no_legacy());
        let mut devices = FakeGamepads::with_pad(0, vec![0.0; 17], vec![]);
        channel.on_key(Instant::now(), NEXUS_OVERRIDE_KEY, 78, "n", true);
        channel.poll_physical(&mut devices);
        assert_eq!(channel.queues().controller.len(), 1);
        let mut probe = channel.queues().clone();
        let drained = probe.controller.drain_batch(30);
        assert_eq!(drained[0].nexus, 1.0);
    }

    #[test]
    fn send_failures_are_counted_not_raised() {
        let transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let mut channel =
            InputChannel::new(&no_legacy(), Box::new(transport), None, Instant::now()).unwrap();
        channel.open(Instant::now()).unwrap();
        channel.start().unwrap();
        channel.press_button_start(0, Button::A);
        assert_eq!(channel.tick(Instant::now(), &mut FakeGamepads::default()), Some(1));
        assert_eq!(channel.stats().send_failures, 2);
        assert_eq!(channel.stats().packets_sent, 0);
    }

    #[test]
    fn inbound_vibration_reaches_the_bridge() {
        let bridge = RecordingBridge::default();
        let mut channel = InputChannel::new(
            &InputConfig::default(),
            Box::new(RecordingTransport::default()),
            Some(Box::new(bridge.clone())),
            Instant::now(),
        )
        .unwrap();
        let mut report = vec![ReportType::VIBRATION.bits() as u8, 0, 0, 0, 0, 60, 40, 0, 0];
        report.extend_from_slice(&500u16.to_le_bytes());
        report.extend_from_slice(&0u16.to_le_bytes());
        report.push(0);

        let outcome = channel.on_message(&report, Instant::now(), &mut FakeGamepads::default());
        assert!(matches!(outcome, Some(DispatchOutcome::Forwarded(_))));
        assert_eq!(bridge.posted()[0].message.rumble_data.duration, 50.0);

        let mut devices = FakeGamepads::default();
        assert_eq!(channel.on_message(&[2, 0, 0], Instant::now(), &mut devices), None);
        assert_eq!(channel.on_message(&report[..5], Instant::now(), &mut devices), None);
        assert_eq!(channel.stats().ignored_reports, 2);
    }

    #[test]
    fn closing_cancels_repeat_timers() {
        let config = InputConfig {
            vibration_mode: VibrationMode::Local,
            ..Default::default()
        };
        let (mut channel, _transport) = running(config);
        let mut devices = FakeGamepads::default();
        devices.set_caps(
            0,
            ActuatorCaps {
                dual_rumble: true,
                trigger_rumble: false,
            },
        );
        let mut report = vec![ReportType::VIBRATION.bits() as u8, 0, 0, 0, 0, 50, 50, 0, 0];
        report.extend_from_slice(&100u16.to_le_bytes());
        report.extend_from_slice(&50u16.to_le_bytes());
        report.push(4);
        channel.on_message(&report, Instant::now(), &mut devices);
        assert!(channel.next_rumble_deadline().is_some());

        channel.close();
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.next_rumble_deadline().is_none());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = InputConfig {
            deadzone: 1.0,
            ..Default::default()
        };
        let result = InputChannel::new(
            &config,
            Box::new(RecordingTransport::default()),
            None,
            Instant::now(),
        );
        assert!(result.is_err());
    }
}
