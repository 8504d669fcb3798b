//! Cooperative session loop.
//!
//! Everything runs on one task: transport events, host commands, the
//! packetizer tick, the physical poll loop, the hot-plug poll and rumble
//! replays are all arms of a single `select!`, so channel state is never
//! shared across threads.

use std::time::Duration;

use anyhow::Result;
use stratus_common::{InputConfig, PacketizerMode, VibrationMode};
use stratus_core::{Button, ControllerFrame, FrameMetadata, MAX_GAMEPADS};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::channel::{ChannelState, ChannelStats, InputChannel};
use crate::devices::{presence, GamepadProvider, PointerAction, PointerInput};
use crate::hotplug::HotplugMonitor;
use crate::transport::{ControlChannel, TransportEvent};

/// Requests from the embedding host.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    PressButton { index: u8, button: Button },
    ReleaseButton { index: u8, button: Button },
    MoveLeftStick { index: u8, x: f32, y: f32 },
    MoveRightStick { index: u8, x: f32, y: f32 },
    Key {
        code: String,
        key_code: u16,
        key: String,
        pressed: bool,
    },
    PointerClick(PointerInput),
    PointerMove(PointerInput),
    PointerLocked(bool),
    ProcessedFrame(FrameMetadata),
    AdhocState(ControllerFrame),
    SetVibration(bool),
    SetRumbleEnabled(bool),
    SetVibrationMode(VibrationMode),
    SetLegacyKeyboard(bool),
    Stop,
}

/// Outcome reported when the loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub stats: ChannelStats,
    pub sequence: u32,
    pub final_state: ChannelState,
}

pub struct InputSession {
    channel: InputChannel,
    devices: Box<dyn GamepadProvider>,
    control: Box<dyn ControlChannel>,
    hotplug: HotplugMonitor,
    tick_period: Duration,
    poll_period: Duration,
    hotplug_period: Duration,
    physical_polling: bool,
    lock_requests: Option<mpsc::UnboundedSender<()>>,
}

impl InputSession {
    pub fn new(
        config: &InputConfig,
        channel: InputChannel,
        devices: Box<dyn GamepadProvider>,
        control: Box<dyn ControlChannel>,
    ) -> Self {
        Self {
            channel,
            devices,
            control,
            hotplug: HotplugMonitor::default(),
            tick_period: Duration::from_millis(config.tick_interval_ms()),
            poll_period: Duration::from_millis(config.poll_interval_ms()),
            hotplug_period: Duration::from_millis(config.hotplug_interval_ms),
            physical_polling: config.physical_polling && config.mode == PacketizerMode::Primary,
            lock_requests: None,
        }
    }

    /// Notified whenever a click asks the host to lock the pointer.
    pub fn with_lock_requests(mut self, tx: mpsc::UnboundedSender<()>) -> Self {
        self.lock_requests = Some(tx);
        self
    }

    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<SessionSummary> {
        let mut tick = time::interval(self.tick_period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut poll = time::interval(self.poll_period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut hotplug = time::interval(self.hotplug_period);
        hotplug.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let running = self.channel.state() == ChannelState::Running;
            let rumble_deadline = self.channel.next_rumble_deadline();

            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(TransportEvent::Open) => self.on_open(&mut tick, &mut hotplug),
                        Some(TransportEvent::Message(payload)) => {
                            let now = Instant::now().into_std();
                            self.channel.on_message(&payload, now, self.devices.as_mut());
                        }
                        Some(TransportEvent::Error(err)) => {
                            warn!("transport error: {err}");
                            self.channel.close();
                            break;
                        }
                        Some(TransportEvent::Closed) | None => {
                            info!("transport closed");
                            self.channel.close();
                            break;
                        }
                    }
                }
                Some(command) = commands.recv() => {
                    if matches!(command, SessionCommand::Stop) {
                        if let Err(err) = self.channel.stop() {
                            debug!("stop: {err}");
                        }
                        self.channel.close();
                        break;
                    }
                    self.apply(command);
                }
                _ = tick.tick(), if running => {
                    self.channel.tick(Instant::now().into_std(), self.devices.as_mut());
                }
                _ = poll.tick(), if running && self.physical_polling => {
                    self.channel.poll_physical(self.devices.as_mut());
                }
                _ = hotplug.tick(), if running => {
                    let present = presence(self.devices.as_mut(), MAX_GAMEPADS);
                    self.hotplug.poll(&present, self.control.as_mut());
                }
                _ = sleep_until_deadline(rumble_deadline), if rumble_deadline.is_some() => {
                    self.channel
                        .fire_rumble_repeats(Instant::now().into_std(), self.devices.as_mut());
                }
            }
        }

        Ok(SessionSummary {
            stats: self.channel.stats(),
            sequence: self.channel.sequence(),
            final_state: self.channel.state(),
        })
    }

    fn on_open(&mut self, tick: &mut time::Interval, hotplug: &mut time::Interval) {
        let now = Instant::now().into_std();
        let started = self
            .channel
            .open(now)
            .and_then(|_| self.channel.start());
        match started {
            Ok(_) => {
                tick.reset();
                hotplug.reset();
                self.hotplug.reset();
            }
            Err(err) => warn!("ignoring transport open: {err}"),
        }
    }

    fn apply(&mut self, command: SessionCommand) {
        let now = Instant::now().into_std();
        match command {
            SessionCommand::PressButton { index, button } => {
                self.channel.press_button_start(index, button)
            }
            SessionCommand::ReleaseButton { index, button } => {
                self.channel.press_button_end(index, button)
            }
            SessionCommand::MoveLeftStick { index, x, y } => {
                self.channel.move_left_stick(index, x, y)
            }
            SessionCommand::MoveRightStick { index, x, y } => {
                self.channel.move_right_stick(index, x, y)
            }
            SessionCommand::Key {
                code,
                key_code,
                key,
                pressed,
            } => self.channel.on_key(now, &code, key_code, &key, pressed),
            SessionCommand::PointerClick(input) => {
                if let Some(PointerAction::RequestLock) = self.channel.on_pointer_click(&input) {
                    if let Some(tx) = &self.lock_requests {
                        let _ = tx.send(());
                    }
                }
            }
            SessionCommand::PointerMove(input) => self.channel.on_pointer_move(&input),
            SessionCommand::PointerLocked(locked) => self.channel.set_pointer_locked(locked),
            SessionCommand::ProcessedFrame(metadata) => {
                self.channel.add_processed_frame(metadata, now)
            }
            SessionCommand::AdhocState(frame) => self.channel.set_adhoc_state(frame),
            SessionCommand::SetVibration(enabled) => self.channel.set_vibration(enabled),
            SessionCommand::SetRumbleEnabled(enabled) => self.channel.set_rumble_enabled(enabled),
            SessionCommand::SetVibrationMode(mode) => self.channel.set_vibration_mode(mode),
            SessionCommand::SetLegacyKeyboard(enabled) => self.channel.set_legacy_keyboard(enabled),
            SessionCommand::Stop => {}
        }
    }
}

async fn sleep_until_deadline(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
