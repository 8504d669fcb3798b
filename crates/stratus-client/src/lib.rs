//! Stratus input engine.
//!
//! Collects controller, keyboard, pointer and on-screen input, merges it into
//! per-slot controller frames and packetizes everything onto the input data
//! channel. Inbound vibration reports are decoded and routed to local
//! actuators or the embedding host shell.

#![forbid(unsafe_code)]

pub mod channel;
pub mod devices;
pub mod gilrs_backend;
pub mod hotplug;
pub mod merge;
pub mod net;
pub mod normalize;
pub mod queue;
pub mod rumble;
pub mod session;
pub mod transport;

pub use channel::{ChannelError, ChannelState, ChannelStats, InputChannel};
pub use devices::{GamepadProvider, NoGamepads, PointerInput, RawGamepad};
pub use gilrs_backend::GilrsDevices;
pub use hotplug::{HotplugEvent, HotplugMonitor};
pub use normalize::{normalize_axis, AxisNormalizer};
pub use rumble::{DispatchOutcome, RumbleDispatcher};
pub use session::{InputSession, SessionCommand, SessionSummary};
pub use transport::{
    BridgeEnvelope, BridgeMessageType, ControlChannel, GamepadChanged, HostBridge, InputTransport,
    TransportEvent,
};
