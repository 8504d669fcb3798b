//! Core Stratus input protocol types, framing, and constants.
//!
//! This crate provides:
//! - The canonical frame model shared by every input source
//! - Outbound input packet encoding (header, section mask, sections)
//! - Inbound report decoding (vibration commands)

#![forbid(unsafe_code)]

pub mod frame;
pub mod packet;
pub mod vibration;

pub use frame::{
    Axis, Button, ControllerFrame, FrameMetadata, KeyboardFrame, MouseFrame, MouseMode,
    PointerFrame, TouchPhase, TouchSample, UnknownLabel,
};
pub use packet::{encode_client_metadata, encode_input_packet, PacketSections};
pub use vibration::{
    decode_inbound, DecodeError, InboundReport, RumbleCommand, RumbleData, RumbleType,
};

/// Gamepad slots addressable by the remote host.
pub const MAX_GAMEPADS: usize = 4;

/// Touch points announced in the client-metadata handshake.
pub const DEFAULT_MAX_TOUCHPOINTS: u8 = 2;

bitflags::bitflags! {
    /// Leading report-type mask. Outbound packets OR together the sections
    /// they carry; inbound reports carry a single tag in their first byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReportType: u16 {
        const METADATA = 1;
        const GAMEPAD = 2;
        const POINTER = 4;
        const CLIENT_METADATA = 8;
        const SERVER_METADATA = 16;
        const MOUSE = 32;
        const KEYBOARD = 64;
        const VIBRATION = 128;
        const SENSOR = 256;
    }
}
