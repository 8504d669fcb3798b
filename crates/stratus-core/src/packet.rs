//! Outbound input packet framing.
//!
//! Layout (all little-endian):
//! `[ReportType (2B)][Sequence (4B)][Timestamp ms (8B, f64)]` followed by the
//! populated sections in fixed order: metadata, gamepad, pointer, mouse,
//! keyboard. Each section starts with a one-byte item count.

use bytes::{BufMut, Bytes, BytesMut};

use crate::frame::{ControllerFrame, FrameMetadata, KeyboardFrame, MouseFrame, PointerFrame};
use crate::ReportType;

pub const PACKET_HEADER_SIZE: usize = 14;
pub const METADATA_FRAME_SIZE: usize = 7 * 4;
pub const GAMEPAD_FRAME_SIZE: usize = 23;
pub const TOUCH_SAMPLE_SIZE: usize = 12;
pub const MOUSE_FRAME_SIZE: usize = 10;
/// Longest key label carried on the wire; longer labels are truncated.
pub const MAX_KEY_LABEL_BYTES: usize = 32;
/// Sections carry at most this many items (one-byte count prefix).
pub const MAX_SECTION_ITEMS: usize = u8::MAX as usize;

/// Stick value in `[-1, 1]` to signed 16-bit wire units.
pub fn axis_to_wire(value: f32) -> i16 {
    let scaled = (value * i16::MAX as f32).clamp(-(i16::MAX as f32), i16::MAX as f32);
    scaled as i16
}

/// Trigger value in `[0, 1]` to unsigned 16-bit wire units.
pub fn trigger_to_wire(value: f32) -> u16 {
    if value <= 0.0 {
        return 0;
    }
    (value * u16::MAX as f32).min(u16::MAX as f32) as u16
}

/// Sections carried by a data packet, borrowed from the drained queues.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketSections<'a> {
    pub metadata: &'a [FrameMetadata],
    pub gamepad: &'a [ControllerFrame],
    pub pointer: &'a [PointerFrame],
    pub mouse: &'a [MouseFrame],
    pub keyboard: &'a [KeyboardFrame],
}

impl PacketSections<'_> {
    pub fn report_type(&self) -> ReportType {
        let mut report = ReportType::empty();
        report.set(ReportType::METADATA, !self.metadata.is_empty());
        report.set(ReportType::GAMEPAD, !self.gamepad.is_empty());
        report.set(ReportType::POINTER, !self.pointer.is_empty());
        report.set(ReportType::MOUSE, !self.mouse.is_empty());
        report.set(ReportType::KEYBOARD, !self.keyboard.is_empty());
        report
    }

    fn encoded_len(&self) -> usize {
        let section = |count: usize, item: usize| if count == 0 { 0 } else { 1 + count * item };
        let pointer: usize = self
            .pointer
            .iter()
            .map(|frame| 1 + frame.events.len().min(MAX_SECTION_ITEMS) * TOUCH_SAMPLE_SIZE)
            .sum();
        let keyboard: usize = self
            .keyboard
            .iter()
            .map(|frame| 4 + frame.key.len().min(MAX_KEY_LABEL_BYTES))
            .sum();
        section(self.metadata.len(), METADATA_FRAME_SIZE)
            + section(self.gamepad.len(), GAMEPAD_FRAME_SIZE)
            + if self.pointer.is_empty() { 0 } else { 1 + pointer }
            + section(self.mouse.len(), MOUSE_FRAME_SIZE)
            + if self.keyboard.is_empty() { 0 } else { 1 + keyboard }
    }
}

/// Handshake packet announcing client capabilities. Sent once, before the
/// periodic tick starts.
pub fn encode_client_metadata(sequence: u32, timestamp_ms: f64, max_touchpoints: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(PACKET_HEADER_SIZE + 1);
    put_header(&mut buf, ReportType::CLIENT_METADATA, sequence, timestamp_ms);
    buf.put_u8(max_touchpoints);
    buf.freeze()
}

/// Encode a data packet. Sections beyond [`MAX_SECTION_ITEMS`] entries are
/// truncated; callers drain in far smaller batches.
pub fn encode_input_packet(
    sequence: u32,
    timestamp_ms: f64,
    sections: &PacketSections<'_>,
) -> Bytes {
    let report = sections.report_type();
    let mut buf = BytesMut::with_capacity(PACKET_HEADER_SIZE + sections.encoded_len());
    put_header(&mut buf, report, sequence, timestamp_ms);

    if !sections.metadata.is_empty() {
        let frames = capped(sections.metadata);
        buf.put_u8(frames.len() as u8);
        for frame in frames {
            buf.put_u32_le(frame.server_data_key);
            buf.put_u32_le(frame.first_frame_packet_arrival_time_ms);
            buf.put_u32_le(frame.frame_submitted_time_ms);
            buf.put_u32_le(frame.frame_decoded_time_ms);
            buf.put_u32_le(frame.frame_rendered_time_ms);
            buf.put_u32_le(frame.frame_packet_time);
            buf.put_u32_le(frame.frame_date_now);
        }
    }

    if !sections.gamepad.is_empty() {
        let frames = capped(sections.gamepad);
        buf.put_u8(frames.len() as u8);
        for frame in frames {
            put_gamepad(&mut buf, frame);
        }
    }

    if !sections.pointer.is_empty() {
        let frames = capped(sections.pointer);
        buf.put_u8(frames.len() as u8);
        for frame in frames {
            let events = capped(&frame.events);
            buf.put_u8(events.len() as u8);
            for sample in events {
                buf.put_u8(sample.phase as u8);
                buf.put_u32_le(sample.pointer_id);
                buf.put_u16_le(sample.x);
                buf.put_u16_le(sample.y);
                buf.put_u8(sample.pressure);
                buf.put_u8(sample.width);
                buf.put_u8(sample.height);
            }
        }
    }

    if !sections.mouse.is_empty() {
        let frames = capped(sections.mouse);
        buf.put_u8(frames.len() as u8);
        for frame in frames {
            buf.put_i16_le(saturate_i16(frame.x));
            buf.put_i16_le(saturate_i16(frame.y));
            buf.put_i16_le(saturate_i16(frame.wheel_x));
            buf.put_i16_le(saturate_i16(frame.wheel_y));
            buf.put_u8(frame.buttons);
            buf.put_u8(frame.mode as u8);
        }
    }

    if !sections.keyboard.is_empty() {
        let frames = capped(sections.keyboard);
        buf.put_u8(frames.len() as u8);
        for frame in frames {
            let label = truncate_label(&frame.key);
            buf.put_u8(frame.pressed as u8);
            buf.put_u16_le(frame.key_code);
            buf.put_u8(label.len() as u8);
            buf.put_slice(label.as_bytes());
        }
    }

    buf.freeze()
}

fn put_header(buf: &mut BytesMut, report: ReportType, sequence: u32, timestamp_ms: f64) {
    buf.put_u16_le(report.bits());
    buf.put_u32_le(sequence);
    buf.put_f64_le(timestamp_ms);
}

fn put_gamepad(buf: &mut BytesMut, frame: &ControllerFrame) {
    buf.put_u8(frame.gamepad_index);
    buf.put_u16_le(frame.button_mask());
    // Remote expects Y up.
    buf.put_i16_le(axis_to_wire(frame.left_thumb_x_axis));
    buf.put_i16_le(axis_to_wire(-frame.left_thumb_y_axis));
    buf.put_i16_le(axis_to_wire(frame.right_thumb_x_axis));
    buf.put_i16_le(axis_to_wire(-frame.right_thumb_y_axis));
    buf.put_u16_le(trigger_to_wire(frame.left_trigger));
    buf.put_u16_le(trigger_to_wire(frame.right_trigger));
    // Physicality words are reserved by the remote and always zero here.
    buf.put_u32_le(0);
    buf.put_u32_le(0);
}

fn capped<T>(items: &[T]) -> &[T] {
    &items[..items.len().min(MAX_SECTION_ITEMS)]
}

fn saturate_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn truncate_label(label: &str) -> &str {
    if label.len() <= MAX_KEY_LABEL_BYTES {
        return label;
    }
    let mut end = MAX_KEY_LABEL_BYTES;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    &label[..end]
}
