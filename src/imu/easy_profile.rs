//! EasyProfile IMU packet parser.
//!
//! Packet layout:
//!
//! ```text
//! AA 55 | size | payload (size bytes) | crc16 (LE)
//! ```
//!
//! The payload starts with four payload-info bytes whose low seven bits of
//! the first byte are the object ID. Only the roll/pitch/yaw object (ID 0x23,
//! 20-byte payload) produces samples:
//!
//! ```text
//! info (4) | timestamp u32 LE | roll f32 LE | pitch f32 LE | yaw f32 LE
//! ```
//!
//! The CRC-16/Modbus covers the size byte and the payload.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use super::{PacketOutcome, PacketStats};
use crate::checksum::crc16_modbus;

pub const EASY_PROFILE_HEADER1: u8 = 0xAA;
pub const EASY_PROFILE_HEADER2: u8 = 0x55;

/// Roll/pitch/yaw object
pub const RPY_OBJECT_ID: u8 = 0x23;
pub const RPY_PAYLOAD_SIZE: usize = 20;

pub const MAX_PACKET_LEN: usize = 128;

/// Header, size byte and CRC around the payload
const FRAME_OVERHEAD: usize = 5;

/// Largest payload that fits in [`MAX_PACKET_LEN`]
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_LEN - FRAME_OVERHEAD;

/// A sample older than this is stale
pub const EASY_PROFILE_WINDOW_MS: u64 = 500;

const PAYLOAD_INFO_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitHeader1,
    WaitHeader2,
    WaitSize,
    WaitPayloadInfo,
    CollectData,
}

/// Byte-at-a-time parser for EasyProfile packets.
#[derive(Debug, Clone)]
pub struct EasyProfileParser {
    state: State,
    buffer: [u8; MAX_PACKET_LEN],
    index: usize,
    expected_size: usize,
    info_bytes: usize,
    roll: f32,
    pitch: f32,
    yaw: f32,
    timestamp: u32,
    data_valid: bool,
    last_valid_ms: u64,
    negate_roll: bool,
    stats: PacketStats,
}

impl EasyProfileParser {
    /// Creates a parser waiting for a packet header.
    ///
    /// # Arguments
    /// * `negate_roll` - Report roll with the opposite sign (inverted mounting)
    pub fn new(negate_roll: bool) -> Self {
        Self {
            state: State::WaitHeader1,
            buffer: [0; MAX_PACKET_LEN],
            index: 0,
            expected_size: 0,
            info_bytes: 0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            timestamp: 0,
            data_valid: false,
            last_valid_ms: 0,
            negate_roll,
            stats: PacketStats::default(),
        }
    }

    /// Feeds one byte from the IMU.
    ///
    /// # Arguments
    /// * `byte` - Next byte from the serial stream
    /// * `now_ms` - Monotonic time recorded when a sample is accepted
    pub fn process_byte(&mut self, byte: u8, now_ms: u64) -> PacketOutcome {
        let outcome = self.step(byte, now_ms);
        self.stats.record(outcome);
        outcome
    }

    fn step(&mut self, byte: u8, now_ms: u64) -> PacketOutcome {
        match self.state {
            State::WaitHeader1 => {
                if byte == EASY_PROFILE_HEADER1 {
                    self.buffer[0] = byte;
                    self.index = 1;
                    self.state = State::WaitHeader2;
                }
                PacketOutcome::Pending
            }
            State::WaitHeader2 => {
                if byte == EASY_PROFILE_HEADER2 {
                    self.buffer[1] = byte;
                    self.index = 2;
                    self.state = State::WaitSize;
                } else {
                    self.reset();
                }
                PacketOutcome::Pending
            }
            State::WaitSize => {
                let size = usize::from(byte);
                if size > MAX_PAYLOAD_SIZE {
                    debug!(size, "EasyProfile size exceeds packet buffer");
                    self.reset();
                    return PacketOutcome::FramingError;
                }
                self.push(byte);
                self.expected_size = size;
                if size == RPY_PAYLOAD_SIZE {
                    self.info_bytes = 0;
                    self.state = State::WaitPayloadInfo;
                } else {
                    self.state = State::CollectData;
                }
                PacketOutcome::Pending
            }
            State::WaitPayloadInfo => {
                self.push(byte);
                self.info_bytes += 1;
                if self.info_bytes >= PAYLOAD_INFO_LEN {
                    self.state = State::CollectData;
                }
                PacketOutcome::Pending
            }
            State::CollectData => {
                self.push(byte);
                self.complete_if_full(now_ms)
            }
        }
    }

    fn push(&mut self, byte: u8) {
        self.buffer[self.index] = byte;
        self.index += 1;
    }

    fn complete_if_full(&mut self, now_ms: u64) -> PacketOutcome {
        if self.index < FRAME_OVERHEAD + self.expected_size {
            return PacketOutcome::Pending;
        }
        let outcome = self.process_packet(now_ms);
        self.reset();
        outcome
    }

    fn process_packet(&mut self, now_ms: u64) -> PacketOutcome {
        let end = self.index;
        let computed = crc16_modbus(&self.buffer[2..end - 2]);
        let received = LittleEndian::read_u16(&self.buffer[end - 2..end]);
        if computed != received {
            warn!(
                "EasyProfile CRC error: computed {computed:04X}, received {received:04X}"
            );
            return PacketOutcome::ChecksumError { computed, received };
        }

        let object_id = self.buffer[3] & 0x7F;
        if object_id != RPY_OBJECT_ID || self.expected_size != RPY_PAYLOAD_SIZE {
            return PacketOutcome::Ignored { object_id };
        }

        let timestamp = LittleEndian::read_u32(&self.buffer[7..11]);
        let roll = LittleEndian::read_f32(&self.buffer[11..15]);
        let pitch = LittleEndian::read_f32(&self.buffer[15..19]);
        let yaw = LittleEndian::read_f32(&self.buffer[19..23]);

        if !in_range(roll, pitch, yaw) {
            debug!(roll, pitch, yaw, "EasyProfile sample out of range");
            return PacketOutcome::RangeRejected;
        }

        self.timestamp = timestamp;
        self.roll = roll;
        self.pitch = pitch;
        self.yaw = yaw;
        self.data_valid = true;
        self.last_valid_ms = now_ms;
        debug!(timestamp, roll, pitch, yaw, "EasyProfile RPY sample");
        PacketOutcome::Sample
    }

    fn reset(&mut self) {
        self.state = State::WaitHeader1;
        self.index = 0;
        self.expected_size = 0;
        self.info_bytes = 0;
    }

    /// Roll in degrees, sign flipped when negation is enabled.
    pub fn roll(&self) -> f32 {
        if self.negate_roll { -self.roll } else { self.roll }
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Device timestamp of the last sample, in microseconds.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// True when a sample was accepted less than [`EASY_PROFILE_WINDOW_MS`] ago.
    pub fn is_valid(&self, now_ms: u64) -> bool {
        self.data_valid && now_ms.saturating_sub(self.last_valid_ms) < EASY_PROFILE_WINDOW_MS
    }

    pub fn last_valid_ms(&self) -> u64 {
        self.last_valid_ms
    }

    pub fn set_negate_roll(&mut self, negate: bool) {
        self.negate_roll = negate;
    }

    pub fn stats(&self) -> &PacketStats {
        &self.stats
    }
}

fn in_range(roll: f32, pitch: f32, yaw: f32) -> bool {
    [roll, pitch, yaw].iter().all(|v| v.is_finite())
        && roll.abs() <= 180.0
        && pitch.abs() <= 90.0
        && yaw.abs() <= 360.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use byteorder::WriteBytesExt;

    fn packet(object_id: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![EASY_PROFILE_HEADER1, EASY_PROFILE_HEADER2];
        bytes.push(u8::try_from(payload.len() + PAYLOAD_INFO_LEN).unwrap());
        bytes.extend_from_slice(&[object_id, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(payload);
        let crc = crc16_modbus(&bytes[2..]);
        bytes.write_u16::<LittleEndian>(crc).unwrap();
        bytes
    }

    fn rpy_packet(roll: f32, pitch: f32, yaw: f32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.write_u32::<LittleEndian>(123_456).unwrap();
        payload.write_f32::<LittleEndian>(roll).unwrap();
        payload.write_f32::<LittleEndian>(pitch).unwrap();
        payload.write_f32::<LittleEndian>(yaw).unwrap();
        packet(RPY_OBJECT_ID, &payload)
    }

    fn feed(parser: &mut EasyProfileParser, bytes: &[u8], now_ms: u64) -> PacketOutcome {
        let mut last = PacketOutcome::Pending;
        for &b in bytes {
            let outcome = parser.process_byte(b, now_ms);
            if outcome != PacketOutcome::Pending {
                last = outcome;
            }
        }
        last
    }

    #[test]
    fn test_rpy_packet_is_sampled() {
        let mut parser = EasyProfileParser::new(false);
        let bytes = rpy_packet(5.5, -3.25, 271.0);
        assert_eq!(bytes.len(), 25);
        assert_eq!(feed(&mut parser, &bytes, 40), PacketOutcome::Sample);
        assert_abs_diff_eq!(parser.roll(), 5.5);
        assert_abs_diff_eq!(parser.pitch(), -3.25);
        assert_abs_diff_eq!(parser.yaw(), 271.0);
        assert_eq!(parser.timestamp(), 123_456);
        assert_eq!(parser.last_valid_ms(), 40);
    }

    #[test]
    fn test_roll_negation_at_accessor() {
        let mut parser = EasyProfileParser::new(true);
        feed(&mut parser, &rpy_packet(5.5, 0.0, 0.0), 0);
        assert_abs_diff_eq!(parser.roll(), -5.5);
        parser.set_negate_roll(false);
        assert_abs_diff_eq!(parser.roll(), 5.5);
    }

    #[test]
    fn test_object_id_uses_low_seven_bits() {
        let mut parser = EasyProfileParser::new(false);
        let mut payload = vec![0u8; 16];
        payload[4..8].copy_from_slice(&10.0f32.to_le_bytes());
        let bytes = packet(RPY_OBJECT_ID | 0x80, &payload);
        assert_eq!(feed(&mut parser, &bytes, 0), PacketOutcome::Sample);
        assert_abs_diff_eq!(parser.roll(), 10.0);
    }

    #[test]
    fn test_other_objects_are_ignored() {
        let mut parser = EasyProfileParser::new(false);
        let outcome = feed(&mut parser, &packet(0x22, &[0u8; 16]), 0);
        assert_eq!(outcome, PacketOutcome::Ignored { object_id: 0x22 });

        let outcome = feed(&mut parser, &packet(RPY_OBJECT_ID, &[0u8; 8]), 0);
        assert_eq!(
            outcome,
            PacketOutcome::Ignored {
                object_id: RPY_OBJECT_ID
            }
        );
        assert!(!parser.is_valid(0));
        assert_eq!(parser.stats().ignored, 2);
    }

    #[test]
    fn test_crc_mismatch_is_reported() {
        let mut parser = EasyProfileParser::new(false);
        let mut bytes = rpy_packet(1.0, 2.0, 3.0);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let outcome = feed(&mut parser, &bytes, 0);
        assert!(matches!(outcome, PacketOutcome::ChecksumError { .. }));
        assert!(!parser.is_valid(0));
        assert_eq!(parser.stats().checksum_errors, 1);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut parser = EasyProfileParser::new(false);
        assert_eq!(
            feed(&mut parser, &rpy_packet(181.0, 0.0, 0.0), 0),
            PacketOutcome::RangeRejected
        );
        assert_eq!(
            feed(&mut parser, &rpy_packet(0.0, 90.5, 0.0), 0),
            PacketOutcome::RangeRejected
        );
        assert_eq!(
            feed(&mut parser, &rpy_packet(0.0, 0.0, f32::NAN), 0),
            PacketOutcome::RangeRejected
        );
        assert_eq!(
            feed(&mut parser, &rpy_packet(0.0, 0.0, f32::INFINITY), 0),
            PacketOutcome::RangeRejected
        );
        assert!(!parser.is_valid(0));
        assert_eq!(parser.stats().range_rejected, 4);
    }

    #[test]
    fn test_oversized_length_is_framing_error() {
        let mut parser = EasyProfileParser::new(false);
        let outcome = feed(&mut parser, &[0xAA, 0x55, 0xFF], 0);
        assert_eq!(outcome, PacketOutcome::FramingError);

        // Parser is back at header hunt
        assert_eq!(
            feed(&mut parser, &rpy_packet(1.0, 1.0, 1.0), 0),
            PacketOutcome::Sample
        );
    }

    #[test]
    fn test_zero_length_packet() {
        let mut parser = EasyProfileParser::new(false);
        let mut bytes = vec![0xAA, 0x55, 0x00];
        let crc = crc16_modbus(&[0x00]);
        bytes.write_u16::<LittleEndian>(crc).unwrap();
        assert!(matches!(
            feed(&mut parser, &bytes, 0),
            PacketOutcome::Ignored { .. }
        ));
    }

    #[test]
    fn test_validity_window() {
        let mut parser = EasyProfileParser::new(false);
        feed(&mut parser, &rpy_packet(1.0, 1.0, 1.0), 1_000);
        assert!(parser.is_valid(1_101));
        assert!(parser.is_valid(1_499));
        assert!(!parser.is_valid(1_500));
    }
}
