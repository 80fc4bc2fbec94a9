//! RVC-mode IMU frame parser.
//!
//! Frame layout (19 bytes):
//!
//! ```text
//! AA AA | index | yaw (i16 LE) | pitch (i16 LE) | roll (i16 LE) | 10 bytes | sum
//! ```
//!
//! Angles are sent in hundredths of a degree. The trailing byte is the
//! additive sum of the 16 bytes after the header.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use super::{PacketOutcome, PacketStats};
use crate::checksum::additive_checksum;

pub const RVC_HEADER: u8 = 0xAA;

/// Header, payload and checksum
pub const RVC_FRAME_LEN: usize = 19;

/// Header and payload, without the checksum byte
pub const RVC_DATA_LEN: usize = 18;

/// A sample older than this is stale
pub const RVC_WINDOW_MS: u64 = 100;

/// Samples accumulated into the yaw rate before it restarts from zero
pub const YAW_RATE_BLOCK: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitHeader1,
    WaitHeader2,
    CollectData,
    WaitChecksum,
}

/// Byte-at-a-time parser for RVC frames.
#[derive(Debug, Clone)]
pub struct RvcParser {
    state: State,
    buffer: [u8; RVC_FRAME_LEN],
    index: usize,
    yaw_x10: i16,
    pitch_x10: i16,
    roll_x10: i16,
    prev_yaw: i16,
    ang_vel: i16,
    ang_counter: u8,
    data_valid: bool,
    last_valid_ms: u64,
    swap_xy: bool,
    stats: PacketStats,
}

impl RvcParser {
    /// Creates a parser waiting for a frame header.
    ///
    /// # Arguments
    /// * `swap_xy` - Exchange pitch and roll after scaling (alternate mounting)
    pub fn new(swap_xy: bool) -> Self {
        Self {
            state: State::WaitHeader1,
            buffer: [0; RVC_FRAME_LEN],
            index: 0,
            yaw_x10: 0,
            pitch_x10: 0,
            roll_x10: 0,
            prev_yaw: 0,
            ang_vel: 0,
            ang_counter: 0,
            data_valid: false,
            last_valid_ms: 0,
            swap_xy,
            stats: PacketStats::default(),
        }
    }

    /// Feeds one byte from the IMU.
    ///
    /// # Arguments
    /// * `byte` - Next byte from the serial stream
    /// * `now_ms` - Monotonic time recorded when a frame is accepted
    pub fn process_byte(&mut self, byte: u8, now_ms: u64) -> PacketOutcome {
        let outcome = self.step(byte, now_ms);
        self.stats.record(outcome);
        outcome
    }

    fn step(&mut self, byte: u8, now_ms: u64) -> PacketOutcome {
        match self.state {
            State::WaitHeader1 => {
                if byte == RVC_HEADER {
                    self.buffer[0] = byte;
                    self.index = 1;
                    self.state = State::WaitHeader2;
                }
                PacketOutcome::Pending
            }
            State::WaitHeader2 => {
                if byte == RVC_HEADER {
                    self.buffer[1] = byte;
                    self.index = 2;
                    self.state = State::CollectData;
                } else {
                    self.reset();
                }
                PacketOutcome::Pending
            }
            State::CollectData => {
                if self.index >= RVC_DATA_LEN {
                    self.reset();
                    return PacketOutcome::FramingError;
                }
                self.buffer[self.index] = byte;
                self.index += 1;
                if self.index >= RVC_DATA_LEN {
                    self.state = State::WaitChecksum;
                }
                PacketOutcome::Pending
            }
            State::WaitChecksum => {
                self.buffer[RVC_DATA_LEN] = byte;
                let computed = additive_checksum(&self.buffer[2..RVC_DATA_LEN]);
                self.reset();

                if computed != byte {
                    return PacketOutcome::ChecksumError {
                        computed: u16::from(computed),
                        received: u16::from(byte),
                    };
                }
                self.parse_frame();
                self.data_valid = true;
                self.last_valid_ms = now_ms;
                PacketOutcome::Sample
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::WaitHeader1;
        self.index = 0;
    }

    fn parse_frame(&mut self) {
        let raw_yaw = LittleEndian::read_i16(&self.buffer[3..5]);
        let raw_pitch = LittleEndian::read_i16(&self.buffer[5..7]);
        let raw_roll = LittleEndian::read_i16(&self.buffer[7..9]);

        // Block accumulator: sums yaw deltas over 20 frames, then restarts
        // with the previous yaw forced to zero. No wraparound handling.
        if self.ang_counter < YAW_RATE_BLOCK {
            self.ang_vel = self
                .ang_vel
                .wrapping_add(raw_yaw.wrapping_sub(self.prev_yaw));
            self.ang_counter += 1;
            self.prev_yaw = raw_yaw;
        } else {
            self.ang_counter = 0;
            self.prev_yaw = 0;
            self.ang_vel = 0;
        }

        self.yaw_x10 = hundredths_to_tenths(raw_yaw);
        if self.yaw_x10 < 0 {
            self.yaw_x10 += 3600;
        }
        self.pitch_x10 = hundredths_to_tenths(raw_pitch);
        self.roll_x10 = hundredths_to_tenths(raw_roll);

        if self.swap_xy {
            std::mem::swap(&mut self.pitch_x10, &mut self.roll_x10);
        }

        debug!(
            yaw_x10 = self.yaw_x10,
            pitch_x10 = self.pitch_x10,
            roll_x10 = self.roll_x10,
            ang_vel = self.ang_vel,
            "RVC frame"
        );
    }

    /// Yaw in degrees, 0 to 360.
    pub fn yaw(&self) -> f32 {
        f32::from(self.yaw_x10) / 10.0
    }

    pub fn pitch(&self) -> f32 {
        f32::from(self.pitch_x10) / 10.0
    }

    pub fn roll(&self) -> f32 {
        f32::from(self.roll_x10) / 10.0
    }

    /// Accumulated yaw change of the current block, in degrees.
    pub fn yaw_rate(&self) -> f32 {
        f32::from(self.ang_vel) / 10.0
    }

    pub fn yaw_x10(&self) -> i16 {
        self.yaw_x10
    }

    pub fn pitch_x10(&self) -> i16 {
        self.pitch_x10
    }

    pub fn roll_x10(&self) -> i16 {
        self.roll_x10
    }

    pub fn ang_vel(&self) -> i16 {
        self.ang_vel
    }

    /// True when a frame was accepted less than [`RVC_WINDOW_MS`] ago.
    pub fn is_valid(&self, now_ms: u64) -> bool {
        self.data_valid && now_ms.saturating_sub(self.last_valid_ms) < RVC_WINDOW_MS
    }

    pub fn last_valid_ms(&self) -> u64 {
        self.last_valid_ms
    }

    pub fn stats(&self) -> &PacketStats {
        &self.stats
    }
}

/// Hundredths to tenths of a degree, truncating toward zero.
fn hundredths_to_tenths(raw: i16) -> i16 {
    (f32::from(raw) * 0.1) as i16
}
