//! Inertial measurement unit parsers.
//!
//! Two binary IMU families are supported. Exactly one parser is active at a
//! time, chosen from outside through [`ImuKind`]:
//!
//! - [`rvc::RvcParser`]: fixed 19-byte frames with an additive checksum and a
//!   100 ms validity window.
//! - [`easy_profile::EasyProfileParser`]: variable-length packets with a
//!   CRC-16/Modbus trailer and a 500 ms validity window.

pub mod easy_profile;
pub mod processor;
pub mod rvc;

use std::fmt;
use std::str::FromStr;

use crate::error::UnknownImuKind;

pub use easy_profile::EasyProfileParser;
pub use processor::{ActiveImu, ImuProcessor};
pub use rvc::RvcParser;

/// Quality reported while the IMU record is valid
pub const IMU_QUALITY_GOOD: u8 = 10;

/// Latest orientation reading from the active IMU.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuRecord {
    /// Yaw in degrees, 0 to 360
    pub heading: f32,
    /// Degrees
    pub pitch: f32,
    /// Degrees
    pub roll: f32,
    /// Degrees per second, always 0 for EasyProfile devices
    pub yaw_rate: f32,
    /// 10 while valid, 0 otherwise
    pub quality: u8,
    /// Monotonic milliseconds of the last accepted sample
    pub timestamp_ms: u64,
    pub is_valid: bool,
}

/// IMU family selected for the serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImuKind {
    Rvc,
    EasyProfile,
}

impl ImuKind {
    /// Validity window of the family, in milliseconds.
    pub fn window_ms(self) -> u64 {
        match self {
            ImuKind::Rvc => rvc::RVC_WINDOW_MS,
            ImuKind::EasyProfile => easy_profile::EASY_PROFILE_WINDOW_MS,
        }
    }
}

impl fmt::Display for ImuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImuKind::Rvc => write!(f, "rvc"),
            ImuKind::EasyProfile => write!(f, "easy-profile"),
        }
    }
}

impl FromStr for ImuKind {
    type Err = UnknownImuKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rvc" => Ok(ImuKind::Rvc),
            "easy-profile" | "easyprofile" | "easy_profile" => Ok(ImuKind::EasyProfile),
            _ => Err(UnknownImuKind(s.to_string())),
        }
    }
}

/// Result of feeding one byte to an IMU parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Frame still being collected (or waiting for a header)
    Pending,
    /// A valid orientation sample was accepted
    Sample,
    /// A valid packet that carries no orientation sample
    Ignored { object_id: u8 },
    /// Frame structure was inconsistent; parser resynchronised
    FramingError,
    ChecksumError { computed: u16, received: u16 },
    /// Values outside the physical range were discarded
    RangeRejected,
}

/// Per-parser packet counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketStats {
    /// Complete frames seen, whatever their fate
    pub packets: u32,
    pub samples: u32,
    pub checksum_errors: u32,
    pub framing_errors: u32,
    pub ignored: u32,
    pub range_rejected: u32,
}

impl PacketStats {
    pub(crate) fn record(&mut self, outcome: PacketOutcome) {
        match outcome {
            PacketOutcome::Pending => return,
            PacketOutcome::Sample => self.samples += 1,
            PacketOutcome::Ignored { .. } => self.ignored += 1,
            PacketOutcome::FramingError => {
                self.framing_errors += 1;
                return;
            }
            PacketOutcome::ChecksumError { .. } => self.checksum_errors += 1,
            PacketOutcome::RangeRejected => self.range_rejected += 1,
        }
        self.packets += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imu_kind_from_str() {
        assert_eq!("rvc".parse::<ImuKind>(), Ok(ImuKind::Rvc));
        assert_eq!("Easy-Profile".parse::<ImuKind>(), Ok(ImuKind::EasyProfile));
        assert!("bno".parse::<ImuKind>().is_err());
        assert_eq!(ImuKind::EasyProfile.to_string(), "easy-profile");
    }

    #[test]
    fn test_windows_differ_per_family() {
        assert_eq!(ImuKind::Rvc.window_ms(), 100);
        assert_eq!(ImuKind::EasyProfile.window_ms(), 500);
    }

    #[test]
    fn test_stats_count_complete_packets_only() {
        let mut stats = PacketStats::default();
        stats.record(PacketOutcome::Pending);
        stats.record(PacketOutcome::Sample);
        stats.record(PacketOutcome::ChecksumError {
            computed: 1,
            received: 2,
        });
        stats.record(PacketOutcome::FramingError);
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.checksum_errors, 1);
        assert_eq!(stats.framing_errors, 1);
    }
}
