//! Owner of the active IMU parser and its [`ImuRecord`].

use tracing::{debug, info};

use super::easy_profile::EasyProfileParser;
use super::rvc::RvcParser;
use super::{IMU_QUALITY_GOOD, ImuKind, ImuRecord, PacketOutcome, PacketStats};
use crate::config::NavConfig;
use crate::io::ByteSource;

/// The one parser bound to the IMU port.
#[derive(Debug, Clone)]
pub enum ActiveImu {
    Rvc(RvcParser),
    EasyProfile(EasyProfileParser),
}

impl ActiveImu {
    fn process_byte(&mut self, byte: u8, now_ms: u64) -> PacketOutcome {
        match self {
            ActiveImu::Rvc(parser) => parser.process_byte(byte, now_ms),
            ActiveImu::EasyProfile(parser) => parser.process_byte(byte, now_ms),
        }
    }

    fn is_valid(&self, now_ms: u64) -> bool {
        match self {
            ActiveImu::Rvc(parser) => parser.is_valid(now_ms),
            ActiveImu::EasyProfile(parser) => parser.is_valid(now_ms),
        }
    }

    fn stats(&self) -> &PacketStats {
        match self {
            ActiveImu::Rvc(parser) => parser.stats(),
            ActiveImu::EasyProfile(parser) => parser.stats(),
        }
    }

    /// Heading, pitch, roll and yaw rate of the latest sample.
    fn orientation(&self) -> (f32, f32, f32, f32) {
        match self {
            ActiveImu::Rvc(parser) => (parser.yaw(), parser.pitch(), parser.roll(), parser.yaw_rate()),
            ActiveImu::EasyProfile(parser) => (parser.yaw(), parser.pitch(), parser.roll(), 0.0),
        }
    }
}

/// Drains the IMU byte stream and keeps the latest orientation sample.
#[derive(Debug, Clone)]
pub struct ImuProcessor {
    kind: ImuKind,
    active: ActiveImu,
    record: ImuRecord,
    debug: bool,
}

impl ImuProcessor {
    /// Creates a processor bound to one IMU family.
    ///
    /// # Arguments
    /// * `kind` - IMU family wired to the port, decided by the caller
    /// * `config` - Supplies the axis swap, roll negation and debug flags
    pub fn new(kind: ImuKind, config: &NavConfig) -> Self {
        let active = match kind {
            ImuKind::Rvc => ActiveImu::Rvc(RvcParser::new(config.imu_swap_xy)),
            ImuKind::EasyProfile => {
                ActiveImu::EasyProfile(EasyProfileParser::new(config.imu_negate_roll))
            }
        };
        info!(%kind, "IMU processor started");
        Self {
            kind,
            active,
            record: ImuRecord::default(),
            debug: config.debug,
        }
    }

    pub fn kind(&self) -> ImuKind {
        self.kind
    }

    pub fn active(&self) -> &ActiveImu {
        &self.active
    }

    /// Reads every byte currently buffered in `source`.
    ///
    /// Each accepted sample refreshes the record. Returns the number of
    /// samples accepted during this call.
    pub fn service(&mut self, source: &mut impl ByteSource, now_ms: u64) -> usize {
        let mut samples = 0;
        while let Some(byte) = source.read_byte() {
            match self.active.process_byte(byte, now_ms) {
                PacketOutcome::Sample => {
                    self.refresh(now_ms);
                    samples += 1;
                }
                PacketOutcome::Pending => {}
                other => {
                    if self.debug {
                        debug!(kind = %self.kind, outcome = ?other, "IMU packet not used");
                    }
                }
            }
        }
        samples
    }

    fn refresh(&mut self, now_ms: u64) {
        let (heading, pitch, roll, yaw_rate) = self.active.orientation();
        self.record = ImuRecord {
            heading,
            pitch,
            roll,
            yaw_rate,
            quality: IMU_QUALITY_GOOD,
            timestamp_ms: now_ms,
            is_valid: true,
        };
        if self.debug {
            debug!(heading, pitch, roll, yaw_rate, "IMU sample");
        }
    }

    /// Latest record with validity and quality judged against `now_ms`.
    pub fn record(&self, now_ms: u64) -> ImuRecord {
        let is_valid = self.active.is_valid(now_ms);
        ImuRecord {
            is_valid,
            quality: if is_valid { IMU_QUALITY_GOOD } else { 0 },
            ..self.record
        }
    }

    pub fn stats(&self) -> &PacketStats {
        self.active.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{additive_checksum, crc16_modbus};
    use approx::assert_abs_diff_eq;
    use std::collections::VecDeque;

    fn rvc_frame(yaw: i16, pitch: i16, roll: i16) -> Vec<u8> {
        let mut bytes = vec![0xAA, 0xAA, 0x00];
        bytes.extend_from_slice(&yaw.to_le_bytes());
        bytes.extend_from_slice(&pitch.to_le_bytes());
        bytes.extend_from_slice(&roll.to_le_bytes());
        bytes.resize(18, 0);
        let sum = additive_checksum(&bytes[2..]);
        bytes.push(sum);
        bytes
    }

    fn easy_profile_packet(roll: f32, pitch: f32, yaw: f32) -> Vec<u8> {
        let mut bytes = vec![0xAA, 0x55, 20, 0x23, 0, 0, 0, 0, 0, 0, 0];
        bytes.extend_from_slice(&roll.to_le_bytes());
        bytes.extend_from_slice(&pitch.to_le_bytes());
        bytes.extend_from_slice(&yaw.to_le_bytes());
        let crc = crc16_modbus(&bytes[2..]);
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes
    }

    #[test]
    fn test_rvc_sample_fills_record() {
        let mut imu = ImuProcessor::new(ImuKind::Rvc, &NavConfig::default());
        let mut source: VecDeque<u8> = rvc_frame(4_500, 150, -250).into();
        assert_eq!(imu.service(&mut source, 200), 1);
        assert!(source.is_empty());

        let record = imu.record(200);
        assert!(record.is_valid);
        assert_eq!(record.quality, 10);
        assert_abs_diff_eq!(record.heading, 45.0);
        assert_abs_diff_eq!(record.pitch, 1.5);
        assert_abs_diff_eq!(record.roll, -2.5);
        assert_abs_diff_eq!(record.yaw_rate, 450.0);
        assert_eq!(record.timestamp_ms, 200);
    }

    #[test]
    fn test_easy_profile_sample_has_no_yaw_rate() {
        let mut imu = ImuProcessor::new(ImuKind::EasyProfile, &NavConfig::default());
        let mut source: VecDeque<u8> = easy_profile_packet(3.0, -1.0, 90.0).into();
        assert_eq!(imu.service(&mut source, 0), 1);

        let record = imu.record(0);
        assert_abs_diff_eq!(record.roll, -3.0);
        assert_abs_diff_eq!(record.heading, 90.0);
        assert_eq!(record.yaw_rate, 0.0);
    }

    #[test]
    fn test_service_drains_multiple_packets() {
        let mut imu = ImuProcessor::new(ImuKind::Rvc, &NavConfig::default());
        let mut bytes = rvc_frame(100, 0, 0);
        bytes.extend(rvc_frame(200, 0, 0));
        bytes.extend(rvc_frame(300, 0, 0));
        let mut source: VecDeque<u8> = bytes.into();
        assert_eq!(imu.service(&mut source, 0), 3);
        assert_abs_diff_eq!(imu.record(0).heading, 3.0);
        assert_eq!(imu.stats().samples, 3);
    }

    #[test]
    fn test_windows_differ_after_101_ms() {
        let config = NavConfig::default();
        let mut rvc = ImuProcessor::new(ImuKind::Rvc, &config);
        let mut easy = ImuProcessor::new(ImuKind::EasyProfile, &config);

        rvc.service(&mut VecDeque::from(rvc_frame(0, 0, 0)), 0);
        easy.service(&mut VecDeque::from(easy_profile_packet(0.0, 0.0, 0.0)), 0);

        let rvc_record = rvc.record(101);
        assert!(!rvc_record.is_valid);
        assert_eq!(rvc_record.quality, 0);
        assert!(easy.record(101).is_valid);
        assert!(!easy.record(500).is_valid);
    }

    #[test]
    fn test_invalid_before_any_sample() {
        let imu = ImuProcessor::new(ImuKind::EasyProfile, &NavConfig::default());
        let record = imu.record(0);
        assert!(!record.is_valid);
        assert_eq!(record.quality, 0);
    }
}
