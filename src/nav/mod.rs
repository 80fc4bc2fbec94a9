//! Fusion of the GNSS and IMU records into one outbound sentence per tick.
//!
//! The selector runs at a fixed cadence. A record without a fix produces
//! nothing, a receiver that reports dual-antenna heading (or an integrated
//! INS) produces `$PAOGI`, and everything else produces `$PANDA` with the
//! IMU attitude attached when a valid sample is available.

pub mod message;

use tracing::{debug, info, warn};

use crate::config::{NavConfig, clamp_interval};
use crate::gnss::{GNSS_TIMEOUT_MS, GnssRecord, utc_hhmmss};
use crate::imu::ImuRecord;
use crate::io::SentenceSink;

pub use message::{
    FixBlock, MessageKind, NO_IMU_PITCH, NO_IMU_ROLL, OutboundMessage, PaogiFields, PandaFields,
    frame_sentence, to_nmea_coordinate,
};

/// Counters for the outbound side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavStats {
    pub panda_sent: u32,
    pub paogi_sent: u32,
    /// Ticks where the GNSS record had no usable fix
    pub skipped_no_fix: u32,
    pub send_errors: u32,
    /// Monotonic milliseconds of the last sentence handed to the sink
    pub last_sent_ms: u64,
}

/// Builds and emits `$PANDA` / `$PAOGI` sentences at a fixed interval.
#[derive(Debug, Clone)]
pub struct NavProcessor {
    interval_ms: u64,
    last_tick_ms: u64,
    last_kind: MessageKind,
    stats: NavStats,
    debug: bool,
}

impl NavProcessor {
    /// Creates a processor using the configured (clamped) interval.
    ///
    /// # Arguments
    /// * `config` - Supplies the message interval and the debug flag
    pub fn new(config: &NavConfig) -> Self {
        Self {
            interval_ms: config.message_interval(),
            last_tick_ms: 0,
            last_kind: MessageKind::None,
            stats: NavStats::default(),
            debug: config.debug,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Overrides the message interval, clamped to 10..=1000 ms.
    pub fn set_interval(&mut self, ms: u64) {
        self.interval_ms = clamp_interval(ms);
        info!(interval_ms = self.interval_ms, "message interval set");
    }

    pub fn stats(&self) -> &NavStats {
        &self.stats
    }

    /// Kind of the last message built.
    pub fn last_kind(&self) -> MessageKind {
        self.last_kind
    }

    /// Runs one transmission tick.
    ///
    /// Returns `None` when the interval has not elapsed since the previous
    /// tick. Otherwise the tick time is recorded (late ticks are not caught
    /// up) and the built message is returned, including
    /// [`OutboundMessage::None`] when nothing could be sent.
    ///
    /// # Arguments
    /// * `now_ms` - Monotonic milliseconds
    /// * `gnss` - Latest GNSS record
    /// * `imu` - Latest IMU record, if an IMU is attached
    /// * `sink` - Receiver of the rendered sentence
    pub fn tick(
        &mut self,
        now_ms: u64,
        gnss: &GnssRecord,
        imu: Option<&ImuRecord>,
        sink: &mut impl SentenceSink,
    ) -> Option<OutboundMessage> {
        if now_ms.saturating_sub(self.last_tick_ms) < self.interval_ms {
            return None;
        }
        self.last_tick_ms = now_ms;

        let message = if gnss.is_fresh(now_ms, GNSS_TIMEOUT_MS) {
            self.build(now_ms, gnss, imu)
        } else {
            OutboundMessage::None
        };

        let kind = message.kind();
        if kind != self.last_kind {
            info!(from = ?self.last_kind, to = ?kind, "outbound message type changed");
            self.last_kind = kind;
        }

        let Some(sentence) = message.sentence() else {
            self.stats.skipped_no_fix += 1;
            return Some(message);
        };

        match sink.send(&sentence) {
            Ok(()) => {
                match kind {
                    MessageKind::Panda => self.stats.panda_sent += 1,
                    MessageKind::Paogi => self.stats.paogi_sent += 1,
                    MessageKind::None => {}
                }
                self.stats.last_sent_ms = now_ms;
                if self.debug {
                    debug!(sentence = sentence.trim_end(), "sentence sent");
                }
            }
            Err(e) => {
                self.stats.send_errors += 1;
                warn!("Failed to send {kind:?} sentence: {e}");
            }
        }
        Some(message)
    }

    /// Builds the message for `gnss` without touching the cadence or the sink.
    ///
    /// # Arguments
    /// * `now_ms` - Monotonic milliseconds, supplies the fractional second
    /// * `gnss` - Latest GNSS record
    /// * `imu` - Latest IMU record; ignored unless `is_valid`
    pub fn build(&self, now_ms: u64, gnss: &GnssRecord, imu: Option<&ImuRecord>) -> OutboundMessage {
        let imu = imu.filter(|record| record.is_valid);
        match select(gnss) {
            MessageKind::None => OutboundMessage::None,
            MessageKind::Panda => OutboundMessage::Panda(panda_fields(now_ms, gnss, imu)),
            MessageKind::Paogi => OutboundMessage::Paogi(paogi_fields(now_ms, gnss, imu)),
        }
    }
}

/// Chooses the sentence for a GNSS record.
pub fn select(gnss: &GnssRecord) -> MessageKind {
    if !gnss.is_valid {
        MessageKind::None
    } else if gnss.has_dual_heading {
        MessageKind::Paogi
    } else {
        MessageKind::Panda
    }
}

/// `fix_time` with the local clock's fractional second.
fn local_time(now_ms: u64, gnss: &GnssRecord) -> f64 {
    f64::from(gnss.fix_time) + (now_ms % 1000) as f64 / 1000.0
}

/// UTC from the receiver's GPS week and seconds, keeping its fractional
/// second. Falls back to [`local_time`] until GPS time has been reported.
fn receiver_time(now_ms: u64, gnss: &GnssRecord) -> f64 {
    if gnss.gps_week > 0 && gnss.gps_seconds > 0.0 {
        f64::from(utc_hhmmss(gnss.gps_seconds)) + gnss.gps_seconds.fract()
    } else {
        local_time(now_ms, gnss)
    }
}

fn fix_block(time: f64, gnss: &GnssRecord) -> FixBlock {
    FixBlock {
        time,
        latitude: gnss.latitude,
        longitude: gnss.longitude,
        fix_quality: gnss.fix_quality,
        num_satellites: gnss.num_satellites,
        hdop: gnss.hdop,
        altitude: gnss.altitude,
    }
}

fn panda_fields(now_ms: u64, gnss: &GnssRecord, imu: Option<&ImuRecord>) -> PandaFields {
    let (roll_x10, pitch_x10, yaw_rate) = match imu {
        Some(imu) => (
            (imu.roll * 10.0).round() as i32,
            (imu.pitch * 10.0).round() as i32,
            imu.yaw_rate,
        ),
        None => (NO_IMU_ROLL, NO_IMU_PITCH, 0.0),
    };

    PandaFields {
        fix: fix_block(local_time(now_ms, gnss), gnss),
        age_of_correction: gnss.age_of_correction,
        speed_knots: gnss.speed_knots,
        heading_x10: (gnss.heading_true * 10.0).trunc() as i32,
        roll_x10,
        pitch_x10,
        yaw_rate,
    }
}

fn paogi_fields(now_ms: u64, gnss: &GnssRecord, imu: Option<&ImuRecord>) -> PaogiFields {
    // Receiver INS pitch wins over the external IMU
    let (pitch, yaw_rate) = if gnss.has_ins {
        (gnss.ins_pitch.round() as i32, 0.0)
    } else if let Some(imu) = imu {
        (imu.pitch.round() as i32, imu.yaw_rate)
    } else {
        (0, 0.0)
    };

    PaogiFields {
        fix: fix_block(receiver_time(now_ms, gnss), gnss),
        age_of_correction: gnss.age_of_correction,
        speed_knots: gnss.speed_knots,
        dual_heading: gnss.dual_heading,
        dual_roll: gnss.dual_roll.round() as i32,
        pitch,
        yaw_rate,
    }
}
