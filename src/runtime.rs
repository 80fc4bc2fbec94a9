//! Single-threaded control loop owning every parser.

use tracing::info;

use crate::clock::Clock;
use crate::config::NavConfig;
use crate::gnss::GnssProcessor;
use crate::imu::{ImuKind, ImuProcessor, ImuRecord};
use crate::io::{ByteSource, SentenceSink};
use crate::nav::{NavProcessor, OutboundMessage};

/// Owns the GNSS parser, the optional IMU processor and the sentence builder.
#[derive(Debug)]
pub struct ControlLoop<C: Clock> {
    clock: C,
    gnss: GnssProcessor,
    imu: Option<ImuProcessor>,
    nav: NavProcessor,
}

impl<C: Clock> ControlLoop<C> {
    /// Creates the loop with freshly initialised processors.
    ///
    /// # Arguments
    /// * `clock` - Monotonic time source
    /// * `config` - Parser and cadence configuration
    /// * `imu_kind` - IMU family on the IMU port, `None` when no IMU is fitted
    pub fn new(clock: C, config: &NavConfig, imu_kind: Option<ImuKind>) -> Self {
        let imu_name = imu_kind.map_or_else(|| "none".to_string(), |kind| kind.to_string());
        info!(
            imu = %imu_name,
            interval_ms = config.message_interval(),
            "control loop started"
        );
        Self {
            clock,
            gnss: GnssProcessor::new(config),
            imu: imu_kind.map(|kind| ImuProcessor::new(kind, config)),
            nav: NavProcessor::new(config),
        }
    }

    /// One pass of the loop.
    ///
    /// Reads at most one GNSS byte, drains every buffered IMU byte (when an
    /// IMU is fitted), then lets the sentence builder tick.
    pub fn service(
        &mut self,
        gnss_source: &mut impl ByteSource,
        imu_source: &mut impl ByteSource,
        sink: &mut impl SentenceSink,
    ) -> Option<OutboundMessage> {
        let now_ms = self.clock.now_ms();

        self.gnss.poll(gnss_source, now_ms);
        if let Some(imu) = self.imu.as_mut() {
            imu.service(imu_source, now_ms);
        }

        let imu_record = self.imu_record(now_ms);
        self.nav
            .tick(now_ms, self.gnss.record(), imu_record.as_ref(), sink)
    }

    /// IMU record judged against `now_ms`, `None` without an IMU.
    pub fn imu_record(&self, now_ms: u64) -> Option<ImuRecord> {
        self.imu.as_ref().map(|imu| imu.record(now_ms))
    }

    pub fn gnss(&self) -> &GnssProcessor {
        &self.gnss
    }

    pub fn imu(&self) -> Option<&ImuProcessor> {
        self.imu.as_ref()
    }

    pub fn nav(&self) -> &NavProcessor {
        &self.nav
    }

    pub fn nav_mut(&mut self) -> &mut NavProcessor {
        &mut self.nav
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::collections::VecDeque;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    #[test]
    fn test_one_gnss_byte_per_pass() {
        let clock = ManualClock::new(0);
        let mut control = ControlLoop::new(&clock, &NavConfig::default(), None);
        let mut gnss: VecDeque<u8> = GGA.iter().copied().collect();
        let mut imu: VecDeque<u8> = VecDeque::new();
        let mut sink: Vec<String> = Vec::new();

        control.service(&mut gnss, &mut imu, &mut sink);
        assert_eq!(gnss.len(), GGA.len() - 1);

        for _ in 1..GGA.len() {
            control.service(&mut gnss, &mut imu, &mut sink);
        }
        assert!(gnss.is_empty());
        assert!(control.gnss().record().is_valid);
        assert!(sink.is_empty());

        clock.set(100);
        control.service(&mut gnss, &mut imu, &mut sink);
        assert_eq!(sink.len(), 1);
        assert!(sink[0].starts_with("$PANDA,"));
        assert!(control.imu_record(100).is_none());
    }

    #[test]
    fn test_imu_source_untouched_without_imu() {
        let clock = ManualClock::new(0);
        let mut control = ControlLoop::new(&clock, &NavConfig::default(), None);
        let mut gnss: VecDeque<u8> = VecDeque::new();
        let mut imu: VecDeque<u8> = VecDeque::from(vec![0xAA, 0xAA]);
        control.service(&mut gnss, &mut imu, &mut Vec::<String>::new());
        assert_eq!(imu.len(), 2);
    }
}
