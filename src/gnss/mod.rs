//! GNSS Receiver Sentence Parser
//!
//! This module turns the raw byte stream of a GNSS receiver into a single
//! [`GnssRecord`]. Bytes are fed one at a time through a small state machine
//! that frames sentences, validates their checksum and hands the split fields
//! to a per-sentence handler.
//!
//! # Features
//! - `$`-framed NMEA sentences with a two-digit XOR checksum (GGA, GNS, VTG, HPR, KSXT)
//! - `#`-framed Unicore logs with an eight-digit CRC-32 (INSPVAA, INSPVAXA)
//! - Bounded buffers: overlong sentences and fields are truncated and reported
//! - Counters for processed, rejected, unrecognized and corrupted sentences
//!
//! # Usage
//!
//! ```rust
//! use autosteer_nav::config::NavConfig;
//! use autosteer_nav::gnss::GnssProcessor;
//!
//! let mut gnss = GnssProcessor::new(&NavConfig::default());
//! gnss.process_stream(
//!     b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n",
//!     0,
//! );
//! assert!(gnss.record().is_valid);
//! ```

pub mod fields;
pub mod handlers;
pub mod record;

use tracing::{debug, warn};

use crate::checksum::{crc32_unicore, hex_value, nmea_checksum};
use crate::config::NavConfig;
use crate::io::ByteSource;

pub use fields::{FieldLimits, Fields, NMEA_LIMITS, UNICORE_LIMITS};
pub use handlers::{GPS_LEAP_SECONDS, SentenceKind, utc_hhmmss, utc_seconds_of_day};
pub use record::{FixQuality, GnssRecord, InsAlignment, SentenceMask};

/// A GNSS record older than this is treated as absent
pub const GNSS_TIMEOUT_MS: u64 = 5_000;

/// Line buffer capacity for `$` sentences
pub const NMEA_BUFFER_LEN: usize = 200;

/// Line buffer capacity for `#` Unicore logs
pub const UNICORE_BUFFER_LEN: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    WaitStart,
    ReadData,
    ReadChecksum,
}

/// Framing of the sentence currently being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `$...*HH`
    Nmea,
    /// `#...*HHHHHHHH`
    Unicore,
}

impl Framing {
    fn buffer_len(self) -> usize {
        match self {
            Framing::Nmea => NMEA_BUFFER_LEN,
            Framing::Unicore => UNICORE_BUFFER_LEN,
        }
    }

    fn checksum_digits(self) -> u8 {
        match self {
            Framing::Nmea => 2,
            Framing::Unicore => 8,
        }
    }

    fn limits(self) -> FieldLimits {
        match self {
            Framing::Nmea => NMEA_LIMITS,
            Framing::Unicore => UNICORE_LIMITS,
        }
    }
}

/// Result of feeding one byte to [`GnssProcessor::process_char`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceOutcome {
    /// No sentence completed on this byte
    Pending,
    /// A handler accepted the sentence and updated the record
    Processed { kind: SentenceKind, truncated: bool },
    /// Field 0 named a sentence type with no handler
    Unrecognized,
    /// A known sentence carried too few fields
    Rejected { kind: SentenceKind, fields: usize },
    /// The received checksum did not match the computed one
    ChecksumMismatch { computed: u32, received: u32 },
    /// Line ended inside the checksum; the sentence was discarded
    Aborted,
}

/// Running counters kept by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NmeaStats {
    pub processed: u32,
    pub parse_errors: u32,
    pub checksum_errors: u32,
    pub unrecognized: u32,
    pub truncated: u32,
    /// Sentences processed without a checksum (bare line ending)
    pub unchecked: u32,
    per_kind: [u32; SentenceKind::ALL.len()],
}

impl NmeaStats {
    /// Number of sentences of `kind` successfully handled.
    pub fn count(&self, kind: SentenceKind) -> u32 {
        self.per_kind[kind.index()]
    }
}

/// Byte-at-a-time GNSS sentence parser owning the latest [`GnssRecord`].
#[derive(Debug, Clone)]
pub struct GnssProcessor {
    state: ParseState,
    framing: Framing,
    buffer: Vec<u8>,
    overflowed: bool,
    checksum: u8,
    received: u32,
    digits: u8,
    record: GnssRecord,
    stats: NmeaStats,
    noise_filter: bool,
    debug: bool,
}

impl GnssProcessor {
    /// Creates a parser waiting for the start of a sentence.
    ///
    /// # Arguments
    /// * `config` - Supplies the VTG noise filter and debug flags
    pub fn new(config: &NavConfig) -> Self {
        Self {
            state: ParseState::WaitStart,
            framing: Framing::Nmea,
            buffer: Vec::with_capacity(UNICORE_BUFFER_LEN),
            overflowed: false,
            checksum: 0,
            received: 0,
            digits: 0,
            record: GnssRecord::default(),
            stats: NmeaStats::default(),
            noise_filter: config.noise_filter,
            debug: config.debug,
        }
    }

    pub fn record(&self) -> &GnssRecord {
        &self.record
    }

    pub fn stats(&self) -> &NmeaStats {
        &self.stats
    }

    /// True while the record is valid and a sentence arrived within [`GNSS_TIMEOUT_MS`].
    pub fn has_gps(&self, now_ms: u64) -> bool {
        self.record.is_valid && self.record.is_fresh(now_ms, GNSS_TIMEOUT_MS)
    }

    /// Feeds a single byte into the framing state machine.
    ///
    /// # Arguments
    /// * `c` - Next byte from the receiver
    /// * `now_ms` - Monotonic time stamped on the record if a sentence completes
    pub fn process_char(&mut self, c: u8, now_ms: u64) -> SentenceOutcome {
        match self.state {
            ParseState::WaitStart => {
                match c {
                    b'$' => self.begin(Framing::Nmea),
                    b'#' => self.begin(Framing::Unicore),
                    _ => {}
                }
                SentenceOutcome::Pending
            }
            ParseState::ReadData => match c {
                b'*' => {
                    self.state = ParseState::ReadChecksum;
                    self.received = 0;
                    self.digits = 0;
                    SentenceOutcome::Pending
                }
                b'\r' | b'\n' => {
                    self.state = ParseState::WaitStart;
                    self.stats.unchecked += 1;
                    self.dispatch(now_ms)
                }
                _ => {
                    if self.framing == Framing::Nmea {
                        self.checksum ^= c;
                    }
                    if self.buffer.len() < self.framing.buffer_len() {
                        self.buffer.push(c);
                    } else {
                        self.overflowed = true;
                    }
                    SentenceOutcome::Pending
                }
            },
            ParseState::ReadChecksum => {
                if c == b'\r' || c == b'\n' {
                    self.state = ParseState::WaitStart;
                    self.stats.parse_errors += 1;
                    debug!("line ended inside checksum, sentence dropped");
                    return SentenceOutcome::Aborted;
                }
                let Some(nibble) = hex_value(c) else {
                    return SentenceOutcome::Pending;
                };
                self.received = (self.received << 4) | u32::from(nibble);
                self.digits += 1;
                if self.digits < self.framing.checksum_digits() {
                    return SentenceOutcome::Pending;
                }

                self.state = ParseState::WaitStart;
                let computed = match self.framing {
                    Framing::Nmea => u32::from(self.checksum),
                    Framing::Unicore => crc32_unicore(&self.buffer),
                };
                if computed != self.received {
                    self.stats.checksum_errors += 1;
                    warn!(
                        "GNSS checksum mismatch: computed {computed:X}, received {:X}",
                        self.received
                    );
                    return SentenceOutcome::ChecksumMismatch {
                        computed,
                        received: self.received,
                    };
                }
                self.dispatch(now_ms)
            }
        }
    }

    /// Feeds a slice of bytes, returning the number of sentences a handler accepted.
    pub fn process_stream(&mut self, bytes: &[u8], now_ms: u64) -> usize {
        bytes
            .iter()
            .filter(|&&c| matches!(self.process_char(c, now_ms), SentenceOutcome::Processed { .. }))
            .count()
    }

    /// Reads at most one byte from `source` and feeds it to the parser.
    pub fn poll(&mut self, source: &mut impl ByteSource, now_ms: u64) -> SentenceOutcome {
        match source.read_byte() {
            Some(c) => self.process_char(c, now_ms),
            None => SentenceOutcome::Pending,
        }
    }

    fn begin(&mut self, framing: Framing) {
        self.framing = framing;
        self.state = ParseState::ReadData;
        self.buffer.clear();
        self.overflowed = false;
        self.checksum = 0;
    }

    fn dispatch(&mut self, now_ms: u64) -> SentenceOutcome {
        let fields = Fields::split(&self.buffer, self.framing.limits());
        let truncated = self.overflowed || fields.truncated();

        let Some(kind) = SentenceKind::classify(fields.get(0)) else {
            self.stats.unrecognized += 1;
            if self.debug {
                debug!(sentence = fields.get(0), "unrecognized sentence");
            }
            return SentenceOutcome::Unrecognized;
        };

        if !handlers::apply(kind, &fields, &mut self.record, self.noise_filter) {
            self.stats.parse_errors += 1;
            if self.debug {
                debug!(?kind, fields = fields.len(), "sentence has too few fields");
            }
            return SentenceOutcome::Rejected {
                kind,
                fields: fields.len(),
            };
        }

        self.record.last_update_ms = now_ms;
        self.stats.processed += 1;
        self.stats.per_kind[kind.index()] += 1;
        if truncated {
            self.stats.truncated += 1;
        }
        if self.debug {
            debug!(
                ?kind,
                fix = self.record.fix_quality,
                lat = self.record.latitude,
                lon = self.record.longitude,
                truncated,
                "sentence processed"
            );
        }
        SentenceOutcome::Processed { kind, truncated }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::VecDeque;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    fn processor() -> GnssProcessor {
        GnssProcessor::new(&NavConfig::default())
    }

    fn nmea_frame(body: &str) -> Vec<u8> {
        format!("${body}*{:02X}\r\n", nmea_checksum(body.as_bytes())).into_bytes()
    }

    fn unicore_frame(body: &str) -> Vec<u8> {
        format!("#{body}*{:08x}\r\n", crc32_unicore(body.as_bytes())).into_bytes()
    }

    fn feed(gnss: &mut GnssProcessor, bytes: &[u8], now_ms: u64) -> Vec<SentenceOutcome> {
        bytes
            .iter()
            .map(|&c| gnss.process_char(c, now_ms))
            .filter(|o| *o != SentenceOutcome::Pending)
            .collect()
    }

    #[test]
    fn test_gga_sentence_is_processed() {
        let mut gnss = processor();
        let outcomes = feed(&mut gnss, GGA, 1_000);
        assert_eq!(
            outcomes,
            vec![SentenceOutcome::Processed {
                kind: SentenceKind::Gga,
                truncated: false
            }]
        );

        let record = gnss.record();
        assert_abs_diff_eq!(record.latitude, 48.1173, epsilon = 1e-6);
        assert_eq!(record.num_satellites, 8);
        assert_eq!(record.last_update_ms, 1_000);
        assert_eq!(gnss.stats().processed, 1);
        assert_eq!(gnss.stats().count(SentenceKind::Gga), 1);
        assert!(gnss.has_gps(1_000));
    }

    #[test]
    fn test_same_sentence_twice_leaves_same_record() {
        let mut gnss = processor();
        gnss.process_stream(GGA, 0);
        let first = gnss.record().clone();
        gnss.process_stream(GGA, 0);
        assert_eq!(*gnss.record(), first);
        assert_eq!(gnss.stats().processed, 2);
    }

    #[test]
    fn test_corrupted_checksum_leaves_record_untouched() {
        let mut gnss = processor();
        let corrupted = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48\r\n";
        let outcomes = feed(&mut gnss, corrupted, 0);
        assert_eq!(
            outcomes,
            vec![SentenceOutcome::ChecksumMismatch {
                computed: 0x47,
                received: 0x48
            }]
        );
        assert_eq!(*gnss.record(), GnssRecord::default());
        assert_eq!(gnss.stats().checksum_errors, 1);
        assert_eq!(gnss.stats().processed, 0);
    }

    #[test]
    fn test_lowercase_checksum_accepted() {
        let mut gnss = processor();
        let body = "GPVTG,054.7,T,034.4,M,005.5,N,010.2,K";
        let sentence = format!("${body}*{:02x}\r\n", nmea_checksum(body.as_bytes()));
        assert_eq!(gnss.process_stream(sentence.as_bytes(), 0), 1);
    }

    #[test]
    fn test_bare_line_ending_skips_checksum() {
        let mut gnss = processor();
        let outcomes = feed(&mut gnss, b"$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K\r\n", 0);
        assert_eq!(
            outcomes,
            vec![SentenceOutcome::Processed {
                kind: SentenceKind::Vtg,
                truncated: false
            }]
        );
        assert_eq!(gnss.stats().unchecked, 1);
        assert!(gnss.record().has_velocity);
    }

    #[test]
    fn test_line_end_inside_checksum_aborts() {
        let mut gnss = processor();
        let outcomes = feed(&mut gnss, b"$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K*4\r\n", 0);
        assert_eq!(outcomes, vec![SentenceOutcome::Aborted]);
        assert!(!gnss.record().has_velocity);
        assert_eq!(gnss.stats().parse_errors, 1);
    }

    #[test]
    fn test_noise_before_start_is_ignored() {
        let mut gnss = processor();
        let mut bytes = b"garbage\r\n\x00\xff".to_vec();
        bytes.extend_from_slice(GGA);
        assert_eq!(gnss.process_stream(&bytes, 0), 1);
    }

    #[test]
    fn test_unrecognized_sentence_is_not_a_parse_error() {
        let mut gnss = processor();
        let rmc = nmea_frame("GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        let outcomes = feed(&mut gnss, &rmc, 0);
        assert_eq!(outcomes, vec![SentenceOutcome::Unrecognized]);
        assert_eq!(gnss.stats().unrecognized, 1);
        assert_eq!(gnss.stats().parse_errors, 0);
    }

    #[test]
    fn test_short_sentence_is_rejected() {
        let mut gnss = processor();
        let outcomes = feed(&mut gnss, &nmea_frame("GPGGA,123519,4807.038,N"), 0);
        assert_eq!(
            outcomes,
            vec![SentenceOutcome::Rejected {
                kind: SentenceKind::Gga,
                fields: 4
            }]
        );
        assert_eq!(gnss.stats().parse_errors, 1);
        assert!(!gnss.record().is_valid);
    }

    #[test]
    fn test_overlong_sentence_is_truncated_not_dropped() {
        let mut gnss = processor();
        let body = format!(
            "GPVTG,054.7,T,034.4,M,005.5,N,010.2,K,{}",
            "9".repeat(NMEA_BUFFER_LEN)
        );
        let outcomes = feed(&mut gnss, &nmea_frame(&body), 0);
        assert_eq!(
            outcomes,
            vec![SentenceOutcome::Processed {
                kind: SentenceKind::Vtg,
                truncated: true
            }]
        );
        assert_eq!(gnss.stats().truncated, 1);
        assert_abs_diff_eq!(gnss.record().speed_knots, 5.5);
    }

    #[test]
    fn test_hpr_then_gga_keeps_dual_heading() {
        let mut gnss = processor();
        gnss.process_stream(&nmea_frame("GNHPR,123519.00,90.5,2.5,0.0,4,12"), 0);
        gnss.process_stream(GGA, 10);
        assert!(gnss.record().has_dual_heading);
        assert_abs_diff_eq!(gnss.record().dual_heading, 90.5);
    }

    #[test]
    fn test_unicore_inspvaa_with_crc() {
        let mut gnss = processor();
        let body = "INSPVAA,COM1,0,55.0,FINE,2300,302418.000,0,0,18;\
                    2300,302418.000,52.1234567,5.7654321,45.20,0.0,0.0,0.0,\
                    1.5,-2.25,181.0,INS_SOLUTION_GOOD";
        let outcomes = feed(&mut gnss, &unicore_frame(body), 500);
        assert_eq!(
            outcomes,
            vec![SentenceOutcome::Processed {
                kind: SentenceKind::Inspvaa,
                truncated: false
            }]
        );
        let record = gnss.record();
        assert!(record.has_ins);
        assert_eq!(record.fix_quality, 4);
        assert_eq!(record.fix_time, 120_000);
        assert!(record.seen.contains(SentenceMask::INSPVAA));
    }

    #[test]
    fn test_unchecked_inspvaa_with_huge_seconds_is_handled() {
        let mut gnss = processor();
        let sentence = "#INSPVAA,COM1,0,55.0,FINE,2300,9999999999,0,0,18;\
                        2300,9999999999,52.0,5.0,45.0,0,0,0,0,0,0,INS_SOLUTION_GOOD\r\n";
        let outcomes = feed(&mut gnss, sentence.as_bytes(), 0);
        assert_eq!(
            outcomes,
            vec![SentenceOutcome::Processed {
                kind: SentenceKind::Inspvaa,
                truncated: false
            }]
        );
        assert_eq!(gnss.stats().unchecked, 1);
        assert_eq!(gnss.record().fix_time, 174_621);
    }

    #[test]
    fn test_unicore_inspvaxa_is_recognized() {
        let mut gnss = processor();
        let body = "INSPVAXA,COM1,0,66.5,FINESTEERING,2300,302418.400,00000000,0000,68;\
                    INS_SOLUTION_GOOD,INS_RTKFIXED,40.07891234,116.23658912,60.12,-9.80,\
                    3.0,4.0,0.1,1.5,-2.25,181.0,0,\
                    0.012,0.013,0.025,0.001,0.002,0.003,00000000,0,0";
        let outcomes = feed(&mut gnss, &unicore_frame(body), 0);
        assert_eq!(
            outcomes,
            vec![SentenceOutcome::Processed {
                kind: SentenceKind::Inspvaxa,
                truncated: false
            }]
        );
        assert_eq!(gnss.stats().unrecognized, 0);
        assert_eq!(gnss.stats().count(SentenceKind::Inspvaxa), 1);
        assert!(gnss.record().has_ins);
    }

    #[test]
    fn test_unicore_bad_crc_is_rejected() {
        let mut gnss = processor();
        let sentence = b"#INSPVAA,COM1,0;2300,1.0*deadbeef\r\n";
        let outcomes = feed(&mut gnss, sentence, 0);
        assert!(matches!(
            outcomes.as_slice(),
            [SentenceOutcome::ChecksumMismatch {
                received: 0xDEAD_BEEF,
                ..
            }]
        ));
        assert!(!gnss.record().has_ins);
    }

    #[test]
    fn test_gps_goes_stale() {
        let mut gnss = processor();
        gnss.process_stream(GGA, 1_000);
        assert!(gnss.has_gps(5_999));
        assert!(!gnss.has_gps(6_000));
    }

    #[test]
    fn test_poll_reads_one_byte() {
        let mut gnss = processor();
        let mut source: VecDeque<u8> = GGA.iter().copied().collect();
        let mut processed = 0;
        for _ in 0..GGA.len() {
            if let SentenceOutcome::Processed { .. } = gnss.poll(&mut source, 0) {
                processed += 1;
            }
        }
        assert_eq!(processed, 1);
        assert!(source.is_empty());
    }
}
