//! Latest GNSS reading, mutated in place by the sentence handlers.

use bitflags::bitflags;

/// Default HDOP before any sentence has reported one
pub const DEFAULT_HDOP: f32 = 99.9;

/// Fix quality in the GGA numbering.
///
/// GNS mode letters and KSXT qualities are mapped into this scheme by their
/// handlers. The simulator mode shares code 4 with RTK fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    Invalid,
    Gps,
    Differential,
    RtkFixed,
    RtkFloat,
    DeadReckoning,
    Other(u8),
}

impl From<u8> for FixQuality {
    fn from(value: u8) -> Self {
        match value {
            0 => FixQuality::Invalid,
            1 => FixQuality::Gps,
            2 => FixQuality::Differential,
            4 => FixQuality::RtkFixed,
            5 => FixQuality::RtkFloat,
            6 => FixQuality::DeadReckoning,
            other => FixQuality::Other(other),
        }
    }
}

/// Alignment state reported by an integrated INS receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsAlignment {
    #[default]
    Inactive,
    Aligning,
    SolutionGood,
    Unknown,
}

bitflags! {
    /// Sentence types seen since start-up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SentenceMask: u8 {
        const GGA = 1 << 0;
        const VTG = 1 << 1;
        const GNS = 1 << 2;
        const INSPVAXA = 1 << 3;
        const HPR = 1 << 5;
        const KSXT = 1 << 6;
        const INSPVAA = 1 << 7;
    }
}

/// Structured GNSS state built from the receiver stream.
#[derive(Debug, Clone, PartialEq)]
pub struct GnssRecord {
    /// Latitude in decimal degrees, negative south
    pub latitude: f64,
    /// Longitude in decimal degrees, negative west
    pub longitude: f64,
    /// Altitude above mean sea level in meters
    pub altitude: f32,
    /// UTC time of fix packed as HHMMSS
    pub fix_time: u32,
    /// Raw fix quality code (see [`FixQuality`])
    pub fix_quality: u8,
    pub num_satellites: u8,
    pub hdop: f32,
    /// Seconds since the last differential correction, 0 when unknown
    pub age_of_correction: u16,
    pub speed_knots: f32,
    /// Course over ground, degrees true
    pub heading_true: f32,

    pub dual_heading: f32,
    pub dual_roll: f32,
    /// Heading solution quality, 0 = no solution
    pub heading_quality: u8,

    pub ins_pitch: f32,
    pub ins_roll: f32,
    pub ins_heading: f32,
    pub north_velocity: f32,
    pub east_velocity: f32,
    pub up_velocity: f32,
    pub ins_alignment: InsAlignment,
    pub gps_week: u16,
    /// GPS seconds of week, fraction kept
    pub gps_seconds: f64,
    /// Latitude, longitude and height standard deviation in meters
    pub position_std_dev: [f32; 3],
    /// North, east and up velocity standard deviation in m/s
    pub velocity_std_dev: [f32; 3],

    pub is_valid: bool,
    pub has_position: bool,
    pub has_velocity: bool,
    /// Sticky: once a heading/roll sentence is seen it stays set
    pub has_dual_heading: bool,
    pub has_ins: bool,
    pub seen: SentenceMask,

    /// Monotonic milliseconds of the last successfully handled sentence
    pub last_update_ms: u64,
}

impl Default for GnssRecord {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            fix_time: 0,
            fix_quality: 0,
            num_satellites: 0,
            hdop: DEFAULT_HDOP,
            age_of_correction: 0,
            speed_knots: 0.0,
            heading_true: 0.0,
            dual_heading: 0.0,
            dual_roll: 0.0,
            heading_quality: 0,
            ins_pitch: 0.0,
            ins_roll: 0.0,
            ins_heading: 0.0,
            north_velocity: 0.0,
            east_velocity: 0.0,
            up_velocity: 0.0,
            ins_alignment: InsAlignment::default(),
            gps_week: 0,
            gps_seconds: 0.0,
            position_std_dev: [0.0; 3],
            velocity_std_dev: [0.0; 3],
            is_valid: false,
            has_position: false,
            has_velocity: false,
            has_dual_heading: false,
            has_ins: false,
            seen: SentenceMask::empty(),
            last_update_ms: 0,
        }
    }
}

impl GnssRecord {
    pub fn fix(&self) -> FixQuality {
        FixQuality::from(self.fix_quality)
    }

    /// Milliseconds since the last handled sentence.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_update_ms)
    }

    /// True when a sentence has been handled within `window_ms`.
    pub fn is_fresh(&self, now_ms: u64, window_ms: u64) -> bool {
        !self.seen.is_empty() && self.age_ms(now_ms) < window_ms
    }

    pub(crate) fn set_position_quality(&mut self, quality: u8) {
        self.fix_quality = quality;
        self.has_position = quality > 0;
        self.is_valid = self.has_position;
    }
}
