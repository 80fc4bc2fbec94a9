//! Outbound `$PANDA` / `$PAOGI` sentences.

use std::fmt::Write as _;

use crate::checksum::nmea_checksum;

/// IMU roll reported in `$PANDA` when no IMU sample is valid
pub const NO_IMU_ROLL: i32 = 65_535;

/// IMU pitch reported in `$PANDA` when no IMU sample is valid
pub const NO_IMU_PITCH: i32 = -1;

/// Sentence chosen for one transmission tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    None,
    Panda,
    Paogi,
}

/// Time, position and quality block shared by both sentences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixBlock {
    /// HHMMSS.s, the fraction from the receiver's GPS time or the local clock
    pub time: f64,
    /// Decimal degrees, negative south
    pub latitude: f64,
    /// Decimal degrees, negative west
    pub longitude: f64,
    pub fix_quality: u8,
    pub num_satellites: u8,
    pub hdop: f32,
    pub altitude: f32,
}

/// Single-antenna sentence with optional IMU attitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PandaFields {
    pub fix: FixBlock,
    /// Seconds, rendered blank when 0
    pub age_of_correction: u16,
    pub speed_knots: f32,
    /// True heading in tenths of a degree, truncated
    pub heading_x10: i32,
    /// Tenths of a degree, or [`NO_IMU_ROLL`]
    pub roll_x10: i32,
    /// Tenths of a degree, or [`NO_IMU_PITCH`]
    pub pitch_x10: i32,
    pub yaw_rate: f32,
}

/// Dual-antenna sentence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaogiFields {
    pub fix: FixBlock,
    pub age_of_correction: u16,
    pub speed_knots: f32,
    /// Degrees, not scaled
    pub dual_heading: f32,
    /// Whole degrees
    pub dual_roll: i32,
    /// Whole degrees, 0 when no source is available
    pub pitch: i32,
    pub yaw_rate: f32,
}

/// Message built for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutboundMessage {
    Panda(PandaFields),
    Paogi(PaogiFields),
    None,
}

impl OutboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            OutboundMessage::Panda(_) => MessageKind::Panda,
            OutboundMessage::Paogi(_) => MessageKind::Paogi,
            OutboundMessage::None => MessageKind::None,
        }
    }

    /// Sentence body between `$` and `*`.
    pub fn body(&self) -> Option<String> {
        match self {
            OutboundMessage::Panda(fields) => Some(fields.body()),
            OutboundMessage::Paogi(fields) => Some(fields.body()),
            OutboundMessage::None => None,
        }
    }

    /// Complete sentence with checksum and CRLF, `None` when nothing is sent.
    pub fn sentence(&self) -> Option<String> {
        self.body().map(|body| frame_sentence(&body))
    }
}

impl FixBlock {
    fn write_to(&self, out: &mut String) {
        let (lat, lat_hemi) = to_nmea_coordinate(self.latitude, 'N', 'S');
        let (lon, lon_hemi) = to_nmea_coordinate(self.longitude, 'E', 'W');
        let _ = write!(
            out,
            "{:.1},{:011.6},{},{:012.6},{},{},{},{:.1},{:.3}",
            self.time,
            lat,
            lat_hemi,
            lon,
            lon_hemi,
            self.fix_quality,
            self.num_satellites,
            self.hdop,
            self.altitude
        );
    }
}

impl PandaFields {
    pub fn body(&self) -> String {
        let mut out = String::from("PANDA,");
        self.fix.write_to(&mut out);
        out.push(',');
        if self.age_of_correction != 0 {
            let _ = write!(out, "{:.1}", f32::from(self.age_of_correction));
        }
        let _ = write!(
            out,
            ",{:.3},{},{},{},{:.2}",
            self.speed_knots, self.heading_x10, self.roll_x10, self.pitch_x10, self.yaw_rate
        );
        out
    }
}

impl PaogiFields {
    pub fn body(&self) -> String {
        let mut out = String::from("PAOGI,");
        self.fix.write_to(&mut out);
        let _ = write!(
            out,
            ",{:.1},{:.3},{:.1},{},{},{:.2}",
            f32::from(self.age_of_correction),
            self.speed_knots,
            self.dual_heading,
            self.dual_roll,
            self.pitch,
            self.yaw_rate
        );
        out
    }
}

/// Wraps a body as `$<body>*HH\r\n` with the XOR checksum in uppercase hex.
pub fn frame_sentence(body: &str) -> String {
    format!("${body}*{:02X}\r\n", nmea_checksum(body.as_bytes()))
}

/// Decimal degrees to NMEA `DDMM.MMMMMM` and a hemisphere letter.
///
/// # Arguments
/// * `degrees` - Signed decimal degrees
/// * `positive` - Hemisphere letter for values >= 0 (`N` or `E`)
/// * `negative` - Hemisphere letter for values < 0 (`S` or `W`)
pub fn to_nmea_coordinate(degrees: f64, positive: char, negative: char) -> (f64, char) {
    let hemi = if degrees < 0.0 { negative } else { positive };
    let abs = degrees.abs();
    let whole = abs.trunc();
    let minutes = (abs - whole) * 60.0;
    (whole * 100.0 + minutes, hemi)
}
