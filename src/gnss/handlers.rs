//! Per-sentence handlers that fold parsed fields into the [`GnssRecord`].

use tracing::debug;

use super::fields::{Fields, parse_f32, parse_f64, parse_int, parse_lat, parse_lon, parse_time};
use super::record::{DEFAULT_HDOP, GnssRecord, InsAlignment, SentenceMask};

/// Offset between GPS time and UTC
pub const GPS_LEAP_SECONDS: u32 = 18;

const SECONDS_PER_DAY: u32 = 86_400;
const MPS_TO_KNOTS: f32 = 1.943_84;
const KMH_TO_KNOTS: f32 = 0.539_957;
/// Length of the `YYYYMMDD` date prefix on the KSXT timestamp
const KSXT_DATE_LEN: usize = 8;
const STATIONARY_SPEED_KNOTS: f32 = 0.1;

/// Sentence types understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentenceKind {
    Gga,
    Gns,
    Vtg,
    Hpr,
    Ksxt,
    Inspvaa,
    Inspvaxa,
}

impl SentenceKind {
    pub const ALL: [SentenceKind; 7] = [
        SentenceKind::Gga,
        SentenceKind::Gns,
        SentenceKind::Vtg,
        SentenceKind::Hpr,
        SentenceKind::Ksxt,
        SentenceKind::Inspvaa,
        SentenceKind::Inspvaxa,
    ];

    /// Classify field 0 by substring, in the receiver-priority order.
    ///
    /// Any talker prefix is accepted: `GPGGA`, `GNGGA` and `GAGGA` are all GGA.
    pub fn classify(sentence_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| sentence_type.contains(kind.tag()))
    }

    pub fn tag(self) -> &'static str {
        match self {
            SentenceKind::Gga => "GGA",
            SentenceKind::Gns => "GNS",
            SentenceKind::Vtg => "VTG",
            SentenceKind::Hpr => "HPR",
            SentenceKind::Ksxt => "KSXT",
            SentenceKind::Inspvaa => "INSPVAA",
            SentenceKind::Inspvaxa => "INSPVAXA",
        }
    }

    /// Fewest fields (including field 0) a sentence must carry to be handled.
    pub fn min_fields(self) -> usize {
        match self {
            SentenceKind::Gga => 9,
            SentenceKind::Gns => 6,
            SentenceKind::Vtg => 5,
            SentenceKind::Hpr => 5,
            SentenceKind::Ksxt => 10,
            SentenceKind::Inspvaa => 18,
            SentenceKind::Inspvaxa => 32,
        }
    }

    fn mask(self) -> SentenceMask {
        match self {
            SentenceKind::Gga => SentenceMask::GGA,
            SentenceKind::Gns => SentenceMask::GNS,
            SentenceKind::Vtg => SentenceMask::VTG,
            SentenceKind::Hpr => SentenceMask::HPR,
            SentenceKind::Ksxt => SentenceMask::KSXT,
            SentenceKind::Inspvaa => SentenceMask::INSPVAA,
            SentenceKind::Inspvaxa => SentenceMask::INSPVAXA,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Apply `fields` to `record`. Returns `false` when the sentence is too short.
pub(crate) fn apply(
    kind: SentenceKind,
    fields: &Fields,
    record: &mut GnssRecord,
    noise_filter: bool,
) -> bool {
    if fields.len() < kind.min_fields() {
        return false;
    }

    match kind {
        SentenceKind::Gga => update_gga(fields, record),
        SentenceKind::Gns => update_gns(fields, record),
        SentenceKind::Vtg => update_vtg(fields, record, noise_filter),
        SentenceKind::Hpr => update_hpr(fields, record),
        SentenceKind::Ksxt => update_ksxt(fields, record),
        SentenceKind::Inspvaa => update_inspvaa(fields, record),
        SentenceKind::Inspvaxa => update_inspvaxa(fields, record),
    }
    record.seen |= kind.mask();
    true
}

/// GGA: time, position, integer fix quality, satellites, HDOP, altitude, DGPS age.
fn update_gga(fields: &Fields, record: &mut GnssRecord) {
    record.fix_time = parse_time(fields.get(1));
    record.latitude = parse_lat(fields.get(2), fields.get(3));
    record.longitude = parse_lon(fields.get(4), fields.get(5));
    record.num_satellites = clamp_u8(parse_int(fields.get(7)));
    record.hdop = parse_f32(fields.get(8));
    record.altitude = parse_f32(fields.get(9));

    if fields.len() > 13 && !fields.get(13).is_empty() {
        record.age_of_correction = u16::try_from(parse_int(fields.get(13))).unwrap_or(0);
    }

    record.set_position_quality(clamp_u8(parse_int(fields.get(6))));
}

/// GNS: like GGA, but the fix comes from a mode letter.
fn update_gns(fields: &Fields, record: &mut GnssRecord) {
    record.fix_time = parse_time(fields.get(1));
    record.latitude = parse_lat(fields.get(2), fields.get(3));
    record.longitude = parse_lon(fields.get(4), fields.get(5));

    if !fields.get(7).is_empty() {
        record.num_satellites = clamp_u8(parse_int(fields.get(7)));
    }
    if !fields.get(8).is_empty() {
        record.hdop = parse_f32(fields.get(8));
    }
    if !fields.get(9).is_empty() {
        record.altitude = parse_f32(fields.get(9));
    }

    record.set_position_quality(gns_mode_quality(fields.get(6)));
}

/// Map the first GNS mode letter into GGA fix-quality numbering.
pub fn gns_mode_quality(mode: &str) -> u8 {
    match mode.as_bytes().first() {
        Some(b'A') => 1,
        Some(b'D') => 2,
        Some(b'F') => 5,
        Some(b'R') => 4,
        Some(b'E') => 6,
        Some(b'S') => 4,
        _ => 0,
    }
}

fn update_vtg(fields: &Fields, record: &mut GnssRecord, noise_filter: bool) {
    if !fields.get(1).is_empty() {
        record.heading_true = parse_f32(fields.get(1));
    }

    if !fields.get(5).is_empty() {
        let speed = parse_f32(fields.get(5));
        record.speed_knots = if noise_filter && speed < STATIONARY_SPEED_KNOTS {
            0.0
        } else {
            speed
        };
    }

    record.has_velocity = true;
}

fn update_hpr(fields: &Fields, record: &mut GnssRecord) {
    if !fields.get(2).is_empty() {
        record.dual_heading = parse_f32(fields.get(2));
    }
    if !fields.get(3).is_empty() {
        record.dual_roll = parse_f32(fields.get(3));
    }
    if !fields.get(5).is_empty() {
        record.heading_quality = clamp_u8(parse_int(fields.get(5)));
    }

    record.has_dual_heading = true;
}

/// KSXT: position, attitude and speed from a dual-antenna receiver.
///
/// Coordinates are already decimal degrees (longitude first). The heading
/// goes to `dual_heading` and the antenna-baseline pitch to `dual_roll`.
fn update_ksxt(fields: &Fields, record: &mut GnssRecord) {
    let timestamp = fields.get(1);
    if let Some(time) = timestamp
        .get(KSXT_DATE_LEN..)
        .filter(|_| timestamp.len() >= KSXT_DATE_LEN + 6)
    {
        record.fix_time = parse_time(time);
    }
    if !fields.get(2).is_empty() {
        record.longitude = parse_f64(fields.get(2));
    }
    if !fields.get(3).is_empty() {
        record.latitude = parse_f64(fields.get(3));
    }
    if !fields.get(4).is_empty() {
        record.altitude = parse_f32(fields.get(4));
    }
    if !fields.get(5).is_empty() {
        record.dual_heading = parse_f32(fields.get(5));
    }
    if !fields.get(6).is_empty() {
        record.dual_roll = parse_f32(fields.get(6));
    }
    if !fields.get(8).is_empty() {
        record.speed_knots = parse_f32(fields.get(8)) * KMH_TO_KNOTS;
        record.has_velocity = true;
    }

    if !fields.get(10).is_empty() {
        let quality = match clamp_u8(parse_int(fields.get(10))) {
            2 => 5,
            3 => 4,
            other => other,
        };
        record.set_position_quality(quality);
        record.heading_quality = quality;
    }

    if !fields.get(13).is_empty() {
        record.num_satellites = clamp_u8(parse_int(fields.get(13)));
    }
    record.hdop = 0.0;
    record.has_dual_heading = true;
}

/// INSPVAA from an integrated GNSS/INS receiver.
///
/// Layout after splitting header and body on `;`:
/// `INSPVAA,port,seq,idle,time_status,week,seconds,pos_status,pos_type,reserved,
/// week,seconds,lat,lon,height,vn,ve,vu,roll,pitch,azimuth,status`.
fn update_inspvaa(fields: &Fields, record: &mut GnssRecord) {
    if !fields.get(12).is_empty() {
        record.latitude = parse_f64(fields.get(12));
    }
    if !fields.get(13).is_empty() {
        record.longitude = parse_f64(fields.get(13));
    }
    if !fields.get(14).is_empty() {
        record.altitude = parse_f32(fields.get(14));
    }

    if let Some([north, east, up]) = float_triple(fields, 15) {
        record.north_velocity = north;
        record.east_velocity = east;
        record.up_velocity = up;
        record.speed_knots = north.hypot(east) * MPS_TO_KNOTS;
        record.has_velocity = true;
    }

    if let Some([roll, pitch, azimuth]) = float_triple(fields, 18) {
        record.ins_roll = roll;
        record.ins_pitch = pitch;
        record.ins_heading = azimuth;
        record.dual_heading = azimuth;
        record.dual_roll = roll;
        record.has_dual_heading = true;
    }

    let status = fields.get(21);
    let (alignment, quality) = ins_status(status);
    debug!(status, ?alignment, quality, "INSPVAA status");

    record.ins_alignment = alignment;
    record.fix_quality = quality;
    record.has_position = !fields.get(12).is_empty();
    record.num_satellites = 12;
    record.hdop = 0.9;

    set_gps_time(fields, record);
    record.has_ins = true;
    record.is_valid = true;
}

/// INSPVAXA: INSPVAA plus undulation and standard deviations.
///
/// Body layout: `ins_status` at field 10, lat/lon/height at 12..=14,
/// undulation at 15, N/E/U velocity at 16..=18, roll/pitch/azimuth at
/// 19..=21, position std-dev at 23..=25 and velocity std-dev at 26..=28.
fn update_inspvaxa(fields: &Fields, record: &mut GnssRecord) {
    let status = fields.get(10);
    let (alignment, quality) = ins_status(status);
    let aligning = alignment == InsAlignment::Aligning;
    debug!(status, ?alignment, quality, "INSPVAXA status");

    if !aligning {
        if !fields.get(12).is_empty() {
            record.latitude = parse_f64(fields.get(12));
        }
        if !fields.get(13).is_empty() {
            record.longitude = parse_f64(fields.get(13));
        }
        if !fields.get(14).is_empty() {
            record.altitude = parse_f32(fields.get(14));
        }
    }

    if let Some([north, east, up]) = float_triple(fields, 16) {
        record.north_velocity = north;
        record.east_velocity = east;
        record.up_velocity = up;
        record.speed_knots = north.hypot(east) * MPS_TO_KNOTS;
        record.has_velocity = true;
    }

    if let Some([roll, pitch, azimuth]) = float_triple(fields, 19) {
        record.ins_roll = roll;
        record.ins_pitch = pitch;
        record.ins_heading = azimuth;
        record.dual_heading = azimuth;
        record.dual_roll = roll;
    }

    if let Some(std_dev) = float_triple(fields, 23) {
        record.position_std_dev = std_dev;
    }
    if let Some(std_dev) = float_triple(fields, 26) {
        record.velocity_std_dev = std_dev;
    }

    record.ins_alignment = alignment;
    record.fix_quality = quality;
    if aligning {
        record.num_satellites = 0;
        record.hdop = DEFAULT_HDOP;
        record.has_position = false;
    } else {
        record.num_satellites = 12;
        record.hdop = 0.9;
        record.has_position = record.latitude != 0.0 || record.longitude != 0.0;
    }

    set_gps_time(fields, record);
    record.has_dual_heading = true;
    record.has_ins = true;
    record.is_valid = true;
}

/// Map an INS status string to its alignment state and GGA fix quality.
fn ins_status(status: &str) -> (InsAlignment, u8) {
    if status.is_empty() {
        (InsAlignment::SolutionGood, 1)
    } else if status.contains("INS_ALIGNING") {
        (InsAlignment::Aligning, 0)
    } else if status.contains("INS_SOLUTION_GOOD") || status.contains("INS_HIGH_VARIANCE") {
        (InsAlignment::SolutionGood, 4)
    } else if status.contains("INS_INACTIVE") {
        (InsAlignment::Inactive, 1)
    } else {
        (InsAlignment::Unknown, 1)
    }
}

/// Three consecutive float fields starting at `first`, when all are present.
fn float_triple(fields: &Fields, first: usize) -> Option<[f32; 3]> {
    let values = [first, first + 1, first + 2].map(|i| fields.get(i));
    if values.iter().any(|v| v.is_empty()) {
        return None;
    }
    Some(values.map(parse_f32))
}

/// GPS week and seconds from header fields 5 and 6.
fn set_gps_time(fields: &Fields, record: &mut GnssRecord) {
    if fields.get(5).is_empty() || fields.get(6).is_empty() {
        return;
    }
    record.gps_week = u16::try_from(parse_int(fields.get(5))).unwrap_or(0);
    record.gps_seconds = parse_f64(fields.get(6));
    record.fix_time = utc_hhmmss(record.gps_seconds);
}

/// UTC seconds of day for a GPS seconds-of-week value.
///
/// Any finite input is reduced into `0..86400`; non-finite input reads as 0.
pub fn utc_seconds_of_day(gps_seconds: f64) -> f64 {
    if !gps_seconds.is_finite() {
        return 0.0;
    }
    let day = f64::from(SECONDS_PER_DAY);
    let utc = (gps_seconds - f64::from(GPS_LEAP_SECONDS)).rem_euclid(day);
    // rem_euclid may round up to `day` for tiny negative remainders
    if utc >= day { 0.0 } else { utc }
}

/// UTC HHMMSS for a GPS seconds-of-week value.
pub fn utc_hhmmss(gps_seconds: f64) -> u32 {
    let day_seconds = (utc_seconds_of_day(gps_seconds).floor() as u32) % SECONDS_PER_DAY;
    let hours = day_seconds / 3600;
    let minutes = (day_seconds % 3600) / 60;
    let seconds = day_seconds % 60;
    hours * 10_000 + minutes * 100 + seconds
}

fn clamp_u8(value: i64) -> u8 {
    value.clamp(0, i64::from(u8::MAX)) as u8
}
