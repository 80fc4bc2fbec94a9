//! Bounded comma splitting and NMEA field conversions.

/// Size limits applied while splitting a sentence body into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLimits {
    pub max_fields: usize,
    pub max_field_len: usize,
    pub separators: &'static [u8],
}

/// `$`-framed NMEA sentences: 20 fields of 15 characters, comma separated.
pub const NMEA_LIMITS: FieldLimits = FieldLimits {
    max_fields: 20,
    max_field_len: 15,
    separators: b",",
};

/// `#`-framed Unicore logs: header and body are separated by `;`.
///
/// 35 fields leaves room for the 32 or more of an INSPVAXA log.
pub const UNICORE_LIMITS: FieldLimits = FieldLimits {
    max_fields: 35,
    max_field_len: 24,
    separators: b",;",
};

/// Fields of one sentence, field 0 being the talker and sentence type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    fields: Vec<String>,
    truncated: bool,
}

impl Fields {
    /// Split a sentence body (framing character and checksum excluded).
    ///
    /// Characters past `max_field_len` and fields past `max_fields` are
    /// dropped and reported through [`Fields::truncated`]. A trailing empty
    /// field after the last separator is not counted.
    pub fn split(body: &[u8], limits: FieldLimits) -> Self {
        let mut fields = Vec::with_capacity(limits.max_fields);
        let mut current = String::with_capacity(limits.max_field_len);
        let mut truncated = false;

        for &c in body {
            if fields.len() >= limits.max_fields {
                truncated = true;
                break;
            }
            if limits.separators.contains(&c) {
                fields.push(std::mem::take(&mut current));
            } else if current.len() < limits.max_field_len {
                current.push(char::from(c));
            } else {
                truncated = true;
            }
        }

        if !current.is_empty() {
            if fields.len() < limits.max_fields {
                fields.push(current);
            } else {
                truncated = true;
            }
        }

        Self { fields, truncated }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field `index`, or an empty string when absent.
    pub fn get(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Converts `DDMM.MMMMM` latitude to decimal degrees, negative for `S`.
///
/// # Arguments
/// * `value` - Latitude as sent by the receiver
/// * `hemi` - Hemisphere (`N` or `S`)
///
/// Unparseable values convert to 0.0.
pub fn parse_lat(value: &str, hemi: &str) -> f64 {
    nmea_to_degrees(value, hemi.starts_with('S'))
}

/// Converts `DDDMM.MMMMM` longitude to decimal degrees, negative for `W`.
///
/// # Arguments
/// * `value` - Longitude as sent by the receiver
/// * `hemi` - Hemisphere (`E` or `W`)
pub fn parse_lon(value: &str, hemi: &str) -> f64 {
    nmea_to_degrees(value, hemi.starts_with('W'))
}

fn nmea_to_degrees(value: &str, negate: bool) -> f64 {
    let val = parse_f64(value);
    let deg = (val / 100.0).floor();
    let min = val - deg * 100.0;
    let result = deg + min / 60.0;
    if negate { -result } else { result }
}

pub fn parse_f64(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

pub fn parse_f32(value: &str) -> f32 {
    value.trim().parse().unwrap_or(0.0)
}

/// Leading decimal integer of `value`, ignoring anything after the digits.
///
/// `"08"` is 8, `"2.5"` is 2, an empty or non-numeric field is 0.
pub fn parse_int(value: &str) -> i64 {
    let value = value.trim();
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });
    if negative { -magnitude } else { magnitude }
}

/// HHMMSS(.sss) time field packed as an integer, fractional seconds dropped.
pub fn parse_time(value: &str) -> u32 {
    u32::try_from(parse_int(value)).unwrap_or(0)
}
