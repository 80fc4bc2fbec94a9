//! Checksum schemes for the three inbound framings and the outbound sentence.
//!
//! - NMEA: XOR of every byte between `$` and `*`, rendered as two hex digits.
//! - Unicore ASCII logs: CRC-32 over every byte between `#` and `*`
//!   (reflected 0xEDB88320, init 0, no final XOR), rendered as eight hex digits.
//! - RVC frames: additive sum (mod 256) of the 16 payload bytes.
//! - EasyProfile frames: CRC-16/Modbus over size byte and payload, sent
//!   little-endian.

use crc::{Algorithm, CRC_16_MODBUS, Crc};

/// CRC-32 variant used by Unicore receivers for `#`-framed ASCII logs.
///
/// Same polynomial as IEEE 802.3 but with a zero initial value and no output
/// XOR.
pub const CRC_32_UNICORE: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x04c1_1db7,
    init: 0x0000_0000,
    refin: true,
    refout: true,
    xorout: 0x0000_0000,
    check: 0x2dfd_2d88,
    residue: 0x0000_0000,
};

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);
const UNICORE: Crc<u32> = Crc::<u32>::new(&CRC_32_UNICORE);

/// XOR of every byte in `body`.
///
/// `body` must not include the leading `$` or the `*HH` suffix.
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Additive (mod 256) checksum used by RVC frames.
pub fn additive_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// CRC-16/Modbus (poly 0xA001 reflected, init 0xFFFF).
pub fn crc16_modbus(data: &[u8]) -> u16 {
    MODBUS.checksum(data)
}

/// CRC-32 of a Unicore log body (bytes between `#` and `*`).
pub fn crc32_unicore(body: &[u8]) -> u32 {
    UNICORE.checksum(body)
}

/// Value of a single ASCII hex digit, or `None` for anything else.
pub fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}
