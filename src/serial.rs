//! Serial port adapter feeding the parsers one byte at a time.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{info, warn};

use crate::error::NavError;
use crate::io::ByteSource;

/// Largest single read from the port
pub const READ_CHUNK: usize = 1024;

const READ_TIMEOUT_MS: u64 = 10;

/// Non-blocking [`ByteSource`] over a serial port.
///
/// Bytes are pulled only when the port reports them as available, so
/// [`ByteSource::read_byte`] never waits on the line. A hard read error is
/// parked in [`SerialSource::take_fault`] and the source then stays empty.
pub struct SerialSource {
    port: Box<dyn SerialPort>,
    name: String,
    buffer: VecDeque<u8>,
    chunk: [u8; READ_CHUNK],
    fault: Option<NavError>,
}

impl SerialSource {
    /// Opens `name` at `baud`, 8 data bits.
    ///
    /// # Arguments
    /// * `name` - Device path (`/dev/ttyUSB0`, `COM3`, ...)
    /// * `baud` - Line speed
    pub fn open(name: &str, baud: u32) -> Result<Self, NavError> {
        let port = serialport::new(name, baud)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .data_bits(serialport::DataBits::Eight)
            .open()?;
        info!(port = name, baud, "serial port opened");
        Ok(Self {
            port,
            name: name.to_string(),
            buffer: VecDeque::with_capacity(READ_CHUNK),
            chunk: [0; READ_CHUNK],
            fault: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes already read from the port and not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Takes the read error that stopped this source, if any.
    pub fn take_fault(&mut self) -> Option<NavError> {
        self.fault.take()
    }

    fn fill(&mut self) -> Result<usize, NavError> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(0);
        }
        let len = available.min(READ_CHUNK);
        match self.port.read(&mut self.chunk[..len]) {
            Ok(n) => {
                self.buffer.extend(&self.chunk[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl ByteSource for SerialSource {
    fn read_byte(&mut self) -> Option<u8> {
        if self.buffer.is_empty() && self.fault.is_none() {
            if let Err(e) = self.fill() {
                warn!("Serial read on {} failed: {e}", self.name);
                self.fault = Some(e);
            }
        }
        self.buffer.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_is_serial_error() {
        let result = SerialSource::open("/dev/autosteer-nav-missing", 115_200);
        assert!(matches!(result, Err(NavError::Serial(_))));
    }
}
