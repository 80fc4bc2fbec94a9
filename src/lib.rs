//! Autosteer Navigation Core
//!
//! Parses the byte streams of a GNSS receiver and an attitude IMU and fuses
//! them into one `$PANDA` (single antenna) or `$PAOGI` (dual antenna / INS)
//! sentence per transmission tick.
//!
//! # Features
//! - NMEA GGA, GNS, VTG, HPR and KSXT sentences plus Unicore INSPVAA and INSPVAXA logs
//! - RVC and EasyProfile binary IMU frames with per-family staleness windows
//! - Fixed-cadence sentence synthesis with XOR checksum
//! - Transport-agnostic: bytes come in through [`io::ByteSource`], sentences
//!   leave through [`io::SentenceSink`]
//!
//! # Usage
//!
//! ```rust
//! use std::collections::VecDeque;
//!
//! use autosteer_nav::clock::ManualClock;
//! use autosteer_nav::config::NavConfig;
//! use autosteer_nav::runtime::ControlLoop;
//!
//! let clock = ManualClock::new(0);
//! let mut control = ControlLoop::new(&clock, &NavConfig::default(), None);
//!
//! let mut gnss: VecDeque<u8> =
//!     b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n"
//!         .iter()
//!         .copied()
//!         .collect();
//! let mut imu: VecDeque<u8> = VecDeque::new();
//! let mut sink: Vec<String> = Vec::new();
//!
//! while !gnss.is_empty() {
//!     control.service(&mut gnss, &mut imu, &mut sink);
//! }
//! clock.set(100);
//! control.service(&mut gnss, &mut imu, &mut sink);
//! assert!(sink[0].starts_with("$PANDA,"));
//! ```

pub mod checksum;
pub mod clock;
pub mod config;
pub mod error;
pub mod gnss;
pub mod imu;
pub mod io;
pub mod nav;
pub mod runtime;
pub mod serial;

pub use config::NavConfig;
pub use error::{ConfigError, NavError};
pub use gnss::{GnssProcessor, GnssRecord, SentenceKind, SentenceOutcome};
pub use imu::{ImuKind, ImuProcessor, ImuRecord, PacketOutcome};
pub use nav::{NavProcessor, OutboundMessage};
pub use runtime::ControlLoop;
