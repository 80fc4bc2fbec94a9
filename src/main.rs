//! Reads a GNSS receiver and an optional IMU from serial ports and emits
//! `$PANDA` / `$PAOGI` sentences to stdout or a UDP address.

use std::io::{self, Write};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use autosteer_nav::clock::MonotonicClock;
use autosteer_nav::config::NavConfig;
use autosteer_nav::imu::ImuKind;
use autosteer_nav::io::SentenceSink;
use autosteer_nav::runtime::ControlLoop;
use autosteer_nav::serial::SerialSource;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

const STATS_PERIOD: Duration = Duration::from_secs(10);

/// GNSS/IMU fusion for autosteer
#[derive(Parser, Debug)]
#[command(name = "autosteer-nav")]
#[command(about = "Parse GNSS and IMU serial streams and emit PANDA/PAOGI sentences")]
#[command(version)]
struct Args {
    /// GNSS receiver serial port
    #[arg(long)]
    gnss_port: String,

    /// GNSS receiver baud rate
    #[arg(long, default_value = "460800")]
    gnss_baud: u32,

    /// IMU serial port (omit when no IMU is fitted)
    #[arg(long)]
    imu_port: Option<String>,

    /// IMU family on the IMU port: rvc or easy-profile
    #[arg(long, default_value = "rvc")]
    imu_kind: ImuKind,

    /// IMU baud rate
    #[arg(long, default_value = "115200")]
    imu_baud: u32,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Send sentences to this UDP address instead of stdout (e.g. 192.168.5.255:9999)
    #[arg(long)]
    udp: Option<String>,

    /// Override the message interval in milliseconds (clamped to 10..=1000)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Enable debug logging of every sentence and packet
    #[arg(long)]
    debug: bool,
}

/// Where outbound sentences go.
enum Output {
    Stdout(io::Stdout),
    Udp { socket: UdpSocket, target: SocketAddr },
}

impl Output {
    fn open(udp: Option<&str>) -> Result<Self> {
        let Some(address) = udp else {
            return Ok(Output::Stdout(io::stdout()));
        };
        let target = address
            .to_socket_addrs()
            .with_context(|| format!("resolving UDP target {address}"))?
            .next()
            .with_context(|| format!("no address for UDP target {address}"))?;
        let socket = UdpSocket::bind("0.0.0.0:0").context("binding UDP socket")?;
        socket
            .set_broadcast(true)
            .context("enabling UDP broadcast")?;
        info!(%target, "sending sentences over UDP");
        Ok(Output::Udp { socket, target })
    }
}

impl SentenceSink for Output {
    fn send(&mut self, sentence: &str) -> io::Result<()> {
        match self {
            Output::Stdout(stdout) => {
                let mut lock = stdout.lock();
                lock.write_all(sentence.as_bytes())?;
                lock.flush()
            }
            Output::Udp { socket, target } => {
                socket.send_to(sentence.as_bytes(), *target).map(|_| ())
            }
        }
    }
}

fn load_config(args: &Args) -> Result<NavConfig> {
    let mut config = match &args.config {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::default(),
    };
    if args.debug {
        config.debug = true;
    }
    if let Some(ms) = args.interval_ms {
        config.message_interval_ms = ms;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut gnss = SerialSource::open(&args.gnss_port, args.gnss_baud)
        .with_context(|| format!("opening GNSS port {} @ {}", args.gnss_port, args.gnss_baud))?;
    let mut imu = match &args.imu_port {
        Some(port) => Some(
            SerialSource::open(port, args.imu_baud)
                .with_context(|| format!("opening IMU port {port} @ {}", args.imu_baud))?,
        ),
        None => None,
    };
    let mut output = Output::open(args.udp.as_deref())?;

    let imu_kind = imu.as_ref().map(|_| args.imu_kind);
    let mut control = ControlLoop::new(MonotonicClock::new(), &config, imu_kind);
    let mut last_stats = Instant::now();

    loop {
        control.service(&mut gnss, &mut imu, &mut output);

        if let Some(fault) = gnss.take_fault() {
            return Err(fault).context("reading GNSS stream failed");
        }
        if let Some(fault) = imu.as_mut().and_then(SerialSource::take_fault) {
            return Err(fault).context("reading IMU stream failed");
        }

        if last_stats.elapsed() >= STATS_PERIOD {
            last_stats = Instant::now();
            let nmea = control.gnss().stats();
            let nav = control.nav().stats();
            info!(
                sentences = nmea.processed,
                parse_errors = nmea.parse_errors,
                checksum_errors = nmea.checksum_errors,
                panda = nav.panda_sent,
                paogi = nav.paogi_sent,
                no_fix = nav.skipped_no_fix,
                "status"
            );
            if let Some(imu) = control.imu() {
                let packets = imu.stats();
                info!(
                    kind = %imu.kind(),
                    samples = packets.samples,
                    checksum_errors = packets.checksum_errors,
                    range_rejected = packets.range_rejected,
                    "IMU status"
                );
            }
        }

        if gnss.buffered() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
}
