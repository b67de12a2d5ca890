//! IMU bridge: reads configured IMUs and writes attitude/heading deltas to
//! stdout, one JSON document per line. Logs go to stderr.
//!
//! Configuration comes from `--config <file>` or, when omitted, from the
//! first line of stdin. In the stdin case the bridge keeps reading host
//! messages and stops all sessions when stdin closes.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use attitude::ReportingConfig;
use clap::Parser;
use imu_hardware::calibrate::SystemClock;
use imu_hardware::serial::{configure_device, open_port, COMMAND_SETTLE};
use imu_hardware::session::{serial_session, spawn_i2c_session};
use imu_hardware::sim::SimulatedImu;
use imu_hardware::{BridgeConfig, DeltaEmitter, DeviceConfig, DeviceKind, SessionHandle};
use tracing::{debug, error, info, warn};

type SharedEmitter = Arc<Mutex<DeltaEmitter<io::Stdout>>>;

/// How often finished sessions are collected when running from a config file
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(500);

/// Attitude and heading bridge for I2C and serial IMUs
#[derive(Parser, Debug)]
#[command(name = "imu_bridge")]
#[command(version, about)]
struct Args {
    /// JSON configuration file (default: first line of stdin)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run I2C devices against the simulated driver
    #[arg(long)]
    simulate_i2c: bool,

    /// Do not send configuration commands to serial devices
    #[arg(long)]
    no_configure: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn start_serial(
    device: &DeviceConfig,
    path: &str,
    args: &Args,
    emitter: &SharedEmitter,
) -> Result<SessionHandle> {
    let mut port = open_port(path).with_context(|| format!("Failed to open {path}"))?;
    if !args.no_configure {
        configure_device(
            &mut port,
            ReportingConfig::with_rate(device.serial_rate()),
            COMMAND_SETTLE,
        )?;
    }
    Ok(serial_session(port, device, Arc::clone(emitter))?.spawn()?)
}

fn start_i2c(
    device: &DeviceConfig,
    address: u8,
    args: &Args,
    emitter: &SharedEmitter,
) -> Result<SessionHandle> {
    if !args.simulate_i2c {
        bail!("No I2C driver available for {address:#04x}, run with --simulate-i2c");
    }
    let driver = SimulatedImu::new().with_yaw_rate(1.0);
    Ok(spawn_i2c_session(
        driver,
        device.clone(),
        vec![address],
        SystemClock,
        Arc::clone(emitter),
    )?)
}

fn report(handle: SessionHandle) {
    let name = handle.name().to_string();
    match handle.join() {
        Ok(summary) => info!(
            "{name}: {} polls, {} samples, {} emitted",
            summary.polls, summary.samples, summary.emitted
        ),
        Err(e) => error!("{name}: {e}"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let stdin = io::stdin();
    let config = match &args.config {
        Some(path) => BridgeConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => BridgeConfig::read_first_line(&mut stdin.lock())
            .context("Failed to read configuration from stdin")?,
    };

    let devices = config.devices()?;
    info!("Configured {} device(s)", devices.len());

    let emitter: SharedEmitter = Arc::new(Mutex::new(DeltaEmitter::stdout()));
    let mut handles = Vec::new();

    for device in &devices {
        let started = match &device.kind {
            DeviceKind::Serial { path } => start_serial(device, path, &args, &emitter),
            DeviceKind::I2c { address } => start_i2c(device, *address, &args, &emitter),
        };
        match started {
            Ok(handle) => {
                info!("{}: running", handle.name());
                handles.push(handle);
            }
            Err(e) => error!("{}: {e:#}", device.name()),
        }
    }

    if handles.is_empty() {
        bail!("No device sessions started");
    }

    if args.config.is_none() {
        for line in stdin.lock().lines() {
            let line = line?;
            match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(message) => debug!("Host message: {message}"),
                Err(_) => warn!("Error parsing JSON from host: {line}"),
            }
        }
        info!("Input closed, stopping sessions");
        for handle in &handles {
            handle.stop();
        }
        handles.into_iter().for_each(report);
    } else {
        // Report sessions as they end rather than in start order
        while !handles.is_empty() {
            let (finished, running): (Vec<_>, Vec<_>) =
                handles.into_iter().partition(SessionHandle::is_finished);
            finished.into_iter().for_each(report);
            handles = running;
            thread::sleep(SUPERVISE_INTERVAL);
        }
    }
    Ok(())
}
