//! Emulate a serial IMU: write report frames to a serial port or file.
//!
//! Useful for exercising `listen_imu` and `imu_bridge` through a loopback
//! cable or a pty pair, or for producing captures for `parse_dump`.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use imu_hardware::serial::open_port;
use imu_hardware::sim::SimulatedSerialImu;
use tracing::info;

/// Generate serial IMU report frames
#[derive(Parser, Debug)]
#[command(name = "mock_imu")]
#[command(version, about)]
struct Args {
    /// Serial port to write to
    #[arg(short, long, conflicts_with = "output", required_unless_present = "output")]
    port: Option<String>,

    /// Write frames to a file instead (no pacing)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Reports per second
    #[arg(short, long, default_value_t = 10.0)]
    rate: f64,

    /// Number of frames (0 = forever)
    #[arg(short, long, default_value_t = 0)]
    count: u64,

    /// Starting heading, degrees
    #[arg(long, default_value_t = 0.0)]
    heading: f64,

    /// Heading change per frame, degrees
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    turn_rate: f64,

    /// Roll, degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    roll: f64,

    /// Pitch, degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pitch: f64,

    /// Device address in the frame header
    #[arg(long, default_value_t = 0x01)]
    address: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_target(false).init();

    let interval = Duration::from_secs_f64(1.0 / args.rate.max(0.1));
    let (mut out, paced): (Box<dyn Write>, bool) = match (&args.port, &args.output) {
        (_, Some(path)) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            (Box::new(file) as Box<dyn Write>, false)
        }
        (Some(port), None) => (Box::new(open_port(port)?) as Box<dyn Write>, true),
        (None, None) => anyhow::bail!("Either --port or --output is required"),
    };

    let interval_ms = u32::try_from(interval.as_millis()).unwrap_or(u32::MAX);
    let mut imu = SimulatedSerialImu::new(args.address, interval_ms)
        .with_heading(args.heading, args.turn_rate)
        .with_attitude(args.roll, args.pitch);

    info!("Writing frames every {interval:?}");
    let mut sent = 0u64;
    while args.count == 0 || sent < args.count {
        out.write_all(&imu.next_frame()?)?;
        sent += 1;
        if sent % 100 == 0 {
            info!("{sent} frames sent, heading {:.1}", imu.heading_deg());
        }
        if paced {
            out.flush()?;
            thread::sleep(interval);
        }
    }
    out.flush()?;
    info!("Done, {sent} frames");
    Ok(())
}
