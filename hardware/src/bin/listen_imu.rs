//! Listen to a serial IMU and print decoded readings.
//!
//! Reads from a serial port (configuring the module first unless told not
//! to) or replays a raw capture file.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use attitude::{AngleOffsets, HeadingCorrections, ReportingConfig};
use clap::Parser;
use imu_hardware::serial::{configure_device, open_port, SerialSource, COMMAND_SETTLE};
use imu_hardware::{AttitudeSource, HardwareError, SourceLabel};
use tracing::info;

/// Decode and print serial IMU reports
#[derive(Parser, Debug)]
#[command(name = "listen_imu")]
#[command(version, about)]
struct Args {
    /// Serial port path
    #[arg(short, long, default_value = "/dev/ttyUSB0", conflicts_with = "file")]
    port: String,

    /// Replay a raw capture instead of reading a port
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Report rate to configure, Hz
    #[arg(short, long, default_value_t = 10)]
    rate: u8,

    /// Do not send configuration commands
    #[arg(long)]
    no_configure: bool,

    /// Also save every received byte to this file
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Heading offset in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    heading_offset: f64,

    /// Stop after this many readings (0 = run until end of input)
    #[arg(short, long, default_value_t = 0)]
    count: u64,
}

/// Copies everything read to a capture file
struct Tee<R> {
    inner: R,
    capture: File,
}

impl<R: Read> Read for Tee<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.capture.write_all(&buf[..n])?;
        Ok(n)
    }
}

fn open_input(args: &Args) -> Result<(Box<dyn Read + Send>, String)> {
    if let Some(path) = &args.file {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        return Ok((Box::new(file) as Box<dyn Read + Send>, path.display().to_string()));
    }

    let mut port = open_port(&args.port).with_context(|| format!("Failed to open {}", args.port))?;
    if !args.no_configure {
        configure_device(&mut port, ReportingConfig::with_rate(args.rate), COMMAND_SETTLE)?;
    }
    Ok((Box::new(port) as Box<dyn Read + Send>, args.port.clone()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let (input, name) = open_input(&args)?;
    let input: Box<dyn Read + Send> = match &args.capture {
        Some(path) => Box::new(Tee {
            inner: input,
            capture: File::create(path)?,
        }) as Box<dyn Read + Send>,
        None => input,
    };

    let offsets = AngleOffsets {
        heading_deg: args.heading_offset,
        ..AngleOffsets::default()
    };
    let mut source = SerialSource::new(
        input,
        SourceLabel::serial(&name),
        offsets,
        HeadingCorrections::default(),
    );

    info!("Listening on {name}");
    let mut samples = Vec::new();
    let mut printed = 0u64;
    'outer: loop {
        samples.clear();
        match source.poll(&mut samples) {
            Ok(()) => {}
            Err(HardwareError::EndOfStream) => break,
            Err(e) => return Err(e.into()),
        }

        for sample in &samples {
            let heading = sample
                .heading_magnetic
                .map(|h| format!("{:7.2}", h.to_degrees()))
                .unwrap_or_else(|| "    n/a".to_string());
            let (roll, pitch) = sample
                .attitude
                .map(|a| (a.roll.to_degrees(), a.pitch.to_degrees()))
                .unwrap_or((f64::NAN, f64::NAN));
            println!("heading {heading}  roll {roll:7.2}  pitch {pitch:7.2}");

            printed += 1;
            if args.count > 0 && printed >= args.count {
                break 'outer;
            }
        }
    }

    let stats = source.decoder_stats();
    info!(
        "{printed} readings, {} frames, {} framing errors, {} dropped reports",
        stats.frames_decoded,
        stats.framing_errors,
        source.dropped_reports()
    );
    Ok(())
}
