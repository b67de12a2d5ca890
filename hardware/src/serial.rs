//! Serial IMU source
//!
//! The module streams framed reports once it has been configured, woken up
//! and told to report proactively. Bytes are read in chunks and fed to a
//! [`FrameDecoder`]; each validated payload is interpreted with the device's
//! offsets and turned into an [`AttitudeSample`].

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use attitude::{
    interpret, AngleOffsets, AttitudeSample, Command, DecoderStats, FrameDecoder,
    HeadingCorrections, ReportingConfig,
};
use serialport::SerialPort;
use tracing::{debug, info, trace};

use crate::error::{HardwareError, HardwareResult};
use crate::source::{AttitudeSource, SourceLabel};

pub const BAUD_RATE: u32 = 115_200;

/// Read timeout for the serial port
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause after each configuration command so the module can apply it
pub const COMMAND_SETTLE: Duration = Duration::from_millis(200);

const READ_CHUNK: usize = 256;

/// Open a serial IMU port at 115200 baud with a 2 s read timeout
pub fn open_port(path: &str) -> HardwareResult<Box<dyn SerialPort>> {
    let port = serialport::new(path, BAUD_RATE)
        .timeout(READ_TIMEOUT)
        .open()?;
    debug!("Opened {path} at {BAUD_RATE} baud");
    Ok(port)
}

/// Program report rate and contents, wake the module and enable reporting.
pub fn configure_device<W: Write>(
    port: &mut W,
    config: ReportingConfig,
    settle: Duration,
) -> HardwareResult<()> {
    send_command(port, Command::ConfigureReporting(config))?;
    thread::sleep(settle);
    send_command(port, Command::WakeUp)?;
    thread::sleep(settle);
    send_command(port, Command::EnableReporting)?;
    info!(
        "Serial IMU configured: {} Hz, fields {:?}",
        config.rate_hz, config.report_fields
    );
    Ok(())
}

pub fn send_command<W: Write>(port: &mut W, command: Command) -> HardwareResult<()> {
    trace!("Sending {command:?}");
    port.write_all(&command.encode())?;
    port.flush()?;
    Ok(())
}

/// Attitude source over any byte stream carrying serial IMU frames
pub struct SerialSource<R: Read> {
    reader: R,
    decoder: FrameDecoder,
    offsets: AngleOffsets,
    corrections: HeadingCorrections,
    label: SourceLabel,
    dropped_reports: u64,
    buf: [u8; READ_CHUNK],
}

impl<R: Read> SerialSource<R> {
    pub fn new(
        reader: R,
        label: SourceLabel,
        offsets: AngleOffsets,
        corrections: HeadingCorrections,
    ) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            offsets,
            corrections,
            label,
            dropped_reports: 0,
            buf: [0; READ_CHUNK],
        }
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Reports that framed correctly but could not be interpreted
    pub fn dropped_reports(&self) -> u64 {
        self.dropped_reports
    }
}

impl<R: Read> AttitudeSource for SerialSource<R> {
    fn label(&self) -> &SourceLabel {
        &self.label
    }

    fn poll(&mut self, out: &mut Vec<AttitudeSample>) -> HardwareResult<()> {
        let n = match self.reader.read(&mut self.buf) {
            Ok(0) => return Err(HardwareError::EndOfStream),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                trace!("{}: no data ({e})", self.label.src);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let Self {
            decoder,
            offsets,
            corrections,
            label,
            dropped_reports,
            buf,
            ..
        } = self;

        decoder.feed_all(&buf[..n], |payload| {
            match interpret(&payload, offsets) {
                Ok(Some(reading)) => {
                    let sample = AttitudeSample::from_serial(&reading, corrections);
                    if !sample.is_empty() {
                        out.push(sample);
                    }
                }
                Ok(None) => trace!("{}: ignoring payload tag {:#04x}", label.src, payload[0]),
                Err(e) => {
                    *dropped_reports += 1;
                    debug!("{}: dropping report: {e}", label.src);
                }
            }
        });
        Ok(())
    }
}
