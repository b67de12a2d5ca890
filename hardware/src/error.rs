//! Errors at the device and I/O boundary

use std::time::Duration;

use attitude::{AttitudeError, CalibrationQuality, CommandError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HardwareError {
    /// Low-level I/O error (port, file or output stream).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to open or configure a serial port.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Configuration is malformed or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No supported device answered on the bus.
    #[error("No device found on the bus (scanned {found:02x?})")]
    DeviceNotFound { found: Vec<u8> },

    /// Error reported by the orientation driver.
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Command encoding error: {0}")]
    Command(#[from] CommandError),

    #[error("Invalid orientation from device: {0}")]
    Orientation(#[from] AttitudeError),

    /// Calibration quality never held long enough.
    #[error("Calibration timed out after {:.1}s (last quality: {last_quality:?})", .elapsed.as_secs_f64())]
    CalibrationTimeout {
        elapsed: Duration,
        last_quality: Option<CalibrationQuality>,
    },

    /// The byte source reached end of file.
    #[error("End of stream")]
    EndOfStream,

    /// A session worker thread panicked.
    #[error("Session {0} panicked")]
    SessionPanicked(String),

    /// A thread panicked while holding the output lock.
    #[error("Telemetry output lock poisoned")]
    EmitterPoisoned,
}

pub type HardwareResult<T> = Result<T, HardwareError>;
