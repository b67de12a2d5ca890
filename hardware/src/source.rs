//! Attitude source trait shared by the serial and I2C device paths.

use std::time::Duration;

use attitude::{AttitudeSample, CalibrationQuality};

use crate::error::HardwareResult;

/// Origin of emitted telemetry, as it appears in the delta `source` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLabel {
    pub label: String,
    pub src: String,
}

impl SourceLabel {
    /// Label for an I2C fusion IMU at `address`
    pub fn i2c(address: u8) -> Self {
        Self {
            label: "IMU sensor".to_string(),
            src: format!("I2C_at[{address:#x}]"),
        }
    }

    /// Label for a serial IMU on `path`
    pub fn serial(path: &str) -> Self {
        Self {
            label: "ROS sensor".to_string(),
            src: path.to_string(),
        }
    }
}

/// A device producing attitude samples
///
/// Abstracts the device for testability in session loops.
pub trait AttitudeSource {
    fn label(&self) -> &SourceLabel;

    /// Collect whatever samples are available into `out`.
    ///
    /// Serial sources may block up to their read timeout and return nothing.
    /// Returns [`crate::HardwareError::EndOfStream`] once a finite source is
    /// exhausted.
    fn poll(&mut self, out: &mut Vec<AttitudeSample>) -> HardwareResult<()>;

    /// Time to wait between polls
    fn poll_interval(&self) -> Duration {
        Duration::ZERO
    }

    /// Current self-reported calibration quality, if the device has one
    fn calibration_quality(&mut self) -> Option<CalibrationQuality> {
        None
    }
}

impl<S: AttitudeSource + ?Sized> AttitudeSource for Box<S> {
    fn label(&self) -> &SourceLabel {
        (**self).label()
    }

    fn poll(&mut self, out: &mut Vec<AttitudeSample>) -> HardwareResult<()> {
        (**self).poll(out)
    }

    fn poll_interval(&self) -> Duration {
        (**self).poll_interval()
    }

    fn calibration_quality(&mut self) -> Option<CalibrationQuality> {
        (**self).calibration_quality()
    }
}
