//! I2C fusion IMU source
//!
//! The sensor chip does its own fusion and hands back an orientation
//! quaternion; the vendor driver is abstracted behind [`OrientationDriver`]
//! so sessions can run against real hardware or [`crate::sim::SimulatedImu`].

use std::time::Duration;

use attitude::{
    AngleOffsets, AttitudeSample, CalibrationQuality, HeadingCorrections, Quaternion,
};
use tracing::{error, info, warn};

use crate::error::{HardwareError, HardwareResult};
use crate::source::{AttitudeSource, SourceLabel};

/// Factory-default bus address
pub const DEFAULT_ADDRESS: u8 = 0x4A;

/// Address with the address-select pin pulled high
pub const ALTERNATE_ADDRESS: u8 = 0x4B;

/// Reports the chip can be asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Feature {
    Magnetometer,
    /// Orientation from accelerometer and gyro only, no magnetic jumps
    GameRotationVector,
}

/// Interface to the sensor chip's vendor driver
pub trait OrientationDriver {
    /// Latest orientation, as (w, x, y, z)
    fn quaternion(&mut self) -> HardwareResult<Quaternion>;

    /// Latest magnetic field, µT
    fn magnetic(&mut self) -> HardwareResult<[f64; 3]>;

    fn calibration_quality(&mut self) -> HardwareResult<CalibrationQuality>;

    /// Persist the current calibration in the chip
    fn save_calibration(&mut self) -> HardwareResult<()>;

    /// Start dynamic calibration
    fn begin_calibration(&mut self) -> HardwareResult<()>;

    fn enable_feature(&mut self, feature: Feature) -> HardwareResult<()>;
}

impl<D: OrientationDriver + ?Sized> OrientationDriver for Box<D> {
    fn quaternion(&mut self) -> HardwareResult<Quaternion> {
        (**self).quaternion()
    }

    fn magnetic(&mut self) -> HardwareResult<[f64; 3]> {
        (**self).magnetic()
    }

    fn calibration_quality(&mut self) -> HardwareResult<CalibrationQuality> {
        (**self).calibration_quality()
    }

    fn save_calibration(&mut self) -> HardwareResult<()> {
        (**self).save_calibration()
    }

    fn begin_calibration(&mut self) -> HardwareResult<()> {
        (**self).begin_calibration()
    }

    fn enable_feature(&mut self, feature: Feature) -> HardwareResult<()> {
        (**self).enable_feature(feature)
    }
}

/// Features every session needs
pub const REQUIRED_FEATURES: [Feature; 2] = [Feature::Magnetometer, Feature::GameRotationVector];

pub fn enable_reports<D: OrientationDriver + ?Sized>(driver: &mut D) -> HardwareResult<()> {
    for feature in REQUIRED_FEATURES {
        driver.enable_feature(feature)?;
    }
    Ok(())
}

/// Pick the IMU address from a bus scan, preferring the alternate address.
pub fn select_address(found: &[u8]) -> Option<u8> {
    [ALTERNATE_ADDRESS, DEFAULT_ADDRESS]
        .into_iter()
        .find(|address| found.contains(address))
}

/// Reconcile the configured address with a bus scan.
///
/// The detected address wins; a mismatch is logged.
pub fn resolve_address(configured: u8, found: &[u8]) -> HardwareResult<u8> {
    let detected = select_address(found).ok_or_else(|| HardwareError::DeviceNotFound {
        found: found.to_vec(),
    })?;
    if detected != configured {
        error!(
            "Configured address {configured:#04x} differs from detected address {detected:#04x}, using {detected:#04x}"
        );
    }
    Ok(detected)
}

/// Attitude source over an [`OrientationDriver`]
pub struct I2cSource<D: OrientationDriver> {
    driver: D,
    label: SourceLabel,
    offsets: AngleOffsets,
    corrections: HeadingCorrections,
    interval: Duration,
}

impl<D: OrientationDriver> I2cSource<D> {
    pub fn new(
        driver: D,
        address: u8,
        offsets: AngleOffsets,
        corrections: HeadingCorrections,
        interval: Duration,
    ) -> Self {
        Self {
            driver,
            label: SourceLabel::i2c(address),
            offsets,
            corrections,
            interval,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Enable the reports the source reads, without calibrating
    pub fn start(&mut self) -> HardwareResult<()> {
        enable_reports(&mut self.driver)?;
        info!("{}: reports enabled", self.label.src);
        Ok(())
    }
}

impl<D: OrientationDriver> AttitudeSource for I2cSource<D> {
    fn label(&self) -> &SourceLabel {
        &self.label
    }

    fn poll(&mut self, out: &mut Vec<AttitudeSample>) -> HardwareResult<()> {
        let quaternion = self.driver.quaternion()?;
        match quaternion.to_attitude() {
            Ok(attitude) => out.push(AttitudeSample::from_attitude(
                attitude.with_offsets(&self.offsets),
                &self.corrections,
            )),
            Err(e) => warn!("{}: dropping sample: {e}", self.label.src),
        }
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    fn calibration_quality(&mut self) -> Option<CalibrationQuality> {
        match self.driver.calibration_quality() {
            Ok(quality) => Some(quality),
            Err(e) => {
                warn!("{}: calibration status unavailable: {e}", self.label.src);
                None
            }
        }
    }
}
