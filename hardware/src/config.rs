//! Bridge configuration
//!
//! The host hands the bridge one JSON document listing two device families:
//!
//! ```json
//! {
//!   "imuDevices": [{ "devName": 75, "devRefresh": 10, "devDelayReports": 4,
//!                    "devCalibRequired": true, "devHdgOffset": 0,
//!                    "devHdgDeviation": -2.5, "devRollOffset": 0,
//!                    "devPitchOffset": 0 }],
//!   "rosDevices": [{ "devName": "/dev/ttyUSB0", "devRefresh": -9,
//!                    "devHdgOffset": 0, "devRollOffset": 0, "devPitchOffset": 0 }]
//! }
//! ```
//!
//! `imuDevices` are I2C fusion IMUs addressed by bus address; `rosDevices`
//! are serial IMUs addressed by port path. Each entry is normalized into a
//! [`DeviceConfig`] before a session is started.

use std::io::BufRead;
use std::path::Path;
use std::time::Duration;

use attitude::{AngleOffsets, HeadingCorrections, ReportThrottle};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{HardwareError, HardwareResult};

/// Highest report rate the serial IMU accepts, Hz
pub const MAX_SERIAL_RATE_HZ: u8 = 250;

/// I2C device entry as it appears in the JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImuDeviceEntry {
    /// Expected bus address
    pub dev_name: BusAddress,
    /// Output rate, reports per second
    pub dev_refresh: f64,
    #[serde(default)]
    pub dev_delay_reports: u32,
    #[serde(default)]
    pub dev_calib_required: bool,
    #[serde(default)]
    pub dev_hdg_offset: f64,
    #[serde(default)]
    pub dev_hdg_deviation: f64,
    #[serde(default)]
    pub dev_roll_offset: f64,
    #[serde(default)]
    pub dev_pitch_offset: f64,
    /// Magnetic declination for true heading, degrees east positive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_declination: Option<f64>,
}

/// Serial device entry as it appears in the JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosDeviceEntry {
    /// Serial port path
    pub dev_name: String,
    /// Device report rate in Hz, or `-n` to run the device at 1 Hz and
    /// emit one report in `n + 1`
    pub dev_refresh: f64,
    #[serde(default)]
    pub dev_hdg_offset: f64,
    #[serde(default)]
    pub dev_hdg_deviation: f64,
    #[serde(default)]
    pub dev_roll_offset: f64,
    #[serde(default)]
    pub dev_pitch_offset: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_declination: Option<f64>,
}

/// I2C address given either as a number or as a hex string like `"0x4b"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AddressRepr", into = "u8")]
pub struct BusAddress(pub u8);

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Number(u8),
    Text(String),
}

impl TryFrom<AddressRepr> for BusAddress {
    type Error = String;

    fn try_from(repr: AddressRepr) -> Result<Self, Self::Error> {
        match repr {
            AddressRepr::Number(n) => Ok(Self(n)),
            AddressRepr::Text(s) => {
                let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
                u8::from_str_radix(digits, 16)
                    .map(Self)
                    .map_err(|e| format!("invalid bus address {s:?}: {e}"))
            }
        }
    }
}

impl From<BusAddress> for u8 {
    fn from(address: BusAddress) -> Self {
        address.0
    }
}

/// The whole configuration document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default)]
    pub imu_devices: Vec<ImuDeviceEntry>,
    #[serde(default)]
    pub ros_devices: Vec<RosDeviceEntry>,
    /// Declination used by devices that do not set their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declination: Option<f64>,
}

/// How a device is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    I2c { address: u8 },
    Serial { path: String },
}

/// Normalized per-device settings, fixed for the session
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub kind: DeviceKind,
    /// Device report rate, Hz
    pub rate_hz: f64,
    /// Samples skipped between emissions
    pub report_delay: u32,
    pub calibration_required: bool,
    pub offsets: AngleOffsets,
    pub corrections: HeadingCorrections,
}

impl DeviceConfig {
    /// Human-readable device name for logs
    pub fn name(&self) -> String {
        match &self.kind {
            DeviceKind::I2c { address } => format!("I2C {address:#04x}"),
            DeviceKind::Serial { path } => path.clone(),
        }
    }

    /// Interval between polls for sources that are paced by the host.
    ///
    /// Serial devices push reports on their own, so they are not paced.
    pub fn poll_interval(&self) -> Duration {
        match self.kind {
            // rate_hz is range-checked by to_device
            DeviceKind::I2c { .. } => poll_interval_for(self.rate_hz).unwrap_or(Duration::MAX),
            DeviceKind::Serial { .. } => Duration::ZERO,
        }
    }

    /// Report rate to program into a serial device
    pub fn serial_rate(&self) -> u8 {
        // rate_hz is validated to 1..=250 for serial devices
        self.rate_hz.round().clamp(0.0, f64::from(MAX_SERIAL_RATE_HZ)) as u8
    }

    pub fn throttle(&self) -> ReportThrottle {
        ReportThrottle::new(self.report_delay)
    }
}

/// Interval between polls at `rate_hz`, if it fits in a [`Duration`]
fn poll_interval_for(rate_hz: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(1.0 / rate_hz).ok()
}

impl ImuDeviceEntry {
    pub fn to_device(&self, default_declination: Option<f64>) -> HardwareResult<DeviceConfig> {
        if !(self.dev_refresh.is_finite() && self.dev_refresh > 0.0) {
            return Err(HardwareError::Config(format!(
                "I2C device {:#04x}: devRefresh must be positive, got {}",
                self.dev_name.0, self.dev_refresh
            )));
        }
        if poll_interval_for(self.dev_refresh).is_none() {
            return Err(HardwareError::Config(format!(
                "I2C device {:#04x}: devRefresh {} is too small",
                self.dev_name.0, self.dev_refresh
            )));
        }

        Ok(DeviceConfig {
            kind: DeviceKind::I2c {
                address: self.dev_name.0,
            },
            rate_hz: self.dev_refresh,
            report_delay: self.dev_delay_reports,
            calibration_required: self.dev_calib_required,
            offsets: AngleOffsets {
                roll_deg: self.dev_roll_offset,
                pitch_deg: self.dev_pitch_offset,
                heading_deg: self.dev_hdg_offset,
            },
            corrections: HeadingCorrections {
                deviation_deg: self.dev_hdg_deviation,
                declination_deg: self.dev_declination.or(default_declination),
            },
        })
    }
}

impl RosDeviceEntry {
    pub fn to_device(&self, default_declination: Option<f64>) -> HardwareResult<DeviceConfig> {
        if !self.dev_refresh.is_finite() {
            return Err(HardwareError::Config(format!(
                "Serial device {}: devRefresh must be a number",
                self.dev_name
            )));
        }

        // Non-positive refresh selects 1 Hz with a report divisor
        let (rate_hz, report_delay) = if self.dev_refresh <= 0.0 {
            (1.0, self.dev_refresh.abs().round() as u32)
        } else {
            (self.dev_refresh, 0)
        };

        let rate_hz = if rate_hz > f64::from(MAX_SERIAL_RATE_HZ) {
            warn!(
                "Serial device {}: rate {rate_hz} Hz above maximum, using {MAX_SERIAL_RATE_HZ} Hz",
                self.dev_name
            );
            f64::from(MAX_SERIAL_RATE_HZ)
        } else {
            rate_hz
        };

        Ok(DeviceConfig {
            kind: DeviceKind::Serial {
                path: self.dev_name.clone(),
            },
            rate_hz,
            report_delay,
            calibration_required: false,
            offsets: AngleOffsets {
                roll_deg: self.dev_roll_offset,
                pitch_deg: self.dev_pitch_offset,
                heading_deg: self.dev_hdg_offset,
            },
            corrections: HeadingCorrections {
                deviation_deg: self.dev_hdg_deviation,
                declination_deg: self.dev_declination.or(default_declination),
            },
        })
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> HardwareResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file(path: &Path) -> HardwareResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Read the configuration from the first line of a stream.
    pub fn read_first_line<R: BufRead>(reader: &mut R) -> HardwareResult<Self> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(HardwareError::Config(
                "Input closed before configuration was received".to_string(),
            ));
        }
        Self::from_json(&line)
    }

    pub fn save_to_file(&self, path: &Path) -> HardwareResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Normalize every entry, I2C devices first.
    pub fn devices(&self) -> HardwareResult<Vec<DeviceConfig>> {
        let i2c = self
            .imu_devices
            .iter()
            .map(|entry| entry.to_device(self.declination));
        let serial = self
            .ros_devices
            .iter()
            .map(|entry| entry.to_device(self.declination));
        i2c.chain(serial).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_forms() {
        let n: BusAddress = serde_json::from_str("75").unwrap();
        let s: BusAddress = serde_json::from_str("\"0x4b\"").unwrap();
        let bare: BusAddress = serde_json::from_str("\"4A\"").unwrap();
        assert_eq!(n, BusAddress(0x4B));
        assert_eq!(s, BusAddress(0x4B));
        assert_eq!(bare, BusAddress(0x4A));
        assert!(serde_json::from_str::<BusAddress>("\"0xZZ\"").is_err());
        assert!(serde_json::from_str::<BusAddress>("300").is_err());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let config =
            BridgeConfig::from_json(r#"{"rosDevices":[{"devName":"/dev/ttyS0","devRefresh":5}]}"#)
                .unwrap();
        assert!(config.imu_devices.is_empty());
        let device = &config.devices().unwrap()[0];
        assert_eq!(device.offsets, AngleOffsets::default());
        assert_eq!(device.corrections, HeadingCorrections::default());
        assert_eq!(device.serial_rate(), 5);
        assert_eq!(device.poll_interval(), Duration::ZERO);
    }

    #[test]
    fn test_serial_rate_is_capped() {
        let entry = RosDeviceEntry {
            dev_name: "/dev/ttyS0".into(),
            dev_refresh: 1000.0,
            dev_hdg_offset: 0.0,
            dev_hdg_deviation: 0.0,
            dev_roll_offset: 0.0,
            dev_pitch_offset: 0.0,
            dev_declination: None,
        };
        assert_eq!(entry.to_device(None).unwrap().serial_rate(), MAX_SERIAL_RATE_HZ);
    }

    #[test]
    fn test_i2c_rate_must_be_positive() {
        let config = BridgeConfig::from_json(r#"{"imuDevices":[{"devName":74,"devRefresh":0}]}"#)
            .unwrap();
        assert!(matches!(config.devices(), Err(HardwareError::Config(_))));
    }

    #[test]
    fn test_declination_precedence() {
        let config = BridgeConfig::from_json(
            r#"{"declination": 3.0,
                "imuDevices":[{"devName":74,"devRefresh":1,"devDeclination":-1.5},
                              {"devName":75,"devRefresh":1}]}"#,
        )
        .unwrap();
        let devices = config.devices().unwrap();
        assert_eq!(devices[0].corrections.declination_deg, Some(-1.5));
        assert_eq!(devices[1].corrections.declination_deg, Some(3.0));
    }
}
