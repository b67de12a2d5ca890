//! Host-to-device command frames for the serial IMU
//!
//! Commands use the same framing as device reports (see [`crate::frame`])
//! but are addressed to [`BROADCAST_ADDRESS`] and are preceded by a wake
//! preamble so a sleeping module syncs its UART before the frame arrives.

use thiserror::Error;

use crate::checksum::compute_checksum;
use crate::frame::{BROADCAST_ADDRESS, FRAME_END, FRAME_START, MAX_PAYLOAD_LEN};
use crate::messages::ControlFlags;

/// Longest command payload the module accepts
pub const MAX_COMMAND_LEN: usize = 19;

/// Idle bytes sent ahead of every command frame
pub const WAKE_PREAMBLE: [u8; 50] = {
    let mut preamble = [0u8; 50];
    preamble[47] = 0xFF;
    preamble[49] = 0xFF;
    preamble
};

/// Command tags (first payload byte)
mod tag {
    pub const WAKE_UP: u8 = 0x03;
    pub const STOP_MAG_CALIBRATION: u8 = 0x04;
    pub const RESET_YAW: u8 = 0x05;
    pub const CONFIGURE_REPORTING: u8 = 0x12;
    pub const ENABLE_REPORTING: u8 = 0x19;
    pub const START_MAG_CALIBRATION: u8 = 0x32;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("Payload length {len} out of range 1..={max}")]
    InvalidLength { len: usize, max: usize },
}

/// Encode a single frame `[START][addr][len][payload][checksum][END]`.
///
/// # Errors
///
/// Returns [`CommandError::InvalidLength`] if the payload is empty or longer
/// than [`MAX_PAYLOAD_LEN`].
pub fn encode_frame(address: u8, payload: &[u8]) -> Result<Vec<u8>, CommandError> {
    if payload.is_empty() || payload.len() > MAX_PAYLOAD_LEN {
        return Err(CommandError::InvalidLength {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut frame = Vec::with_capacity(payload.len() + 5);
    write_frame(&mut frame, address, payload);
    Ok(frame)
}

fn write_frame(out: &mut Vec<u8>, address: u8, payload: &[u8]) {
    debug_assert!(!payload.is_empty() && payload.len() <= MAX_PAYLOAD_LEN);

    let body_start = out.len() + 1;
    out.push(FRAME_START);
    out.push(address);
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
    let checksum = compute_checksum(&out[body_start..]);
    out.push(checksum);
    out.push(FRAME_END);
}

/// Parameters for the module's active reporting mode.
///
/// Filter coefficients trade stability for latency: larger is smoother.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingConfig {
    /// Acceleration threshold below which the module is considered stationary
    pub stationary_threshold: u8,
    /// Zero-return speed when stationary, cm/s (0 = never, 255 = immediately)
    pub static_zero_return: u8,
    /// Zero-return speed when moving, cm/s (0 = never)
    pub dynamic_zero_return: u8,
    /// Barometer filter level, 0-3
    pub barometer_filter: u8,
    /// Fuse the magnetometer into the heading
    pub compass_enabled: bool,
    /// Report rate in Hz, 0-250 (0 means 0.5 Hz)
    pub rate_hz: u8,
    /// Gyroscope filter coefficient, 0-2
    pub gyro_filter: u8,
    /// Accelerometer filter coefficient, 0-4
    pub accel_filter: u8,
    /// Magnetometer filter coefficient, 0-9
    pub mag_filter: u8,
    /// Fields included in each report
    pub report_fields: ControlFlags,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            stationary_threshold: 5,
            static_zero_return: 255,
            dynamic_zero_return: 0,
            barometer_filter: 2,
            compass_enabled: true,
            rate_hz: 1,
            gyro_filter: 1,
            accel_filter: 3,
            mag_filter: 5,
            report_fields: ControlFlags::MAGNETOMETER | ControlFlags::EULER,
        }
    }
}

impl ReportingConfig {
    /// Default configuration at the given report rate
    pub fn with_rate(rate_hz: u8) -> Self {
        Self {
            rate_hz,
            ..Self::default()
        }
    }

    fn to_payload(self) -> [u8; 11] {
        let fields = self.report_fields.bits().to_le_bytes();
        [
            tag::CONFIGURE_REPORTING,
            self.stationary_threshold,
            self.static_zero_return,
            self.dynamic_zero_return,
            ((self.barometer_filter & 0x03) << 1) | u8::from(self.compass_enabled),
            self.rate_hz,
            self.gyro_filter,
            self.accel_filter,
            self.mag_filter,
            fields[0],
            fields[1],
        ]
    }
}

/// Commands understood by the serial IMU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set report rate, filters and report contents
    ConfigureReporting(ReportingConfig),
    /// Leave sleep mode
    WakeUp,
    /// Start sending reports without being polled
    EnableReporting,
    /// Begin magnetometer calibration (rotate the module on all axes)
    StartMagCalibration,
    /// End magnetometer calibration and store the result
    StopMagCalibration,
    /// Zero the Z-axis angle
    ResetYaw,
}

impl Command {
    /// Command payload, tag byte first
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Command::ConfigureReporting(config) => config.to_payload().to_vec(),
            Command::WakeUp => vec![tag::WAKE_UP],
            Command::EnableReporting => vec![tag::ENABLE_REPORTING],
            Command::StartMagCalibration => vec![tag::START_MAG_CALIBRATION],
            Command::StopMagCalibration => vec![tag::STOP_MAG_CALIBRATION],
            Command::ResetYaw => vec![tag::RESET_YAW],
        }
    }

    /// Wire bytes: wake preamble followed by a broadcast frame
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();
        debug_assert!(payload.len() <= MAX_COMMAND_LEN);

        let mut out = Vec::with_capacity(WAKE_PREAMBLE.len() + payload.len() + 5);
        out.extend_from_slice(&WAKE_PREAMBLE);
        write_frame(&mut out, BROADCAST_ADDRESS, &payload);
        out
    }
}
