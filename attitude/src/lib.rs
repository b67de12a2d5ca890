//! Attitude and heading decoding for marine IMUs
//!
//! This crate holds the device-independent core of the IMU bridge:
//!
//! - [`euler_from_quaternion`] and friends convert fused quaternions from I2C
//!   IMUs into roll/pitch/yaw using the clockwise compass convention.
//! - [`FrameDecoder`] turns the serial IMU's byte stream into checksummed
//!   payloads, one byte at a time.
//! - [`messages`] interprets those payloads (control bitmask, magnetometer
//!   heading, Euler roll/pitch).
//! - [`CalibrationGate`] decides when a device's self-reported calibration
//!   quality has been good for long enough to trust.
//! - [`ReportThrottle`] decouples device sample rate from output rate.
//!
//! Bus access, device configuration and telemetry output live in the
//! `imu-hardware` crate.

mod angle;
mod calibration;
mod checksum;
mod command;
mod frame;
pub mod messages;
mod sample;
mod throttle;

pub use angle::{
    euler_from_quaternion, wrap_degrees, wrap_radians, AngleOffsets, Attitude, AttitudeError,
    Quaternion,
};
pub use calibration::{
    CalibrationGate, CalibrationQuality, CalibrationStatus, CONVERGENCE_TIMEOUT, DWELL_TIME,
};
pub use checksum::{compute_checksum, verify_frame_checksum};
pub use command::{
    encode_frame, Command, CommandError, ReportingConfig, MAX_COMMAND_LEN, WAKE_PREAMBLE,
};
pub use frame::{
    DecoderState, DecoderStats, FrameDecoder, FramingError, ValidatedPayload, BROADCAST_ADDRESS,
    FRAME_END, FRAME_OVERHEAD, FRAME_START, MAX_PAYLOAD_LEN,
};
pub use messages::{
    interpret, ControlFlags, RawTriplet, SensorReport, SerialReading, EULER_SCALE_DEG, MAG_SCALE,
};
pub use sample::{AttitudeSample, HeadingCorrections};
pub use throttle::ReportThrottle;
