//! Report payloads sent by the serial IMU
//!
//! A sensor report payload is laid out as:
//!
//! ```text
//! [tag=0x11][control: u16 LE][timestamp_ms: u32 LE][fields...]
//! ```
//!
//! Each set bit of the control bitmask adds one fixed-width field, in bit
//! order. Fields are positional, so every present field must be stepped over
//! to find the ones after it.

mod cursor;
mod sensor_report;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

pub use sensor_report::{
    interpret, magnetic_heading_deg, roll_pitch_deg, SensorReport, SerialReading,
    EULER_SCALE_DEG, MAG_SCALE,
};

/// Tag byte of an active sensor report
pub const REPORT_TAG_SENSOR: u8 = 0x11;

/// Bytes before the first optional field: tag, control word, timestamp
pub const REPORT_HEADER_LEN: usize = 7;

bitflags! {
    /// Control bitmask: which optional fields a report carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u16 {
        /// Acceleration, 3 × i16
        const ACCEL = 1 << 0;
        /// Angular rate, 3 × i16
        const GYRO = 1 << 1;
        /// Auxiliary channel (temperature / pressure), 3 × i16
        const AUX = 1 << 2;
        /// Magnetic field, 3 × i16
        const MAGNETOMETER = 1 << 3;
        /// Reserved, 8 bytes
        const RESERVED_4 = 1 << 4;
        /// Reserved, 8 bytes
        const RESERVED_5 = 1 << 5;
        /// Euler angles, 3 × i16
        const EULER = 1 << 6;
    }
}

impl ControlFlags {
    /// Optional fields in wire order with their widths in bytes
    pub const FIELD_LAYOUT: [(ControlFlags, usize); 7] = [
        (ControlFlags::ACCEL, 6),
        (ControlFlags::GYRO, 6),
        (ControlFlags::AUX, 6),
        (ControlFlags::MAGNETOMETER, 6),
        (ControlFlags::RESERVED_4, 8),
        (ControlFlags::RESERVED_5, 8),
        (ControlFlags::EULER, 6),
    ];

    /// Total payload length implied by this bitmask, header included
    pub fn payload_len(&self) -> usize {
        REPORT_HEADER_LEN
            + Self::FIELD_LAYOUT
                .iter()
                .filter(|(flag, _)| self.contains(*flag))
                .map(|(_, width)| width)
                .sum::<usize>()
    }
}

/// Three signed 16-bit little-endian axis values, as raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct RawTriplet {
    x: [u8; 2],
    y: [u8; 2],
    z: [u8; 2],
}

impl RawTriplet {
    /// Wire size in bytes
    pub const SIZE: usize = 6;

    pub fn new(x: i16, y: i16, z: i16) -> Self {
        Self {
            x: x.to_le_bytes(),
            y: y.to_le_bytes(),
            z: z.to_le_bytes(),
        }
    }

    pub fn x(&self) -> i16 {
        i16::from_le_bytes(self.x)
    }

    pub fn y(&self) -> i16 {
        i16::from_le_bytes(self.y)
    }

    pub fn z(&self) -> i16 {
        i16::from_le_bytes(self.z)
    }

    /// Raw bytes as they appear on the wire
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Scale all three axes to physical units
    pub fn scaled(&self, scale: f64) -> (f64, f64, f64) {
        (
            f64::from(self.x()) * scale,
            f64::from(self.y()) * scale,
            f64::from(self.z()) * scale,
        )
    }
}
