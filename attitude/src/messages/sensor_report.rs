//! Active sensor report (tag 0x11)

use crate::angle::{wrap_degrees, AngleOffsets};
use crate::frame::FramingError;

use super::cursor::FieldCursor;
use super::{ControlFlags, RawTriplet, REPORT_TAG_SENSOR};

/// Magnetometer scale, µT per count
pub const MAG_SCALE: f64 = 0.15106201171875;

/// Euler angle scale, degrees per count
pub const EULER_SCALE_DEG: f64 = 0.0054931640625;

/// A decoded sensor report with raw field values.
///
/// Only fields whose control bit is set are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReport {
    pub control: ControlFlags,
    /// Module uptime in milliseconds
    pub timestamp_ms: u32,
    pub accel: Option<RawTriplet>,
    pub gyro: Option<RawTriplet>,
    pub aux: Option<RawTriplet>,
    pub magnetometer: Option<RawTriplet>,
    pub euler: Option<RawTriplet>,
}

impl SensorReport {
    /// Parse a validated payload.
    ///
    /// Returns `Ok(None)` for payloads that are not sensor reports (command
    /// acknowledgements and the like). Unknown control bits above bit 6 are
    /// ignored since their width is not known.
    ///
    /// # Errors
    ///
    /// [`FramingError::TruncatedPayload`] if the control bitmask promises
    /// more bytes than the payload holds.
    pub fn parse(payload: &[u8]) -> Result<Option<Self>, FramingError> {
        let mut cursor = FieldCursor::new(payload);
        if cursor.read_u8()? != REPORT_TAG_SENSOR {
            return Ok(None);
        }

        let control = ControlFlags::from_bits_truncate(cursor.read_u16_le()?);
        let timestamp_ms = cursor.read_u32_le()?;

        let mut report = Self {
            control,
            timestamp_ms,
            accel: None,
            gyro: None,
            aux: None,
            magnetometer: None,
            euler: None,
        };

        for (flag, width) in ControlFlags::FIELD_LAYOUT {
            if !control.contains(flag) {
                continue;
            }
            match report.field_mut(flag) {
                Some(slot) => *slot = Some(cursor.read_triplet()?),
                None => cursor.skip(width)?,
            }
        }

        Ok(Some(report))
    }

    /// Build a report whose control bitmask matches the populated fields.
    pub fn new(
        timestamp_ms: u32,
        magnetometer: Option<RawTriplet>,
        euler: Option<RawTriplet>,
    ) -> Self {
        let mut control = ControlFlags::empty();
        control.set(ControlFlags::MAGNETOMETER, magnetometer.is_some());
        control.set(ControlFlags::EULER, euler.is_some());
        Self {
            control,
            timestamp_ms,
            accel: None,
            gyro: None,
            aux: None,
            magnetometer,
            euler,
        }
    }

    /// Serialize back to payload bytes. Reserved fields are written as zeros.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.control.payload_len());
        out.push(REPORT_TAG_SENSOR);
        out.extend_from_slice(&self.control.bits().to_le_bytes());
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());

        for (flag, width) in ControlFlags::FIELD_LAYOUT {
            if !self.control.contains(flag) {
                continue;
            }
            match self.field(flag) {
                Some(triplet) => out.extend_from_slice(triplet.as_bytes()),
                None => out.resize(out.len() + width, 0),
            }
        }
        out
    }

    /// Triplet field for a single control bit, `None` for reserved bits
    pub fn field(&self, flag: ControlFlags) -> Option<RawTriplet> {
        if flag == ControlFlags::ACCEL {
            self.accel
        } else if flag == ControlFlags::GYRO {
            self.gyro
        } else if flag == ControlFlags::AUX {
            self.aux
        } else if flag == ControlFlags::MAGNETOMETER {
            self.magnetometer
        } else if flag == ControlFlags::EULER {
            self.euler
        } else {
            None
        }
    }

    fn field_mut(&mut self, flag: ControlFlags) -> Option<&mut Option<RawTriplet>> {
        if flag == ControlFlags::ACCEL {
            Some(&mut self.accel)
        } else if flag == ControlFlags::GYRO {
            Some(&mut self.gyro)
        } else if flag == ControlFlags::AUX {
            Some(&mut self.aux)
        } else if flag == ControlFlags::MAGNETOMETER {
            Some(&mut self.magnetometer)
        } else if flag == ControlFlags::EULER {
            Some(&mut self.euler)
        } else {
            None
        }
    }
}

/// Heading and attitude from one report, in degrees, offsets applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerialReading {
    /// Module uptime in milliseconds
    pub timestamp_ms: u32,
    /// Magnetic heading, clockwise from north, in [0, 360)
    pub heading_deg: Option<f64>,
    pub roll_deg: Option<f64>,
    pub pitch_deg: Option<f64>,
}

/// Heading from the magnetometer X/Y components, clockwise from north,
/// in [0, 360), before any offset.
pub fn magnetic_heading_deg(mag: &RawTriplet) -> f64 {
    let (x, y, _) = mag.scaled(MAG_SCALE);
    let angle = y.atan2(x).to_degrees();
    let heading = if angle < 0.0 { angle.abs() } else { 360.0 - angle };
    wrap_degrees(heading)
}

/// Roll and pitch in degrees from the Euler field, before offsets.
///
/// The module reports roll around ±180 when level, so it is folded back
/// towards zero: `-180 - x` for negative x, `180 - x` otherwise.
pub fn roll_pitch_deg(euler: &RawTriplet) -> (f64, f64) {
    let (x, y, _) = euler.scaled(EULER_SCALE_DEG);
    let roll = if x < 0.0 { -180.0 - x } else { 180.0 - x };
    (roll, -y)
}

/// Interpret a validated payload into a heading/attitude reading.
///
/// The heading offset is applied modulo 360; roll and pitch offsets are
/// added without wrapping. Returns `Ok(None)` for non-report payloads.
pub fn interpret(
    payload: &[u8],
    offsets: &AngleOffsets,
) -> Result<Option<SerialReading>, FramingError> {
    let Some(report) = SensorReport::parse(payload)? else {
        return Ok(None);
    };

    let heading_deg = report
        .magnetometer
        .map(|mag| wrap_degrees(magnetic_heading_deg(&mag) + offsets.heading_deg));

    let (roll_deg, pitch_deg) = match report.euler {
        Some(euler) => {
            let (roll, pitch) = roll_pitch_deg(&euler);
            (
                Some(roll + offsets.roll_deg),
                Some(pitch + offsets.pitch_deg),
            )
        }
        None => (None, None),
    };

    Ok(Some(SerialReading {
        timestamp_ms: report.timestamp_ms,
        heading_deg,
        roll_deg,
        pitch_deg,
    }))
}
