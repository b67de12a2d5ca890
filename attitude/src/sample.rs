//! Normalized attitude/heading sample, radians throughout

use crate::angle::{wrap_radians, Attitude};
use crate::messages::SerialReading;

/// Static heading corrections for a device, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadingCorrections {
    /// Compass deviation added to the magnetic heading
    pub deviation_deg: f64,
    /// Local magnetic declination. No true heading is produced without it.
    pub declination_deg: Option<f64>,
}

/// One output sample, ready for emission.
///
/// Headings are clockwise from north in [0, 2π).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttitudeSample {
    pub attitude: Option<Attitude>,
    pub heading_magnetic: Option<f64>,
    pub heading_compass: Option<f64>,
    pub heading_true: Option<f64>,
    /// Deviation applied to get the compass heading, radians
    pub magnetic_deviation: f64,
}

impl AttitudeSample {
    /// Sample from a fused attitude whose yaw is the magnetic heading.
    ///
    /// Offsets are expected to be applied to `attitude` already.
    pub fn from_attitude(attitude: Attitude, corrections: &HeadingCorrections) -> Self {
        Self {
            attitude: Some(attitude),
            ..Self::from_heading(Some(attitude.yaw), corrections)
        }
    }

    /// Sample from a serial reading. The serial module has no usable yaw, so
    /// yaw is reported as zero whenever roll and pitch are present.
    pub fn from_serial(reading: &SerialReading, corrections: &HeadingCorrections) -> Self {
        let attitude = match (reading.roll_deg, reading.pitch_deg) {
            (Some(roll), Some(pitch)) => Some(Attitude::from_degrees(roll, pitch, 0.0)),
            _ => None,
        };
        Self {
            attitude,
            ..Self::from_heading(reading.heading_deg.map(f64::to_radians), corrections)
        }
    }

    fn from_heading(heading_magnetic: Option<f64>, corrections: &HeadingCorrections) -> Self {
        let heading_magnetic = heading_magnetic.map(wrap_radians);
        let deviation = corrections.deviation_deg.to_radians();
        let heading_compass = heading_magnetic.map(|h| wrap_radians(h + deviation));
        let heading_true = corrections
            .declination_deg
            .and_then(|decl| heading_magnetic.map(|h| wrap_radians(h + decl.to_radians())));

        Self {
            attitude: None,
            heading_magnetic,
            heading_compass,
            heading_true,
            magnetic_deviation: deviation,
        }
    }

    /// True if there is nothing to emit
    pub fn is_empty(&self) -> bool {
        self.attitude.is_none() && self.heading_magnetic.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    #[test]
    fn test_compass_heading_wraps() {
        let corrections = HeadingCorrections {
            deviation_deg: 20.0,
            declination_deg: None,
        };
        let sample =
            AttitudeSample::from_attitude(Attitude::from_degrees(1.0, 2.0, 350.0), &corrections);
        assert_relative_eq!(sample.heading_magnetic.unwrap(), 350f64.to_radians(), epsilon = 1e-12);
        assert_relative_eq!(sample.heading_compass.unwrap(), 10f64.to_radians(), epsilon = 1e-12);
        assert_relative_eq!(sample.magnetic_deviation, 20f64.to_radians(), epsilon = 1e-12);
        assert_eq!(sample.heading_true, None);
        assert!(sample.attitude.is_some());
    }

    #[test]
    fn test_true_heading_from_declination() {
        let corrections = HeadingCorrections {
            deviation_deg: 0.0,
            declination_deg: Some(-90.0),
        };
        let sample = AttitudeSample::from_attitude(Attitude::new(0.0, 0.0, PI), &corrections);
        assert_relative_eq!(sample.heading_true.unwrap(), FRAC_PI_2, epsilon = 1e-12);

        let sample = AttitudeSample::from_attitude(Attitude::new(0.0, 0.0, 0.0), &corrections);
        assert_relative_eq!(sample.heading_true.unwrap(), 3.0 * FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_serial_reading_to_radians() {
        let reading = SerialReading {
            timestamp_ms: 0,
            heading_deg: Some(180.0),
            roll_deg: Some(90.0),
            pitch_deg: Some(-45.0),
        };
        let sample = AttitudeSample::from_serial(&reading, &HeadingCorrections::default());
        let attitude = sample.attitude.unwrap();
        assert_relative_eq!(attitude.roll, FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(attitude.pitch, -PI / 4.0, epsilon = 1e-12);
        assert_eq!(attitude.yaw, 0.0);
        assert_relative_eq!(sample.heading_magnetic.unwrap(), PI, epsilon = 1e-12);
        assert_eq!(sample.heading_magnetic, sample.heading_compass);
    }

    #[test]
    fn test_serial_heading_only() {
        let reading = SerialReading {
            timestamp_ms: 0,
            heading_deg: Some(0.0),
            roll_deg: None,
            pitch_deg: None,
        };
        let sample = AttitudeSample::from_serial(&reading, &HeadingCorrections::default());
        assert_eq!(sample.attitude, None);
        assert_eq!(sample.heading_magnetic, Some(0.0));
        assert!(!sample.is_empty());
    }

    #[test]
    fn test_headings_stay_in_range() {
        let corrections = HeadingCorrections {
            deviation_deg: 359.9,
            declination_deg: Some(-359.9),
        };
        for step in 0..36 {
            let yaw = f64::from(step) * TAU / 36.0;
            let sample = AttitudeSample::from_attitude(Attitude::new(0.0, 0.0, yaw), &corrections);
            for h in [sample.heading_magnetic, sample.heading_compass, sample.heading_true] {
                let h = h.unwrap();
                assert!((0.0..TAU).contains(&h), "{h}");
            }
        }
    }

    #[test]
    fn test_empty_reading() {
        let reading = SerialReading {
            timestamp_ms: 0,
            heading_deg: None,
            roll_deg: None,
            pitch_deg: None,
        };
        assert!(AttitudeSample::from_serial(&reading, &HeadingCorrections::default()).is_empty());
    }
}
