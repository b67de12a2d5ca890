//! Attitude math for fused IMU orientation
//!
//! Converts quaternions to roll/pitch/yaw and wraps angles. Roll and pitch are
//! reported clockwise (sign-flipped from the aerospace convention) and yaw is
//! folded into [0, 2π) clockwise from the reference, the way a compass reads.

use std::f64::consts::TAU;

use thiserror::Error;

/// Errors from attitude conversion
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AttitudeError {
    /// The quaternion cannot be normalized (zero or non-finite norm).
    #[error("Invalid orientation: quaternion norm is {norm}")]
    InvalidOrientation { norm: f64 },
}

/// Orientation quaternion as reported by the sensor fusion chip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Euclidean norm of the four components
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Convert to roll/pitch/yaw, see [`euler_from_quaternion`]
    pub fn to_attitude(&self) -> Result<Attitude, AttitudeError> {
        euler_from_quaternion(self.w, self.x, self.y, self.z)
    }
}

/// Roll, pitch and yaw in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    /// Roll, clockwise positive, in [-π, π]
    pub roll: f64,
    /// Pitch, clockwise positive, in [-π/2, π/2]
    pub pitch: f64,
    /// Yaw, clockwise from the reference
    pub yaw: f64,
}

impl Attitude {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Build from angles in degrees
    pub fn from_degrees(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            roll: roll.to_radians(),
            pitch: pitch.to_radians(),
            yaw: yaw.to_radians(),
        }
    }

    /// Convert to degrees as (roll, pitch, yaw)
    pub fn to_degrees(&self) -> (f64, f64, f64) {
        (
            self.roll.to_degrees(),
            self.pitch.to_degrees(),
            self.yaw.to_degrees(),
        )
    }

    /// Add mounting offsets. Yaw is re-wrapped into [0, 2π); roll and pitch
    /// are left as-is.
    pub fn with_offsets(self, offsets: &AngleOffsets) -> Self {
        Self {
            roll: self.roll + offsets.roll_deg.to_radians(),
            pitch: self.pitch + offsets.pitch_deg.to_radians(),
            yaw: wrap_radians(self.yaw + offsets.heading_deg.to_radians()),
        }
    }
}

/// Per-device mounting offsets, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleOffsets {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub heading_deg: f64,
}

/// Convert a quaternion to (roll, pitch, yaw) in radians.
///
/// The quaternion is normalized first. The pitch term is clamped to [-1, 1]
/// before `asin` so that rounding at the gimbal-lock boundary cannot produce
/// NaN. Roll and pitch are negated; yaw is mapped to [0, 2π) clockwise.
///
/// # Errors
///
/// Returns [`AttitudeError::InvalidOrientation`] for a zero or non-finite norm.
pub fn euler_from_quaternion(w: f64, x: f64, y: f64, z: f64) -> Result<Attitude, AttitudeError> {
    let norm = (w * w + x * x + y * y + z * z).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(AttitudeError::InvalidOrientation { norm });
    }

    let (w, x, y, z) = (w / norm, x / norm, y / norm, z / norm);
    let xsqr = x * x;
    let ysqr = y * y;
    let zsqr = z * z;

    let roll = -(2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (xsqr + ysqr));

    let t = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let pitch = -t.asin();

    let yaw_raw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (ysqr + zsqr));
    let yaw = if yaw_raw > 0.0 {
        TAU - yaw_raw
    } else {
        yaw_raw.abs()
    };

    // TAU minus a sub-ulp yaw_raw rounds to TAU itself
    Ok(Attitude {
        roll,
        pitch,
        yaw: wrap_radians(yaw),
    })
}

/// Wrap an angle in degrees into [0, 360)
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wrap an angle in radians into [0, 2π)
pub fn wrap_radians(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_identity_quaternion() {
        let att = euler_from_quaternion(1.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(att.roll, 0.0);
        assert_eq!(att.pitch, 0.0);
        assert_eq!(att.yaw, 0.0);
    }

    #[test]
    fn test_zero_quaternion_is_invalid() {
        let err = euler_from_quaternion(0.0, 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, AttitudeError::InvalidOrientation { .. }));
    }

    #[test]
    fn test_nan_quaternion_is_invalid() {
        assert!(euler_from_quaternion(f64::NAN, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_unnormalized_input_is_normalized() {
        let a = euler_from_quaternion(2.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(a, Attitude::default());

        let half = FRAC_PI_4 / 2.0;
        let unit = euler_from_quaternion(half.cos(), 0.0, 0.0, half.sin()).unwrap();
        let scaled = euler_from_quaternion(5.0 * half.cos(), 0.0, 0.0, 5.0 * half.sin()).unwrap();
        assert_relative_eq!(unit.yaw, scaled.yaw, epsilon = 1e-12);
    }

    #[test]
    fn test_positive_yaw_rotation_folds_clockwise() {
        // +90° about z (counter-clockwise) reads as 270° on a compass
        let half = FRAC_PI_2 / 2.0;
        let att = euler_from_quaternion(half.cos(), 0.0, 0.0, half.sin()).unwrap();
        assert_relative_eq!(att.yaw, 3.0 * FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(att.roll, 0.0, epsilon = 1e-12);
        assert_relative_eq!(att.pitch, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_yaw_rotation_is_absolute() {
        let half = -FRAC_PI_2 / 2.0;
        let att = euler_from_quaternion(half.cos(), 0.0, 0.0, half.sin()).unwrap();
        assert_relative_eq!(att.yaw, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_roll_sign_is_flipped() {
        let half: f64 = 0.3 / 2.0;
        let att = euler_from_quaternion(half.cos(), half.sin(), 0.0, 0.0).unwrap();
        assert_relative_eq!(att.roll, -0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_pitch_sign_is_flipped() {
        let half: f64 = 0.2 / 2.0;
        let att = euler_from_quaternion(half.cos(), 0.0, half.sin(), 0.0).unwrap();
        assert_relative_eq!(att.pitch, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_gimbal_lock_is_clamped() {
        // Exactly +90° pitch; rounding may push the asin argument past 1.0
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let att = euler_from_quaternion(s, 0.0, s, 0.0).unwrap();
        assert!(att.pitch.is_finite());
        assert_relative_eq!(att.pitch, -FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_yaw_range() {
        for step in 0..72 {
            let angle = -PI + step as f64 * (TAU / 72.0);
            let half = angle / 2.0;
            let att = euler_from_quaternion(half.cos(), 0.0, 0.0, half.sin()).unwrap();
            assert!((0.0..TAU).contains(&att.yaw), "yaw {} out of range", att.yaw);
        }
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_relative_eq!(wrap_degrees(370.5), 10.5, epsilon = 1e-12);
        assert_relative_eq!(wrap_degrees(-10.0), 350.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_degrees(-730.0), 350.0, epsilon = 1e-12);
        assert_eq!(wrap_degrees(-1e-20), 0.0);
    }

    #[test]
    fn test_wrap_radians() {
        assert_eq!(wrap_radians(TAU), 0.0);
        assert_relative_eq!(wrap_radians(-FRAC_PI_2), 3.0 * FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(wrap_radians(TAU + 1.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_offsets() {
        let offsets = AngleOffsets {
            roll_deg: 2.0,
            pitch_deg: -1.0,
            heading_deg: 20.0,
        };
        let att = Attitude::from_degrees(0.0, 0.0, 350.0).with_offsets(&offsets);
        let (roll, pitch, yaw) = att.to_degrees();
        assert_relative_eq!(roll, 2.0, epsilon = 1e-9);
        assert_relative_eq!(pitch, -1.0, epsilon = 1e-9);
        assert_relative_eq!(yaw, 10.0, epsilon = 1e-9);
    }
}
