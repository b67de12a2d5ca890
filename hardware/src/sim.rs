//! Simulated devices for bench testing without hardware

use std::collections::VecDeque;

use attitude::{
    encode_frame, CalibrationQuality, Quaternion, RawTriplet, SensorReport, EULER_SCALE_DEG,
};

use crate::error::{HardwareError, HardwareResult};
use crate::i2c::{Feature, OrientationDriver};

/// Simulated I2C fusion IMU
///
/// Produces a quaternion for a fixed roll/pitch and a yaw that advances by
/// `yaw_rate_deg` on every read. Calibration quality follows a script and
/// then holds its last value.
#[derive(Debug, Clone)]
pub struct SimulatedImu {
    roll_deg: f64,
    pitch_deg: f64,
    yaw_deg: f64,
    yaw_rate_deg: f64,
    quality: CalibrationQuality,
    quality_script: VecDeque<CalibrationQuality>,
    enabled: Vec<Feature>,
    calibrating: bool,
    saved_calibrations: u32,
}

impl Default for SimulatedImu {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedImu {
    pub fn new() -> Self {
        Self {
            roll_deg: 0.0,
            pitch_deg: 0.0,
            yaw_deg: 0.0,
            yaw_rate_deg: 0.0,
            quality: CalibrationQuality::High,
            quality_script: VecDeque::new(),
            enabled: Vec::new(),
            calibrating: false,
            saved_calibrations: 0,
        }
    }

    /// Aerospace-convention orientation in degrees
    pub fn with_orientation(mut self, roll_deg: f64, pitch_deg: f64, yaw_deg: f64) -> Self {
        self.roll_deg = roll_deg;
        self.pitch_deg = pitch_deg;
        self.yaw_deg = yaw_deg;
        self
    }

    /// Yaw change per quaternion read, degrees
    pub fn with_yaw_rate(mut self, yaw_rate_deg: f64) -> Self {
        self.yaw_rate_deg = yaw_rate_deg;
        self
    }

    pub fn with_quality(mut self, quality: CalibrationQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Qualities returned by successive status reads
    pub fn with_quality_script(
        mut self,
        script: impl IntoIterator<Item = CalibrationQuality>,
    ) -> Self {
        self.quality_script = script.into_iter().collect();
        self
    }

    pub fn saved_calibrations(&self) -> u32 {
        self.saved_calibrations
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    pub fn enabled_features(&self) -> &[Feature] {
        &self.enabled
    }

    fn require(&self, feature: Feature) -> HardwareResult<()> {
        if self.enabled.contains(&feature) {
            Ok(())
        } else {
            Err(HardwareError::Driver(format!("{feature} report not enabled")))
        }
    }
}

/// Quaternion for aerospace roll/pitch/yaw (ZYX), degrees
pub fn quaternion_from_euler(roll_deg: f64, pitch_deg: f64, yaw_deg: f64) -> Quaternion {
    let (sr, cr) = (roll_deg.to_radians() / 2.0).sin_cos();
    let (sp, cp) = (pitch_deg.to_radians() / 2.0).sin_cos();
    let (sy, cy) = (yaw_deg.to_radians() / 2.0).sin_cos();
    Quaternion::new(
        cr * cp * cy + sr * sp * sy,
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
    )
}

impl OrientationDriver for SimulatedImu {
    fn quaternion(&mut self) -> HardwareResult<Quaternion> {
        self.require(Feature::GameRotationVector)?;
        let q = quaternion_from_euler(self.roll_deg, self.pitch_deg, self.yaw_deg);
        self.yaw_deg = (self.yaw_deg + self.yaw_rate_deg).rem_euclid(360.0);
        Ok(q)
    }

    fn magnetic(&mut self) -> HardwareResult<[f64; 3]> {
        self.require(Feature::Magnetometer)?;
        let (s, c) = self.yaw_deg.to_radians().sin_cos();
        Ok([30.0 * c, -30.0 * s, -40.0])
    }

    fn calibration_quality(&mut self) -> HardwareResult<CalibrationQuality> {
        if let Some(next) = self.quality_script.pop_front() {
            self.quality = next;
        }
        Ok(self.quality)
    }

    fn save_calibration(&mut self) -> HardwareResult<()> {
        self.saved_calibrations += 1;
        self.calibrating = false;
        Ok(())
    }

    fn begin_calibration(&mut self) -> HardwareResult<()> {
        self.calibrating = true;
        Ok(())
    }

    fn enable_feature(&mut self, feature: Feature) -> HardwareResult<()> {
        if !self.enabled.contains(&feature) {
            self.enabled.push(feature);
        }
        Ok(())
    }
}

/// Simulated serial IMU producing report frames
///
/// Heading sweeps by `heading_rate_deg` per frame. Frames carry the
/// magnetometer and Euler fields, as the bridge configures real modules to.
#[derive(Debug, Clone)]
pub struct SimulatedSerialImu {
    address: u8,
    heading_deg: f64,
    heading_rate_deg: f64,
    roll_deg: f64,
    pitch_deg: f64,
    timestamp_ms: u32,
    interval_ms: u32,
}

/// Field strength of the simulated magnetometer, counts
const MAG_COUNTS: f64 = 2000.0;

impl SimulatedSerialImu {
    pub fn new(address: u8, interval_ms: u32) -> Self {
        Self {
            address,
            heading_deg: 0.0,
            heading_rate_deg: 0.0,
            roll_deg: 0.0,
            pitch_deg: 0.0,
            timestamp_ms: 0,
            interval_ms,
        }
    }

    pub fn with_heading(mut self, heading_deg: f64, heading_rate_deg: f64) -> Self {
        self.heading_deg = heading_deg;
        self.heading_rate_deg = heading_rate_deg;
        self
    }

    /// Roll and pitch as the bridge reports them, degrees
    pub fn with_attitude(mut self, roll_deg: f64, pitch_deg: f64) -> Self {
        self.roll_deg = roll_deg;
        self.pitch_deg = pitch_deg;
        self
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    /// Sensor report the module would send for the current state
    pub fn report(&self) -> SensorReport {
        // Clockwise heading h corresponds to a field angle of -h
        let (s, c) = (-self.heading_deg).to_radians().sin_cos();
        let mag = RawTriplet::new(to_counts(MAG_COUNTS * c), to_counts(MAG_COUNTS * s), 0);

        let euler_x = if self.roll_deg < 0.0 {
            -180.0 - self.roll_deg
        } else {
            180.0 - self.roll_deg
        };
        let euler = RawTriplet::new(
            to_counts(euler_x / EULER_SCALE_DEG),
            to_counts(-self.pitch_deg / EULER_SCALE_DEG),
            0,
        );

        SensorReport::new(self.timestamp_ms, Some(mag), Some(euler))
    }

    /// Encoded frame for the current state, then advance one step
    pub fn next_frame(&mut self) -> HardwareResult<Vec<u8>> {
        let frame = encode_frame(self.address, &self.report().encode())?;
        self.heading_deg = (self.heading_deg + self.heading_rate_deg).rem_euclid(360.0);
        self.timestamp_ms = self.timestamp_ms.wrapping_add(self.interval_ms);
        Ok(frame)
    }
}

fn to_counts(value: f64) -> i16 {
    value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use attitude::{interpret, AngleOffsets, FrameDecoder};

    #[test]
    fn test_quaternion_requires_feature() {
        let mut imu = SimulatedImu::new();
        assert!(imu.quaternion().is_err());
        imu.enable_feature(Feature::GameRotationVector).unwrap();
        assert!(imu.quaternion().is_ok());
    }

    #[test]
    fn test_quaternion_round_trip_through_attitude() {
        let q = quaternion_from_euler(10.0, -5.0, 30.0);
        let (roll, pitch, yaw) = q.to_attitude().unwrap().to_degrees();
        // Bridge convention: roll and pitch negated, yaw clockwise
        assert_relative_eq!(roll, -10.0, epsilon = 1e-9);
        assert_relative_eq!(pitch, 5.0, epsilon = 1e-9);
        assert_relative_eq!(yaw, 330.0, epsilon = 1e-9);
    }

    #[test]
    fn test_quality_script_then_hold() {
        let mut imu = SimulatedImu::new()
            .with_quality_script([CalibrationQuality::Low, CalibrationQuality::Medium]);
        assert_eq!(imu.calibration_quality().unwrap(), CalibrationQuality::Low);
        assert_eq!(imu.calibration_quality().unwrap(), CalibrationQuality::Medium);
        assert_eq!(imu.calibration_quality().unwrap(), CalibrationQuality::Medium);
    }

    #[test]
    fn test_serial_frames_decode_to_state() {
        let mut imu = SimulatedSerialImu::new(0x01, 100)
            .with_heading(350.0, 20.0)
            .with_attitude(-12.0, 4.5);
        let mut decoder = FrameDecoder::new();

        for expected_heading in [350.0, 10.0, 30.0] {
            let frame = imu.next_frame().unwrap();
            let mut readings = Vec::new();
            decoder.feed_all(&frame, |payload| {
                readings.push(interpret(&payload, &AngleOffsets::default()).unwrap().unwrap());
            });
            assert_eq!(readings.len(), 1);

            let reading = readings[0];
            assert_relative_eq!(reading.heading_deg.unwrap(), expected_heading, epsilon = 0.1);
            assert_relative_eq!(reading.roll_deg.unwrap(), -12.0, epsilon = 0.01);
            assert_relative_eq!(reading.pitch_deg.unwrap(), 4.5, epsilon = 0.01);
        }
        assert_eq!(decoder.stats().frames_decoded, 3);
    }
}
