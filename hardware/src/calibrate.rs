//! Blocking calibration phase for I2C fusion IMUs
//!
//! Puts the chip into dynamic calibration, polls its self-reported quality
//! every [`CALIBRATION_POLL`] through a [`CalibrationGate`], and saves the
//! calibration once the gate converges. Time comes from a [`Clock`] so the
//! phase can be driven deterministically in tests.

use std::cell::Cell;
use std::time::{Duration, Instant};

use attitude::{CalibrationGate, CalibrationQuality, CalibrationStatus};
use tracing::{debug, error, info};

use crate::error::{HardwareError, HardwareResult};
use crate::i2c::{enable_reports, OrientationDriver};

/// Interval between quality reads while calibrating
pub const CALIBRATION_POLL: Duration = Duration::from_millis(100);

/// Source of monotonic time and delays
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time and real sleeps
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Simulated time: `sleep` advances the clock instantly
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Outcome of a successful calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationReport {
    pub quality: CalibrationQuality,
    pub elapsed: Duration,
}

/// Calibrate and save, blocking until the gate converges or times out.
///
/// Magnetometer and orientation reports are read on every poll to keep the
/// chip's report stream flowing while it calibrates.
///
/// # Errors
///
/// [`HardwareError::CalibrationTimeout`] if quality never held long enough,
/// or any driver error.
pub fn run_calibration<D, C>(
    driver: &mut D,
    clock: &C,
    gate: CalibrationGate,
) -> HardwareResult<CalibrationReport>
where
    D: OrientationDriver + ?Sized,
    C: Clock + ?Sized,
{
    let mut gate = gate;
    driver.begin_calibration()?;
    enable_reports(driver)?;
    info!("Calibration started, move the sensor through all orientations");

    loop {
        clock.sleep(CALIBRATION_POLL);
        let mag = driver.magnetic()?;
        driver.quaternion()?;
        let quality = driver.calibration_quality()?;
        let now = clock.now();

        match gate.observe(quality, now) {
            Some(CalibrationStatus::Converged) => {
                let elapsed = gate.elapsed(now);
                driver.save_calibration()?;
                info!(
                    "Calibration obtained in {:.1}s: {quality}",
                    elapsed.as_secs_f64()
                );
                return Ok(CalibrationReport { quality, elapsed });
            }
            Some(CalibrationStatus::TimedOut) => {
                let elapsed = gate.elapsed(now);
                error!("Calibration timeout after {:.1}s", elapsed.as_secs_f64());
                return Err(HardwareError::CalibrationTimeout {
                    elapsed,
                    last_quality: gate.last_quality(),
                });
            }
            Some(status) => debug!("Calibration {status}: {quality}, mag {mag:.1?}"),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedImu;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now() - t0, Duration::from_millis(250));
    }

    #[test]
    fn test_converges_and_saves() {
        let mut imu = SimulatedImu::new().with_quality(CalibrationQuality::Medium);
        let clock = ManualClock::new();
        let report = run_calibration(&mut imu, &clock, CalibrationGate::new(clock.now())).unwrap();

        assert_eq!(report.quality, CalibrationQuality::Medium);
        // Good from the first poll at 0.1 s; converged on the first poll past 5 s of dwell
        assert!(report.elapsed > Duration::from_millis(5100));
        assert!(report.elapsed <= Duration::from_millis(5200));
        assert_eq!(imu.saved_calibrations(), 1);
        assert!(!imu.is_calibrating());
    }

    #[test]
    fn test_times_out_without_saving() {
        let mut imu = SimulatedImu::new().with_quality(CalibrationQuality::Low);
        let clock = ManualClock::new();
        let err = run_calibration(&mut imu, &clock, CalibrationGate::new(clock.now())).unwrap_err();

        match err {
            HardwareError::CalibrationTimeout {
                elapsed,
                last_quality,
            } => {
                assert!(elapsed > Duration::from_secs(50));
                assert_eq!(last_quality, Some(CalibrationQuality::Low));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(imu.saved_calibrations(), 0);
    }
}
