//! Calibration convergence gate
//!
//! Fusion chips report a 0-3 accuracy estimate for their magnetometer
//! calibration. The estimate flickers while the device is being moved, so a
//! single good reading is not enough: quality must stay at Medium or better
//! for a dwell time before the calibration is trusted and saved. If that
//! never happens within the session timeout the gate gives up.
//!
//! Time is passed in by the caller, so the gate is fully deterministic.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// How long quality must stay good before the calibration is accepted
pub const DWELL_TIME: Duration = Duration::from_secs(5);

/// How long to wait for convergence before giving up
pub const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(50);

/// Self-reported calibration accuracy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::FromRepr,
)]
#[repr(u8)]
pub enum CalibrationQuality {
    #[strum(to_string = "Accuracy Unreliable")]
    Unreliable = 0,
    #[strum(to_string = "Low Accuracy")]
    Low = 1,
    #[strum(to_string = "Medium Accuracy")]
    Medium = 2,
    #[strum(to_string = "High Accuracy")]
    High = 3,
}

impl CalibrationQuality {
    /// Map a raw status value. Anything above 3 is treated as unreliable.
    pub fn from_raw(raw: u8) -> Self {
        Self::from_repr(raw).unwrap_or_else(|| {
            warn!("Unknown calibration status {raw}, treating as unreliable");
            Self::Unreliable
        })
    }

    pub fn as_raw(self) -> u8 {
        self as u8
    }

    /// Medium or High
    pub fn is_good(self) -> bool {
        self >= Self::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum CalibrationStatus {
    /// Quality is below Medium
    Unconverged,
    /// Quality is good, waiting out the dwell time
    Converging,
    /// Quality held for the dwell time (terminal)
    Converged,
    /// No convergence before the timeout (terminal)
    TimedOut,
}

impl CalibrationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::TimedOut)
    }
}

/// Hysteresis state machine over calibration quality samples.
#[derive(Debug, Clone)]
pub struct CalibrationGate {
    start: Instant,
    dwell: Duration,
    timeout: Duration,
    good_since: Option<Instant>,
    status: CalibrationStatus,
    last_quality: Option<CalibrationQuality>,
}

impl CalibrationGate {
    /// Gate with the standard dwell time and timeout, counting from `start`
    pub fn new(start: Instant) -> Self {
        Self::with_timing(start, DWELL_TIME, CONVERGENCE_TIMEOUT)
    }

    pub fn with_timing(start: Instant, dwell: Duration, timeout: Duration) -> Self {
        Self {
            start,
            dwell,
            timeout,
            good_since: None,
            status: CalibrationStatus::Unconverged,
            last_quality: None,
        }
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    /// When quality last became good, if it still is
    pub fn good_since(&self) -> Option<Instant> {
        self.good_since
    }

    /// Most recent quality fed to the gate
    pub fn last_quality(&self) -> Option<CalibrationQuality> {
        self.last_quality
    }

    /// Time since the gate was started
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }

    /// Feed one quality sample taken at `now`.
    ///
    /// Returns the new status when it changed. Once the gate has converged
    /// or timed out, further samples are ignored and `None` is returned.
    pub fn observe(
        &mut self,
        quality: CalibrationQuality,
        now: Instant,
    ) -> Option<CalibrationStatus> {
        if self.status.is_terminal() {
            return None;
        }

        let previous = self.status;
        self.last_quality = Some(quality);

        if !quality.is_good() {
            self.status = CalibrationStatus::Unconverged;
            self.good_since = None;
        } else if self.status == CalibrationStatus::Unconverged {
            self.status = CalibrationStatus::Converging;
            self.good_since = Some(now);
        }

        let dwell_done = self
            .good_since
            .is_some_and(|since| now.saturating_duration_since(since) > self.dwell);

        if self.status == CalibrationStatus::Converging && dwell_done {
            self.status = CalibrationStatus::Converged;
        } else if self.elapsed(now) > self.timeout {
            self.status = CalibrationStatus::TimedOut;
        }

        if self.status == previous {
            return None;
        }
        debug!(
            "Calibration {previous} -> {} ({quality}, {:.1}s)",
            self.status,
            self.elapsed(now).as_secs_f64()
        );
        Some(self.status)
    }
}
