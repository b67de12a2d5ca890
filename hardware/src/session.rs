//! Per-device session worker
//!
//! A session owns one [`AttitudeSource`] and runs the steady-state loop:
//! poll, throttle, emit, sleep. Sessions run on their own thread and share
//! nothing but a stop flag and the emitter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use attitude::{AttitudeSample, ReportThrottle};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{DeviceConfig, DeviceKind};
use crate::emitter::{calibration_deltas, format_timestamp, sample_deltas, TelemetryEmitter};
use crate::error::{HardwareError, HardwareResult};
use crate::source::AttitudeSource;

/// Emitted samples between calibration status updates
pub const CALIBRATION_REPORT_INTERVAL: u32 = 100;

/// Totals for a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub polls: u64,
    pub samples: u64,
    pub emitted: u64,
}

pub struct Session<S, E> {
    source: S,
    emitter: E,
    throttle: ReportThrottle,
    stop: Arc<AtomicBool>,
    pending: Vec<AttitudeSample>,
    calibration_countdown: u32,
    summary: SessionSummary,
}

impl<S: AttitudeSource, E: TelemetryEmitter> Session<S, E> {
    pub fn new(source: S, emitter: E, throttle: ReportThrottle) -> Self {
        Self {
            source,
            emitter,
            throttle,
            stop: Arc::new(AtomicBool::new(false)),
            pending: Vec::new(),
            calibration_countdown: CALIBRATION_REPORT_INTERVAL,
            summary: SessionSummary::default(),
        }
    }

    /// Flag that ends [`Session::run`] at the next wake
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_parts(self) -> (S, E) {
        (self.source, self.emitter)
    }

    /// Poll the source once and emit whatever passes the throttle.
    ///
    /// Returns the number of samples emitted.
    pub fn run_once(&mut self) -> HardwareResult<usize> {
        self.pending.clear();
        self.source.poll(&mut self.pending)?;
        self.summary.polls += 1;
        self.summary.samples += self.pending.len() as u64;

        if self.pending.is_empty() {
            return Ok(0);
        }

        let timestamp = format_timestamp(Utc::now());
        let mut emitted = 0;
        for sample in std::mem::take(&mut self.pending) {
            if !self.throttle.tick() {
                continue;
            }
            let deltas = sample_deltas(self.source.label(), &timestamp, &sample);
            self.emitter.emit_all(&deltas)?;
            emitted += 1;
            self.summary.emitted += 1;
            self.report_calibration(&timestamp)?;
        }
        Ok(emitted)
    }

    fn report_calibration(&mut self, timestamp: &str) -> HardwareResult<()> {
        self.calibration_countdown -= 1;
        if self.calibration_countdown > 0 {
            return Ok(());
        }
        self.calibration_countdown = CALIBRATION_REPORT_INTERVAL;
        if let Some(quality) = self.source.calibration_quality() {
            debug!("{}: periodic calibration status {quality}", self.source.label().src);
            let deltas = calibration_deltas(self.source.label(), timestamp, quality);
            self.emitter.emit_all(&deltas)?;
        }
        Ok(())
    }

    /// Run until stopped or the source is exhausted.
    pub fn run(&mut self) -> HardwareResult<SessionSummary> {
        let src = self.source.label().src.clone();
        info!("{src}: session started");

        while !self.stop.load(Ordering::Relaxed) {
            match self.run_once() {
                Ok(_) => {}
                Err(HardwareError::EndOfStream) => {
                    info!("{src}: end of stream");
                    break;
                }
                Err(e) => {
                    warn!("{src}: session ended: {e}");
                    return Err(e);
                }
            }

            let interval = self.source.poll_interval();
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }

        info!(
            "{src}: session finished, {} of {} samples emitted",
            self.summary.emitted, self.summary.samples
        );
        Ok(self.summary)
    }
}

impl<S, E> Session<S, E>
where
    S: AttitudeSource + Send + 'static,
    E: TelemetryEmitter + Send + 'static,
{
    /// Run the session on its own thread.
    pub fn spawn(self) -> HardwareResult<SessionHandle> {
        let name = self.source.label().src.clone();
        let stop = self.stop_flag();
        let mut session = self;
        let thread = thread::Builder::new()
            .name(format!("imu {name}"))
            .spawn(move || session.run())?;
        Ok(SessionHandle { name, stop, thread })
    }
}

/// Handle to a session running on its own thread
pub struct SessionHandle {
    name: String,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<HardwareResult<SessionSummary>>,
}

impl SessionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the session to stop at its next wake
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> HardwareResult<SessionSummary> {
        self.thread
            .join()
            .map_err(|_| HardwareError::SessionPanicked(self.name))?
    }
}

#[cfg(feature = "serial")]
pub fn serial_session<R, E>(
    reader: R,
    device: &DeviceConfig,
    emitter: E,
) -> HardwareResult<Session<crate::serial::SerialSource<R>, E>>
where
    R: std::io::Read,
    E: TelemetryEmitter,
{
    let DeviceKind::Serial { path } = &device.kind else {
        return Err(HardwareError::Config(format!(
            "{} is not a serial device",
            device.name()
        )));
    };
    let source = crate::serial::SerialSource::new(
        reader,
        crate::source::SourceLabel::serial(path),
        device.offsets,
        device.corrections,
    );
    Ok(Session::new(source, emitter, device.throttle()))
}

/// Build an I2C session: resolve the address, then calibrate or just enable
/// reports. Calibration results are emitted before the session starts.
#[cfg(feature = "i2c")]
pub fn i2c_session<D, E, C>(
    driver: D,
    device: &DeviceConfig,
    bus_scan: &[u8],
    clock: &C,
    mut emitter: E,
) -> HardwareResult<Session<crate::i2c::I2cSource<D>, E>>
where
    D: crate::i2c::OrientationDriver,
    E: TelemetryEmitter,
    C: crate::calibrate::Clock + ?Sized,
{
    let DeviceKind::I2c { address } = &device.kind else {
        return Err(HardwareError::Config(format!(
            "{} is not an I2C device",
            device.name()
        )));
    };
    let address = crate::i2c::resolve_address(*address, bus_scan)?;

    let mut source = crate::i2c::I2cSource::new(
        driver,
        address,
        device.offsets,
        device.corrections,
        device.poll_interval(),
    );

    if device.calibration_required {
        let gate = attitude::CalibrationGate::new(clock.now());
        let report = crate::calibrate::run_calibration(source.driver_mut(), clock, gate)?;
        let timestamp = format_timestamp(Utc::now());
        emitter.emit_all(&calibration_deltas(
            source.label(),
            &timestamp,
            report.quality,
        ))?;
    } else {
        source.start()?;
    }

    Ok(Session::new(source, emitter, device.throttle()))
}

/// Build and run an I2C session on its own thread.
///
/// Address resolution and the calibration phase happen on the worker, so a
/// device that is slow to calibrate does not hold up the others. Startup
/// failures such as a calibration timeout come back from
/// [`SessionHandle::join`].
#[cfg(feature = "i2c")]
pub fn spawn_i2c_session<D, E, C>(
    driver: D,
    device: DeviceConfig,
    bus_scan: Vec<u8>,
    clock: C,
    emitter: E,
) -> HardwareResult<SessionHandle>
where
    D: crate::i2c::OrientationDriver + Send + 'static,
    E: TelemetryEmitter + Send + 'static,
    C: crate::calibrate::Clock + Send + 'static,
{
    let name = device.name();
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let thread = thread::Builder::new()
        .name(format!("imu {name}"))
        .spawn(move || {
            let mut session = i2c_session(driver, &device, &bus_scan, &clock, emitter)?;
            session.stop = worker_stop;
            session.run()
        })?;
    Ok(SessionHandle { name, stop, thread })
}
