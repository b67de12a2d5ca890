//! Device side of the IMU bridge.
//!
//! Turns configured IMUs into running sessions that publish attitude and
//! heading deltas. Decoding and attitude math live in the `attitude` crate;
//! this crate adds configuration, transports, the calibration phase and
//! telemetry output.
//!
//! # Features
//!
//! - `serial` - serial IMUs speaking the framed report protocol
//! - `i2c` - fusion IMUs behind an [`i2c::OrientationDriver`], with the
//!   blocking calibration phase and a simulated driver

pub mod config;
pub mod emitter;
pub mod error;
pub mod session;
pub mod source;

#[cfg(feature = "i2c")]
pub mod calibrate;

#[cfg(feature = "i2c")]
pub mod i2c;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "i2c")]
pub mod sim;

pub use config::{BridgeConfig, DeviceConfig, DeviceKind};
pub use emitter::{Delta, DeltaEmitter, TelemetryEmitter};
pub use error::{HardwareError, HardwareResult};
pub use session::{Session, SessionHandle, SessionSummary};
pub use source::{AttitudeSource, SourceLabel};
