//! Delta telemetry output
//!
//! Each value is published as its own delta document, one JSON object per
//! line:
//!
//! ```json
//! {"updates":[{"source":{"label":"IMU sensor","src":"I2C_at[0x4b]"},
//!              "timestamp":"2026-01-01T00:00:00.000000Z",
//!              "values":[{"path":"navigation.headingMagnetic","value":1.57}]}]}
//! ```

use std::io::Write;
use std::sync::{Arc, Mutex};

use attitude::{AttitudeSample, CalibrationQuality};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HardwareError, HardwareResult};
use crate::source::SourceLabel;

pub const PATH_ATTITUDE: &str = "navigation.attitude";
pub const PATH_HEADING_MAGNETIC: &str = "navigation.headingMagnetic";
pub const PATH_HEADING_COMPASS: &str = "navigation.headingCompass";
pub const PATH_HEADING_TRUE: &str = "navigation.headingTrue";
pub const PATH_MAGNETIC_DEVIATION: &str = "navigation.magneticDeviation";
pub const PATH_CALIBRATION_STATUS: &str = "sensors.magnetometer.calibration_status";
pub const PATH_CALIBRATION_QUALITY: &str = "sensors.magnetometer.calibration_quality";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub updates: Vec<Update>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub source: Source,
    pub timestamp: String,
    pub values: Vec<PathValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub label: String,
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Attitude { roll: f64, pitch: f64, yaw: f64 },
    Number(f64),
    Text(String),
}

impl Delta {
    /// Single-value delta
    pub fn new(source: &SourceLabel, timestamp: &str, path: &str, value: Value) -> Self {
        Self {
            updates: vec![Update {
                source: Source {
                    label: source.label.clone(),
                    src: source.src.clone(),
                },
                timestamp: timestamp.to_string(),
                values: vec![PathValue {
                    path: path.to_string(),
                    value,
                }],
            }],
        }
    }
}

/// ISO-8601 UTC with microseconds and a `Z` suffix
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Deltas for one sample, angles in radians
pub fn sample_deltas(source: &SourceLabel, timestamp: &str, sample: &AttitudeSample) -> Vec<Delta> {
    let mut deltas = Vec::with_capacity(5);
    let mut push = |path: &str, value: Value| deltas.push(Delta::new(source, timestamp, path, value));

    if let Some(attitude) = sample.attitude {
        push(
            PATH_ATTITUDE,
            Value::Attitude {
                roll: attitude.roll,
                pitch: attitude.pitch,
                yaw: attitude.yaw,
            },
        );
    }
    if let Some(heading) = sample.heading_magnetic {
        push(PATH_HEADING_MAGNETIC, Value::Number(heading));
    }
    if let Some(heading) = sample.heading_compass {
        push(PATH_HEADING_COMPASS, Value::Number(heading));
        push(PATH_MAGNETIC_DEVIATION, Value::Number(sample.magnetic_deviation));
    }
    if let Some(heading) = sample.heading_true {
        push(PATH_HEADING_TRUE, Value::Number(heading));
    }
    deltas
}

/// Calibration status (raw 0-3) and its label
pub fn calibration_deltas(
    source: &SourceLabel,
    timestamp: &str,
    quality: CalibrationQuality,
) -> Vec<Delta> {
    vec![
        Delta::new(
            source,
            timestamp,
            PATH_CALIBRATION_STATUS,
            Value::Number(f64::from(quality.as_raw())),
        ),
        Delta::new(
            source,
            timestamp,
            PATH_CALIBRATION_QUALITY,
            Value::Text(quality.to_string()),
        ),
    ]
}

/// Sink for delta documents
pub trait TelemetryEmitter {
    fn emit(&mut self, delta: &Delta) -> HardwareResult<()>;

    fn emit_all(&mut self, deltas: &[Delta]) -> HardwareResult<()> {
        for delta in deltas {
            self.emit(delta)?;
        }
        Ok(())
    }
}

/// Writes one JSON document per line and flushes after each
pub struct DeltaEmitter<W: Write> {
    writer: W,
}

impl<W: Write> DeltaEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl DeltaEmitter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TelemetryEmitter for DeltaEmitter<W> {
    fn emit(&mut self, delta: &Delta) -> HardwareResult<()> {
        serde_json::to_writer(&mut self.writer, delta)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink
impl TelemetryEmitter for Vec<Delta> {
    fn emit(&mut self, delta: &Delta) -> HardwareResult<()> {
        self.push(delta.clone());
        Ok(())
    }
}

/// Shared sink for several sessions; the lock is held for one batch
impl<E: TelemetryEmitter> TelemetryEmitter for Arc<Mutex<E>> {
    fn emit(&mut self, delta: &Delta) -> HardwareResult<()> {
        self.lock()
            .map_err(|_| HardwareError::EmitterPoisoned)?
            .emit(delta)
    }

    fn emit_all(&mut self, deltas: &[Delta]) -> HardwareResult<()> {
        self.lock()
            .map_err(|_| HardwareError::EmitterPoisoned)?
            .emit_all(deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attitude::{Attitude, HeadingCorrections};
    use chrono::TimeZone;

    fn label() -> SourceLabel {
        SourceLabel::i2c(0x4B)
    }

    #[test]
    fn test_timestamp_format() {
        let time = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(format_timestamp(time), "2026-03-01T12:30:05.000000Z");
    }

    #[test]
    fn test_delta_json_shape() {
        let delta = Delta::new(&label(), "t", PATH_HEADING_MAGNETIC, Value::Number(1.5));
        let json: serde_json::Value = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "updates": [{
                    "source": {"label": "IMU sensor", "src": "I2C_at[0x4b]"},
                    "timestamp": "t",
                    "values": [{"path": "navigation.headingMagnetic", "value": 1.5}]
                }]
            })
        );
    }

    #[test]
    fn test_attitude_value_shape() {
        let value = serde_json::to_value(Value::Attitude {
            roll: 0.1,
            pitch: 0.2,
            yaw: 0.3,
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"roll": 0.1, "pitch": 0.2, "yaw": 0.3}));
    }

    #[test]
    fn test_sample_paths() {
        let corrections = HeadingCorrections {
            deviation_deg: 1.0,
            declination_deg: Some(2.0),
        };
        let sample = AttitudeSample::from_attitude(Attitude::new(0.0, 0.0, 1.0), &corrections);
        let paths: Vec<String> = sample_deltas(&label(), "t", &sample)
            .into_iter()
            .map(|d| d.updates[0].values[0].path.clone())
            .collect();
        assert_eq!(
            paths,
            vec![
                PATH_ATTITUDE,
                PATH_HEADING_MAGNETIC,
                PATH_HEADING_COMPASS,
                PATH_MAGNETIC_DEVIATION,
                PATH_HEADING_TRUE,
            ]
        );
    }

    #[test]
    fn test_no_true_heading_without_declination() {
        let sample =
            AttitudeSample::from_attitude(Attitude::default(), &HeadingCorrections::default());
        let deltas = sample_deltas(&label(), "t", &sample);
        assert_eq!(deltas.len(), 4);
        assert!(deltas
            .iter()
            .all(|d| d.updates[0].values[0].path != PATH_HEADING_TRUE));
    }

    #[test]
    fn test_calibration_deltas() {
        let deltas = calibration_deltas(&label(), "t", CalibrationQuality::High);
        assert_eq!(deltas[0].updates[0].values[0].value, Value::Number(3.0));
        assert_eq!(
            deltas[1].updates[0].values[0].value,
            Value::Text("High Accuracy".to_string())
        );
    }

    #[test]
    fn test_writer_emits_lines() {
        let mut emitter = DeltaEmitter::new(Vec::new());
        let deltas = calibration_deltas(&label(), "t", CalibrationQuality::Low);
        emitter.emit_all(&deltas).unwrap();

        let out = String::from_utf8(emitter.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Delta = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, deltas[1]);
    }

    #[test]
    fn test_shared_emitter() {
        let shared = Arc::new(Mutex::new(Vec::<Delta>::new()));
        let mut handle = Arc::clone(&shared);
        handle
            .emit(&Delta::new(&label(), "t", PATH_HEADING_TRUE, Value::Number(0.0)))
            .unwrap();
        assert_eq!(shared.lock().unwrap().len(), 1);
    }
}
