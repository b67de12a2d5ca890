//! Configuration documents as the host sends them

use std::io::Cursor;
use std::time::Duration;

use approx::assert_relative_eq;
use imu_hardware::{BridgeConfig, DeviceKind, HardwareError};
use tempfile::TempDir;

const HOST_CONFIG: &str = r#"{"imuDevices":[{"devName":"0x4b","devRefresh":20,"devDelayReports":3,"devCalibRequired":true,"devHdgOffset":1.5,"devHdgDeviation":-2.0,"devRollOffset":0.5,"devPitchOffset":-0.5}],"rosDevices":[{"devName":"/dev/ttyUSB0","devRefresh":-9,"devHdgOffset":0,"devRollOffset":0,"devPitchOffset":0},{"devName":"/dev/ttyUSB1","devRefresh":400}],"declination":4.0}"#;

#[test]
fn test_mixed_device_families() {
    let config = BridgeConfig::from_json(HOST_CONFIG).unwrap();
    let devices = config.devices().unwrap();
    assert_eq!(devices.len(), 3);

    let imu = &devices[0];
    assert_eq!(imu.kind, DeviceKind::I2c { address: 0x4B });
    assert!(imu.calibration_required);
    assert_relative_eq!(imu.poll_interval().as_secs_f64(), 0.05, epsilon = 1e-9);
    assert_relative_eq!(imu.offsets.heading_deg, 1.5);
    assert_relative_eq!(imu.corrections.deviation_deg, -2.0);
    assert_eq!(imu.corrections.declination_deg, Some(4.0));

    // Three reports skipped after each emitted one
    let mut throttle = imu.throttle();
    let emitted: Vec<bool> = (0..8).map(|_| throttle.tick()).collect();
    assert_eq!(
        emitted,
        [true, false, false, false, true, false, false, false]
    );
}

#[test]
fn test_serial_refresh_divisor() {
    let devices = BridgeConfig::from_json(HOST_CONFIG)
        .unwrap()
        .devices()
        .unwrap();

    let slow = &devices[1];
    assert_eq!(
        slow.kind,
        DeviceKind::Serial {
            path: "/dev/ttyUSB0".to_string()
        }
    );
    assert_eq!(slow.serial_rate(), 1);
    assert_eq!(slow.report_delay, 9);
    assert_eq!(slow.poll_interval(), Duration::ZERO);
    assert!(!slow.calibration_required);

    let mut throttle = slow.throttle();
    let emitted = (0..20).filter(|_| throttle.tick()).count();
    assert_eq!(emitted, 2);

    let fast = &devices[2];
    assert_eq!(fast.serial_rate(), 250);
    assert_eq!(fast.report_delay, 0);
}

#[test]
fn test_first_line_of_stream() {
    let input = format!("{HOST_CONFIG}\n{{\"updates\":[]}}\n");
    let mut reader = Cursor::new(input.into_bytes());
    let config = BridgeConfig::read_first_line(&mut reader).unwrap();
    assert_eq!(config.imu_devices.len(), 1);
    assert_eq!(config.ros_devices.len(), 2);

    let mut empty = Cursor::new(Vec::new());
    assert!(matches!(
        BridgeConfig::read_first_line(&mut empty),
        Err(HardwareError::Config(_))
    ));
}

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.json");

    let config = BridgeConfig::from_json(HOST_CONFIG).unwrap();
    config.save_to_file(&path).unwrap();
    let loaded = BridgeConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.devices().unwrap(), config.devices().unwrap());
}

#[test]
fn test_load_rejects_bad_documents() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        BridgeConfig::load_from_file(&missing),
        Err(HardwareError::Io(_))
    ));

    let garbled = dir.path().join("garbled.json");
    std::fs::write(&garbled, "{\"imuDevices\": [").unwrap();
    assert!(matches!(
        BridgeConfig::load_from_file(&garbled),
        Err(HardwareError::Json(_))
    ));

    let bad_rate = r#"{"imuDevices":[{"devName":74,"devRefresh":0}]}"#;
    let config = BridgeConfig::from_json(bad_rate).unwrap();
    assert!(matches!(config.devices(), Err(HardwareError::Config(_))));
}

#[test]
fn test_i2c_refresh_too_small_for_interval() {
    let config = BridgeConfig::from_json(r#"{"imuDevices":[{"devName":74,"devRefresh":1e-20}]}"#)
        .unwrap();
    assert!(matches!(config.devices(), Err(HardwareError::Config(_))));

    // Slow but representable rates are accepted
    let config = BridgeConfig::from_json(r#"{"imuDevices":[{"devName":74,"devRefresh":0.01}]}"#)
        .unwrap();
    let mut device = config.devices().unwrap().remove(0);
    assert_relative_eq!(device.poll_interval().as_secs_f64(), 100.0, epsilon = 1e-9);

    // Built by hand past validation: no panic, just never polls
    device.rate_hz = 1e-20;
    assert_eq!(device.poll_interval(), Duration::MAX);
}
