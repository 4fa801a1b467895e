//! On-disk round trips through the public API.

use std::fs;
use std::io::Write;

use batcon::protocol::{decode_auto, CapacitySummary, LogFormat, LogRecord, Reading, TestHeader};
use batcon::BatconError;
use tempfile::TempDir;

fn reference_header() -> TestHeader {
    TestHeader::builder()
        .fingerprint(0xABCD_1234)
        .team_id(1076)
        .battery_id("SIMBAT")
        .start_timestamp(1_727_539_212)
        .load_ohms(6.1)
        .poll_interval_ms(100)
        .min_volts_milli(10_500)
        .log_volts_milli(50)
        .build()
        .unwrap()
}

fn reference_record() -> LogRecord {
    LogRecord {
        header: reference_header(),
        readings: vec![
            Reading::from_voltage(12_000, 6100, 0),
            Reading::from_voltage(11_200, 6100, 1000),
        ],
        summary: CapacitySummary::new(1900),
    }
}

#[test]
fn test_reference_log_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("simbat.bclog");

    let record = reference_record();
    assert_eq!(record.header.load_milliohms, 6100);
    assert_eq!(record.readings[0].current_ma, 1967);
    assert_eq!(record.readings[1].current_ma, 1836);

    fs::write(&path, record.encode().unwrap()).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 48 + 12 * 2);

    let decoded = LogRecord::open(&path).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(decoded.header.battery_id, "SIMBAT");
    assert!((decoded.ampere_hours() - 1900.0 / 3600.0).abs() < 1e-12);
}

#[test]
fn test_framed_file_opens() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("framed.bclog");

    let record = reference_record();
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(LogFormat::Framed.preamble()).unwrap();
    file.write_all(&record.encode().unwrap()).unwrap();
    drop(file);

    assert_eq!(LogRecord::open(&path).unwrap(), record);
}

#[test]
fn test_truncated_file_reports_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.bclog");

    let bytes = reference_record().encode().unwrap();
    fs::write(&path, &bytes[..47]).unwrap();

    assert!(matches!(
        LogRecord::open(&path),
        Err(BatconError::TruncatedInput { .. })
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        LogRecord::open(dir.path().join("absent.bclog")),
        Err(BatconError::Io(_))
    ));
}

#[test]
fn test_partial_reading_is_misaligned() {
    let mut bytes = reference_record().encode().unwrap();
    bytes.extend_from_slice(&[0, 0, 0x2E, 0xE0]);
    assert!(matches!(
        decode_auto(&bytes),
        Err(BatconError::MisalignedLog { region_len: 28 })
    ));
}
