//! Complete on-disk log: header, readings, capacity trailer.
//!
//! ```text
//! [40-byte header] [N x 12-byte readings] [8-byte ampere-seconds]
//! ```
//! A log of N readings is exactly `48 + 12 * N` bytes.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capacity;
use crate::error::{BatconError, Result};
use crate::protocol::header::{TestHeader, HEADER_LEN};
use crate::protocol::reading::{Reading, READING_LEN};

/// Encoded size of a [`CapacitySummary`].
pub const SUMMARY_LEN: usize = 8;

/// Smallest well-formed log: a header and a trailer with no readings.
pub const MIN_LOG_LEN: usize = HEADER_LEN + SUMMARY_LEN;

/// Total charge delivered during the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapacitySummary {
    /// Integrated charge, truncated to whole ampere-seconds.
    pub ampere_seconds: u64,
}

impl CapacitySummary {
    /// Wrap a stored ampere-second count.
    pub fn new(ampere_seconds: u64) -> Self {
        Self { ampere_seconds }
    }

    /// Integrate a closed reading series into a summary.
    pub fn from_readings(readings: &[Reading]) -> Self {
        Self::new(capacity::ampere_seconds(readings))
    }

    /// Charge in ampere-hours, for display.
    pub fn ampere_hours(&self) -> f64 {
        capacity::ampere_hours(self.ampere_seconds)
    }

    /// Serialize into the 8-byte trailer.
    pub fn encode(&self) -> [u8; SUMMARY_LEN] {
        self.ampere_seconds.to_be_bytes()
    }

    /// Parse the first 8 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < SUMMARY_LEN {
            return Err(BatconError::TruncatedInput {
                expected: SUMMARY_LEN,
                actual: data.len(),
            });
        }
        let mut raw = [0u8; SUMMARY_LEN];
        raw.copy_from_slice(&data[..SUMMARY_LEN]);
        Ok(Self::new(u64::from_be_bytes(raw)))
    }
}

/// Decoded battery test log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Test parameters.
    pub header: TestHeader,
    /// Persisted readings in capture order.
    pub readings: Vec<Reading>,
    /// Capacity trailer as stored.
    pub summary: CapacitySummary,
}

impl LogRecord {
    /// Read a whole log from a byte source and decode it, legacy or framed.
    pub fn read_from<R: Read>(mut source: R) -> Result<Self> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        crate::protocol::container::decode_auto(&data)
    }

    /// Load and decode a log file, accepting both legacy and framed files.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path)?;
        crate::protocol::container::decode_auto(&data)
    }

    /// Canonical legacy byte layout of this record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(MIN_LOG_LEN + READING_LEN * self.readings.len());
        out.extend_from_slice(&self.header.encode()?);
        for reading in &self.readings {
            out.extend_from_slice(&reading.encode());
        }
        out.extend_from_slice(&self.summary.encode());
        Ok(out)
    }

    /// Stored capacity in ampere-hours.
    pub fn ampere_hours(&self) -> f64 {
        self.summary.ampere_hours()
    }

    /// Time between the first and last logged reading.
    pub fn duration(&self) -> Duration {
        match (self.readings.first(), self.readings.last()) {
            (Some(first), Some(last)) => {
                Duration::from_millis(u64::from(last.elapsed_ms.saturating_sub(first.elapsed_ms)))
            }
            _ => Duration::ZERO,
        }
    }

    /// Re-integrate the readings and compare against the stored trailer.
    pub fn verify_capacity(&self) -> bool {
        CapacitySummary::from_readings(&self.readings) == self.summary
    }
}

/// Decode a legacy (unframed) log.
pub fn decode(data: &[u8]) -> Result<LogRecord> {
    if data.len() < MIN_LOG_LEN {
        return Err(BatconError::TruncatedInput {
            expected: MIN_LOG_LEN,
            actual: data.len(),
        });
    }

    let region_len = data.len() - MIN_LOG_LEN;
    if region_len % READING_LEN != 0 {
        return Err(BatconError::MisalignedLog { region_len });
    }

    let header = TestHeader::decode(&data[..HEADER_LEN])?;
    let trailer_start = data.len() - SUMMARY_LEN;
    let readings = data[HEADER_LEN..trailer_start]
        .chunks_exact(READING_LEN)
        .map(Reading::decode)
        .collect::<Result<Vec<_>>>()?;
    let summary = CapacitySummary::decode(&data[trailer_start..])?;

    Ok(LogRecord {
        header,
        readings,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_record() -> LogRecord {
        LogRecord {
            header: TestHeader {
                fingerprint: 0xABCD_1234,
                team_id: 1076,
                battery_id: "SIMBAT".to_string(),
                start_timestamp: 1_727_539_212,
                load_milliohms: 6100,
                poll_interval_ms: 100,
                min_volts_milli: 10_500,
                log_volts_milli: 50,
            },
            readings: vec![
                Reading {
                    voltage_mv: 12_000,
                    current_ma: 1967,
                    elapsed_ms: 0,
                },
                Reading {
                    voltage_mv: 11_200,
                    current_ma: 1836,
                    elapsed_ms: 1000,
                },
            ],
            summary: CapacitySummary::new(1900),
        }
    }

    #[test]
    fn test_reference_log() {
        let record = sim_record();
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len(), 48 + 12 * 2);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.summary.ampere_seconds, 1900);
        assert!((decoded.ampere_hours() - 1900.0 / 3600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_reading_region() {
        let mut record = sim_record();
        record.readings.clear();
        record.summary = CapacitySummary::default();
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len(), MIN_LOG_LEN);
        assert_eq!(decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_misaligned_tail() {
        let bytes = sim_record().encode().unwrap();
        for extra in 1..READING_LEN {
            let mut corrupt = bytes.clone();
            corrupt.extend(std::iter::repeat(0xEE).take(extra));
            assert!(matches!(
                decode(&corrupt),
                Err(BatconError::MisalignedLog { .. })
            ));
        }
    }

    #[test]
    fn test_truncated_below_minimum() {
        let bytes = sim_record().encode().unwrap();
        for len in [0, 1, 39, 40, 47] {
            assert!(matches!(
                decode(&bytes[..len]),
                Err(BatconError::TruncatedInput { expected: 48, .. })
            ));
        }
    }

    #[test]
    fn test_read_from_stream() {
        let bytes = sim_record().encode().unwrap();
        let decoded = LogRecord::read_from(bytes.as_slice()).unwrap();
        assert_eq!(decoded.readings.len(), 2);
    }

    #[test]
    fn test_read_from_framed_stream() {
        let record = sim_record();
        let mut bytes = crate::protocol::LogFormat::Framed.preamble().to_vec();
        bytes.extend(record.encode().unwrap());
        let decoded = LogRecord::read_from(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_duration_and_verify() {
        let record = sim_record();
        assert_eq!(record.duration(), Duration::from_millis(1000));
        // The reference trailer was not produced by integration.
        assert!(!record.verify_capacity());

        let mut honest = record;
        honest.summary = CapacitySummary::from_readings(&honest.readings);
        assert!(honest.verify_capacity());
    }
}
