//! Fixed 40-byte test header.
//!
//! # Layout
//! ```text
//! offset 0   : fingerprint        u32
//! offset 4   : team_id            u16
//! offset 6   : battery_id         10 bytes, ASCII, zero-padded on the right
//! offset 16  : start_timestamp    u64 (epoch seconds)
//! offset 24  : load_milliohms     u32 (ohms x 1000)
//! offset 28  : poll_interval_ms   u32
//! offset 32  : min_volts_milli    u32
//! offset 36  : log_volts_milli    u32
//! ```
//! All integers are big-endian.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{BatconError, Result};
use crate::fingerprint;

/// Encoded size of a [`TestHeader`].
pub const HEADER_LEN: usize = 40;

/// Width of the zero-padded battery identifier field.
pub const BATTERY_ID_LEN: usize = 10;

/// Parameters of one battery capacity test, written once at test start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestHeader {
    /// Opaque run identifier, derived externally from the test parameters.
    pub fingerprint: u32,
    /// Numeric team designation.
    pub team_id: u16,
    /// ASCII battery label, at most 10 bytes.
    pub battery_id: String,
    /// Wall-clock start of the test in epoch seconds.
    pub start_timestamp: u64,
    /// Load resistance in thousandths of an ohm.
    pub load_milliohms: u32,
    /// Nominal delay between samples.
    pub poll_interval_ms: u32,
    /// Voltage at which the test stops.
    pub min_volts_milli: u32,
    /// Minimum voltage drop since the last logged sample before another is logged.
    pub log_volts_milli: u32,
}

impl TestHeader {
    /// Start building a validated header.
    pub fn builder() -> TestHeaderBuilder {
        TestHeaderBuilder::default()
    }

    /// Load resistance in ohms.
    pub fn load_ohms(&self) -> f64 {
        f64::from(self.load_milliohms) / 1000.0
    }

    /// Check every invariant that must hold before the header is written.
    pub fn validate(&self) -> Result<()> {
        validate_battery_id(&self.battery_id)?;
        if self.load_milliohms == 0 {
            return Err(BatconError::Validation(
                "load resistance must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize into the 40-byte on-disk form.
    pub fn encode(&self) -> Result<[u8; HEADER_LEN]> {
        self.validate()?;

        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.fingerprint.to_be_bytes());
        buf[4..6].copy_from_slice(&self.team_id.to_be_bytes());
        let id = self.battery_id.as_bytes();
        buf[6..6 + id.len()].copy_from_slice(id);
        buf[16..24].copy_from_slice(&self.start_timestamp.to_be_bytes());
        buf[24..28].copy_from_slice(&self.load_milliohms.to_be_bytes());
        buf[28..32].copy_from_slice(&self.poll_interval_ms.to_be_bytes());
        buf[32..36].copy_from_slice(&self.min_volts_milli.to_be_bytes());
        buf[36..40].copy_from_slice(&self.log_volts_milli.to_be_bytes());
        Ok(buf)
    }

    /// Parse the first 40 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(BatconError::TruncatedInput {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }

        Ok(Self {
            fingerprint: be_u32(&data[0..4]),
            team_id: u16::from_be_bytes([data[4], data[5]]),
            battery_id: decode_battery_id(&data[6..16])?,
            start_timestamp: be_u64(&data[16..24]),
            load_milliohms: be_u32(&data[24..28]),
            poll_interval_ms: be_u32(&data[28..32]),
            min_volts_milli: be_u32(&data[32..36]),
            log_volts_milli: be_u32(&data[36..40]),
        })
    }

    /// Start time as a local date-time, if the timestamp is representable.
    pub fn start_time(&self) -> Option<DateTime<Local>> {
        let secs = i64::try_from(self.start_timestamp).ok()?;
        DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&Local))
    }
}

impl fmt::Display for TestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Battery Conditioner and Capacity Test")?;
        writeln!(f, "# Fingerprint: {:08x}", self.fingerprint)?;
        writeln!(f, "# Team Number: {}", self.team_id)?;
        writeln!(f, "# Battery ID: {}", self.battery_id)?;
        writeln!(f, "# Load (Ohms): {:.3}", self.load_ohms())?;
        match self.start_time() {
            Some(start) => writeln!(f, "# Start Time: {}", start.format("%Y-%m-%d %H:%M:%S %z"))?,
            None => writeln!(f, "# Start Time: {} (epoch seconds)", self.start_timestamp)?,
        }
        writeln!(f, "# Poll Interval: {} ms", self.poll_interval_ms)?;
        writeln!(f, "# Delta-V Logging Threshold: {} mV", self.log_volts_milli)?;
        write!(f, "# Minimum Volts: {} mV", self.min_volts_milli)
    }
}

/// Convert ohms to the fixed-point x1000 representation, truncating extra digits.
pub fn load_milliohms_from_ohms(ohms: f64) -> Result<u32> {
    if !ohms.is_finite() || ohms <= 0.0 {
        return Err(BatconError::Validation(format!(
            "load resistance must be a positive number of ohms, got {ohms}"
        )));
    }
    // Round away float noise first so 6.1 becomes 6100, not 6099.
    let scaled = (ohms * 1000.0 * 1e6).round() / 1e6;
    let milliohms = scaled.trunc();
    if milliohms < 1.0 {
        return Err(BatconError::Validation(format!(
            "load resistance {ohms} ohms is below the 0.001 ohm resolution"
        )));
    }
    if milliohms > f64::from(u32::MAX) {
        return Err(BatconError::Validation(format!(
            "load resistance {ohms} ohms does not fit the 32-bit field"
        )));
    }
    Ok(milliohms as u32)
}

fn validate_battery_id(id: &str) -> Result<()> {
    if id.len() > BATTERY_ID_LEN {
        return Err(BatconError::Validation(format!(
            "battery ID '{id}' is {} bytes, limit is {BATTERY_ID_LEN}",
            id.len()
        )));
    }
    if !id.is_ascii() {
        return Err(BatconError::Validation(format!(
            "battery ID '{id}' must be ASCII"
        )));
    }
    if id.bytes().any(|b| b == 0) {
        return Err(BatconError::Validation(
            "battery ID must not contain NUL bytes".to_string(),
        ));
    }
    Ok(())
}

/// Strip zero padding from the battery ID field.
///
/// Padding is normally on the right. Early loggers padded on the left, so
/// leading zero bytes are dropped before cutting at the first remaining zero.
fn decode_battery_id(field: &[u8]) -> Result<String> {
    let start = field.iter().position(|&b| b != 0).unwrap_or(field.len());
    let rest = &field[start..];
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    let id = &rest[..end];
    if !id.is_ascii() {
        return Err(BatconError::Validation(format!(
            "battery ID bytes {id:02x?} are not ASCII"
        )));
    }
    Ok(id.iter().map(|&b| char::from(b)).collect())
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(raw)
}

/// Builder for [`TestHeader`] that validates CLI/config input.
#[derive(Debug, Clone, Default)]
pub struct TestHeaderBuilder {
    fingerprint: Option<u32>,
    team_id: u32,
    battery_id: String,
    start_timestamp: Option<u64>,
    load_ohms: f64,
    poll_interval_ms: u32,
    min_volts_milli: u32,
    log_volts_milli: u32,
}

impl TestHeaderBuilder {
    /// Use an externally computed fingerprint instead of deriving one.
    pub fn fingerprint(mut self, fingerprint: u32) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Set the team number (must fit 16 bits).
    pub fn team_id(mut self, team_id: u32) -> Self {
        self.team_id = team_id;
        self
    }

    /// Set the battery label.
    pub fn battery_id(mut self, battery_id: impl Into<String>) -> Self {
        self.battery_id = battery_id.into();
        self
    }

    /// Set the start time in epoch seconds. Defaults to now.
    pub fn start_timestamp(mut self, start_timestamp: u64) -> Self {
        self.start_timestamp = Some(start_timestamp);
        self
    }

    /// Set the load resistance in ohms.
    pub fn load_ohms(mut self, load_ohms: f64) -> Self {
        self.load_ohms = load_ohms;
        self
    }

    /// Set the nominal poll interval.
    pub fn poll_interval_ms(mut self, poll_interval_ms: u32) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the stop voltage in millivolts.
    pub fn min_volts_milli(mut self, min_volts_milli: u32) -> Self {
        self.min_volts_milli = min_volts_milli;
        self
    }

    /// Set the logging threshold in millivolts.
    pub fn log_volts_milli(mut self, log_volts_milli: u32) -> Self {
        self.log_volts_milli = log_volts_milli;
        self
    }

    /// Validate the inputs and produce an immutable header.
    pub fn build(self) -> Result<TestHeader> {
        let team_id = u16::try_from(self.team_id).map_err(|_| {
            BatconError::Validation(format!(
                "team ID {} does not fit the 16-bit field",
                self.team_id
            ))
        })?;
        let load_milliohms = load_milliohms_from_ohms(self.load_ohms)?;
        validate_battery_id(&self.battery_id)?;

        let start_timestamp = match self.start_timestamp {
            Some(ts) => ts,
            None => u64::try_from(chrono::Utc::now().timestamp()).map_err(|_| {
                BatconError::Validation("system clock is before the Unix epoch".to_string())
            })?,
        };

        let fingerprint = self.fingerprint.unwrap_or_else(|| {
            fingerprint::derive(
                team_id,
                &self.battery_id,
                load_milliohms,
                self.poll_interval_ms,
                start_timestamp,
            )
        });

        let header = TestHeader {
            fingerprint,
            team_id,
            battery_id: self.battery_id,
            start_timestamp,
            load_milliohms,
            poll_interval_ms: self.poll_interval_ms,
            min_volts_milli: self.min_volts_milli,
            log_volts_milli: self.log_volts_milli,
        };
        header.validate()?;
        Ok(header)
    }
}
