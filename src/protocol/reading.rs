//! Fixed 12-byte sample record: voltage, current and elapsed time, each a
//! big-endian `u32`.

use serde::{Deserialize, Serialize};

use crate::error::{BatconError, Result};

/// Encoded size of a [`Reading`].
pub const READING_LEN: usize = 12;

/// One persisted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Battery voltage in millivolts.
    pub voltage_mv: u32,
    /// Current through the load in milliamps.
    pub current_ma: u32,
    /// Milliseconds since logging started.
    pub elapsed_ms: u32,
}

impl Reading {
    /// Build a reading, deriving the current from the load resistance.
    pub fn from_voltage(voltage_mv: u32, load_milliohms: u32, elapsed_ms: u32) -> Self {
        Self {
            voltage_mv,
            current_ma: current_milliamps(voltage_mv, load_milliohms),
            elapsed_ms,
        }
    }

    /// Serialize into the 12-byte on-disk form.
    pub fn encode(&self) -> [u8; READING_LEN] {
        let mut buf = [0u8; READING_LEN];
        buf[0..4].copy_from_slice(&self.voltage_mv.to_be_bytes());
        buf[4..8].copy_from_slice(&self.current_ma.to_be_bytes());
        buf[8..12].copy_from_slice(&self.elapsed_ms.to_be_bytes());
        buf
    }

    /// Parse the first 12 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < READING_LEN {
            return Err(BatconError::TruncatedInput {
                expected: READING_LEN,
                actual: data.len(),
            });
        }
        let word = |i: usize| u32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        Ok(Self {
            voltage_mv: word(0),
            current_ma: word(4),
            elapsed_ms: word(8),
        })
    }

    /// Current in amperes.
    pub fn amperes(&self) -> f64 {
        f64::from(self.current_ma) / 1000.0
    }

    /// Elapsed time in seconds.
    pub fn seconds(&self) -> f64 {
        f64::from(self.elapsed_ms) / 1000.0
    }
}

/// `floor(voltage_mV / load_ohms)` in integer arithmetic.
///
/// Saturates at `u32::MAX` for loads small enough to overflow the field.
/// A zero load yields zero; headers with a zero load never pass validation.
pub fn current_milliamps(voltage_mv: u32, load_milliohms: u32) -> u32 {
    if load_milliohms == 0 {
        return 0;
    }
    let milliamps = u64::from(voltage_mv) * 1000 / u64::from(load_milliohms);
    u32::try_from(milliamps).unwrap_or(u32::MAX)
}
