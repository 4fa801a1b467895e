//! Custom error types for the battery test harness.
//!
//! This module defines `BatconError`, the single error type shared by the log
//! codecs, the streaming logger, the capture loop and the export adapters.
//! Using the `thiserror` crate, it keeps every failure mode of the protocol in
//! one place so callers can match on the exact condition.
//!
//! ## Error Hierarchy
//!
//! - **`Validation`**: malformed header input (oversize battery ID, non-positive
//!   load resistance, a field that overflows its on-disk width). Raised before
//!   any byte is written.
//! - **`TruncatedInput`** / **`MisalignedLog`**: corrupt or incomplete on-disk
//!   data. These are never recovered by assuming default values.
//! - **`SampleSourceExhausted`**: the sample feed ran dry. This is the expected
//!   way a scripted or piped test ends, so the capture loop treats it as a stop
//!   condition rather than a failure.
//! - **`SampleSource`**: the sample feed failed for any other reason.
//! - **`Io`**, **`Config`**: wrapped errors from the byte sink/source and the
//!   `figment` configuration layer.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, BatconError>;

/// Every failure the crate can report.
#[derive(Error, Debug)]
pub enum BatconError {
    /// Header input rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fewer bytes than the layout requires
    #[error("Truncated input: expected at least {expected} bytes, got {actual}")]
    TruncatedInput {
        /// Bytes the layout needs
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Reading region is not a whole number of readings
    #[error("Misaligned log: reading region of {region_len} bytes is not a multiple of 12")]
    MisalignedLog {
        /// Length of the region between header and trailer
        region_len: usize,
    },

    /// No more samples will arrive
    #[error("Sample source exhausted")]
    SampleSourceExhausted,

    /// Sample device failure
    #[error("Sample source error: {0}")]
    SampleSource(String),

    /// Run outlived the 32-bit millisecond counter
    #[error("Elapsed time of {0} ms does not fit the 32-bit reading field")]
    ElapsedOverflow(u128),

    /// Logger lifecycle called out of order
    #[error("Logger state error: {0}")]
    LoggerState(String),

    /// Framed log from a newer writer
    #[error("Unsupported log container version {0}")]
    UnsupportedVersion(u8),

    /// Byte sink or source failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Export adapter failure
    #[error("Export error: {0}")]
    Export(String),
}

impl BatconError {
    /// Whether a capture loop may treat this error as a normal end of test.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BatconError::SampleSourceExhausted)
    }
}

impl From<figment::Error> for BatconError {
    fn from(value: figment::Error) -> Self {
        BatconError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhaustion_is_recoverable() {
        assert!(BatconError::SampleSourceExhausted.is_recoverable());
        assert!(!BatconError::SampleSource("adc offline".into()).is_recoverable());
        assert!(!BatconError::MisalignedLog { region_len: 5 }.is_recoverable());
    }

    #[test]
    fn messages_carry_sizes() {
        let err = BatconError::TruncatedInput {
            expected: 48,
            actual: 10,
        };
        assert_eq!(
            err.to_string(),
            "Truncated input: expected at least 48 bytes, got 10"
        );
    }
}
