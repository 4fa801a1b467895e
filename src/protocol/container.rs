//! Optional self-describing preamble in front of the legacy layout.
//!
//! Legacy logs carry no magic number or version. A framed log prefixes them
//! with 8 bytes:
//!
//! ```text
//! offset 0 : magic     b"BCLG"
//! offset 4 : version   u8 (currently 1)
//! offset 5 : reserved  3 zero bytes
//! offset 8 : legacy log (header, readings, trailer)
//! ```
//!
//! A legacy log is always `48 + 12N` bytes and a framed one `56 + 12N`, so
//! the two never share a length modulo 12. [`decode_auto`] relies on that to
//! tell them apart even when a legacy fingerprint happens to spell `BCLG`:
//! a buffer with the magic is framed unless its length fits the legacy shape.

use crate::error::{BatconError, Result};
use crate::protocol::reading::READING_LEN;
use crate::protocol::record::{self, LogRecord, MIN_LOG_LEN};

/// Magic bytes opening a framed log.
pub const MAGIC: [u8; 4] = *b"BCLG";

/// Newest container version this crate writes and reads.
pub const CURRENT_VERSION: u8 = 1;

/// Size of the framed preamble.
pub const PREAMBLE_LEN: usize = 8;

/// On-disk container flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Bare header/readings/trailer layout.
    #[default]
    Legacy,
    /// Legacy layout behind the `BCLG` preamble.
    Framed,
}

impl LogFormat {
    /// Bytes to emit before the header.
    pub fn preamble(self) -> &'static [u8] {
        const FRAMED: [u8; PREAMBLE_LEN] = [
            MAGIC[0],
            MAGIC[1],
            MAGIC[2],
            MAGIC[3],
            CURRENT_VERSION,
            0,
            0,
            0,
        ];
        match self {
            Self::Legacy => &[],
            Self::Framed => &FRAMED,
        }
    }

    /// Guess the flavour of a complete log buffer.
    ///
    /// A buffer opening with the magic is framed unless its length is a
    /// well-formed legacy length, so a damaged framed file still reports
    /// errors relative to its own layout.
    pub fn detect(data: &[u8]) -> Self {
        let legacy_shape =
            data.len() >= MIN_LOG_LEN && (data.len() - MIN_LOG_LEN) % READING_LEN == 0;
        if data.starts_with(&MAGIC) && !legacy_shape {
            Self::Framed
        } else {
            Self::Legacy
        }
    }
}

/// Decode a log that must carry the framed preamble.
pub fn decode_framed(data: &[u8]) -> Result<LogRecord> {
    if data.len() < PREAMBLE_LEN {
        return Err(BatconError::TruncatedInput {
            expected: PREAMBLE_LEN + MIN_LOG_LEN,
            actual: data.len(),
        });
    }
    if data[..4] != MAGIC {
        return Err(BatconError::Validation(format!(
            "missing log magic, found {:02x?}",
            &data[..4]
        )));
    }
    let version = data[4];
    if version != CURRENT_VERSION {
        return Err(BatconError::UnsupportedVersion(version));
    }
    record::decode(&data[PREAMBLE_LEN..])
}

/// Decode either flavour, picking the framed path only when both the magic
/// and the length agree.
pub fn decode_auto(data: &[u8]) -> Result<LogRecord> {
    match LogFormat::detect(data) {
        LogFormat::Framed => decode_framed(data),
        LogFormat::Legacy => record::decode(data),
    }
}
