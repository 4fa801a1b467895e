//! Battery test binary log protocol.
//!
//! All integers are big-endian and unsigned. See [`record`] for the overall
//! layout and [`container`] for the optional versioned preamble.
pub mod container;
pub mod header;
pub mod reading;
pub mod record;

pub use container::{decode_auto, decode_framed, LogFormat};
pub use header::{
    load_milliohms_from_ohms, TestHeader, TestHeaderBuilder, BATTERY_ID_LEN, HEADER_LEN,
};
pub use reading::{current_milliamps, Reading, READING_LEN};
pub use record::{decode, CapacitySummary, LogRecord, MIN_LOG_LEN, SUMMARY_LEN};
