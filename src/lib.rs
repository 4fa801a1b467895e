//! # Battery Conditioner Log Library
//!
//! Records a battery discharge test through a fixed resistive load into a
//! compact big-endian binary log, and reads such logs back.
//!
//! ## Crate Structure
//!
//! - **`protocol`**: The on-disk format. `TestHeader`, `Reading`,
//!   `CapacitySummary`, the legacy `decode` and the framed container.
//! - **`logger`**: The `Logger` trait and `StreamLogger`, which writes the
//!   header, filters and persists readings, and appends the capacity trailer.
//! - **`capture`**: Drives a logger until a stop condition, always closing
//!   the log.
//! - **`capacity`**: Simpson integration of current over time.
//! - **`source`** / **`clock`**: Voltage sample sources and time bases.
//! - **`export`**: CSV, TSV and JSON renditions of decoded logs.
//! - **`config`** / **`logging`**: Figment configuration and tracing setup.
//! - **`error`**: `BatconError`, the crate-wide error type.

pub mod capacity;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod logger;
pub mod logging;
pub mod protocol;
pub mod source;

pub use capture::{CaptureOutcome, CapturePlan, StopReason};
pub use error::{BatconError, Result};
pub use logger::{Logger, StreamLogger};
pub use protocol::{decode, decode_auto, LogRecord, Reading, TestHeader};
