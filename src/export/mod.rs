//! Export adapters for decoded logs.
//!
//! Exporters consume a complete [`LogRecord`] and write it in an interchange
//! format. The binary log stays the source of truth; nothing here is read back.
//!
//! - `csv` / `tsv`: one row per reading, header fields as `#` comment lines
//!   (requires the `storage_csv` feature)
//! - `json`: the full record, header, readings and summary
pub mod registry;

use std::io::Write;

use serde_json::json;

use crate::error::{BatconError, Result};
use crate::protocol::LogRecord;

pub use registry::ExporterRegistry;

/// Writes a decoded log in one interchange format.
pub trait Exporter: Send + Sync {
    /// Identifier used by the registry and the CLI.
    fn format_name(&self) -> &'static str;

    /// Write `record` to `out`.
    fn export(&self, record: &LogRecord, out: &mut dyn Write) -> Result<()>;
}

/// Delimited text, one row per reading.
#[cfg(feature = "storage_csv")]
pub struct CsvExporter {
    delimiter: u8,
}

#[cfg(feature = "storage_csv")]
impl CsvExporter {
    /// Comma-separated output.
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Tab-separated output.
    pub fn tsv() -> Self {
        Self { delimiter: b'\t' }
    }
}

#[cfg(feature = "storage_csv")]
impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "storage_csv")]
impl Exporter for CsvExporter {
    fn format_name(&self) -> &'static str {
        if self.delimiter == b'\t' {
            "tsv"
        } else {
            "csv"
        }
    }

    fn export(&self, record: &LogRecord, out: &mut dyn Write) -> Result<()> {
        for line in record.header.to_string().lines() {
            writeln!(out, "{line}")?;
        }
        writeln!(out, "# Ampere-Seconds: {}", record.summary.ampere_seconds)?;
        writeln!(out, "# Ampere-Hours: {:.6}", record.ampere_hours())?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(out);
        writer
            .write_record(["voltage_mV", "current_mA", "elapsed_ms"])
            .map_err(|e| BatconError::Export(e.to_string()))?;
        for reading in &record.readings {
            writer
                .write_record(&[
                    reading.voltage_mv.to_string(),
                    reading.current_ma.to_string(),
                    reading.elapsed_ms.to_string(),
                ])
                .map_err(|e| BatconError::Export(e.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Pretty-printed JSON document.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl JsonExporter {
    /// Create a JSON exporter.
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for JsonExporter {
    fn format_name(&self) -> &'static str {
        "json"
    }

    fn export(&self, record: &LogRecord, out: &mut dyn Write) -> Result<()> {
        let document = json!({
            "header": record.header,
            "readings": record.readings,
            "summary": {
                "ampere_seconds": record.summary.ampere_seconds,
                "ampere_hours": record.ampere_hours(),
            },
        });
        serde_json::to_writer_pretty(&mut *out, &document)
            .map_err(|e| BatconError::Export(e.to_string()))?;
        writeln!(out)?;
        Ok(())
    }
}
