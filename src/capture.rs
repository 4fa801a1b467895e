//! Capture loop driving a [`Logger`] from start to trailer.
//!
//! Sampling cadence is set by the poll interval; logging cadence by the
//! logger's delta-threshold filter. The loop stops when:
//!
//! - a sample is at or below the stop voltage
//! - the sample source is exhausted
//! - the caller raises the cancel flag
//! - an optional sample limit is hit
//!
//! `end()` runs on every exit path, including device and I/O errors, so the
//! log on disk carries a trailer when the header made it out. A reading
//! write that fails partway leaves the file misaligned; the trailer is then
//! withheld and `end()` reports the failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::logger::Logger;
use crate::protocol::{Reading, TestHeader};

/// Why a capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// A sample was at or below the stop voltage.
    MinVoltageReached,
    /// The sample source ran dry.
    SourceExhausted,
    /// The cancel flag was raised.
    Cancelled,
    /// The configured sample limit was hit.
    SampleLimit,
}

/// Loop parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePlan {
    /// Stop once a sample is at or below this voltage.
    pub min_volts_milli: u32,
    /// Delay after each sample.
    pub poll_interval: Duration,
    /// Stop after this many samples, logged or not.
    pub max_samples: Option<u64>,
}

impl CapturePlan {
    /// Plan using the stop voltage and poll interval recorded in the header.
    pub fn from_header(header: &TestHeader) -> Self {
        Self {
            min_volts_milli: header.min_volts_milli,
            poll_interval: Duration::from_millis(u64::from(header.poll_interval_ms)),
            max_samples: None,
        }
    }

    /// Stop after `max_samples` samples.
    pub fn with_max_samples(mut self, max_samples: u64) -> Self {
        self.max_samples = Some(max_samples);
        self
    }
}

/// Result of a completed capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    /// Why the loop ended.
    pub stop_reason: StopReason,
    /// Samples pulled from the source, logged or not.
    pub samples_taken: u64,
    /// Readings that passed the filter.
    pub readings_logged: usize,
    /// Charge written to the trailer.
    pub ampere_seconds: u64,
    /// Most recent sample, if any was taken.
    pub last_reading: Option<Reading>,
}

impl CaptureOutcome {
    /// Delivered charge in ampere-hours.
    pub fn ampere_hours(&self) -> f64 {
        crate::capacity::ampere_hours(self.ampere_seconds)
    }
}

struct Progress {
    stop_reason: StopReason,
    samples_taken: u64,
    last_reading: Option<Reading>,
}

/// Run a full capture: `start`, sample until a stop condition, `end`.
///
/// If `start` fails nothing was written and the error is returned as is. Any
/// later error still triggers `end`; the original error wins over a failure
/// to write the trailer.
pub fn run<L: Logger>(
    logger: &mut L,
    plan: &CapturePlan,
    cancel: &AtomicBool,
) -> Result<CaptureOutcome> {
    logger.start()?;

    let sampled = sample_until_stop(logger, plan, cancel);
    let ended = logger.end();

    match (sampled, ended) {
        (Ok(progress), Ok(ampere_seconds)) => {
            let outcome = CaptureOutcome {
                stop_reason: progress.stop_reason,
                samples_taken: progress.samples_taken,
                readings_logged: logger.readings_logged(),
                ampere_seconds,
                last_reading: progress.last_reading,
            };
            info!(
                stop_reason = ?outcome.stop_reason,
                samples = outcome.samples_taken,
                logged = outcome.readings_logged,
                ampere_hours = outcome.ampere_hours(),
                "Capture complete"
            );
            Ok(outcome)
        }
        (Ok(_), Err(e)) => Err(e),
        (Err(e), ended) => {
            if let Err(end_err) = ended {
                warn!(error = %end_err, "Failed to close log after capture error");
            }
            warn!(error = %e, "Capture aborted");
            Err(e)
        }
    }
}

fn sample_until_stop<L: Logger>(
    logger: &mut L,
    plan: &CapturePlan,
    cancel: &AtomicBool,
) -> Result<Progress> {
    let mut samples_taken = 0u64;
    let mut last_reading = None;

    let stop_reason = loop {
        if cancel.load(Ordering::SeqCst) {
            break StopReason::Cancelled;
        }
        if plan.max_samples.is_some_and(|max| samples_taken >= max) {
            break StopReason::SampleLimit;
        }

        let reading = match logger.record_reading() {
            Ok(reading) => reading,
            Err(e) if e.is_recoverable() => break StopReason::SourceExhausted,
            Err(e) => return Err(e),
        };
        samples_taken += 1;
        last_reading = Some(reading);

        if reading.voltage_mv <= plan.min_volts_milli {
            break StopReason::MinVoltageReached;
        }
        logger.wait(plan.poll_interval);
    };

    Ok(Progress {
        stop_reason,
        samples_taken,
        last_reading,
    })
}
