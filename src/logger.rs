//! Streaming battery logger.
//!
//! A [`StreamLogger`] owns a sample source, an append-only byte sink and a
//! clock. It writes the header on [`Logger::start`], turns every sample into a
//! timestamped [`Reading`] on [`Logger::record_reading`], persists only the
//! readings that pass the delta-threshold filter, and on [`Logger::end`]
//! integrates the persisted series and appends the capacity trailer.
//!
//! # Filter
//!
//! A sample is persisted when `previous_logged - voltage >= log_volts_milli`.
//! The first sample always passes. With a threshold of zero every sample of a
//! non-increasing discharge is persisted; a reading that rises above the last
//! persisted value never is.
//!
//! # Example
//!
//! ```
//! use batcon::clock::ManualClock;
//! use batcon::logger::{Logger, StreamLogger};
//! use batcon::protocol::{decode, TestHeader};
//! use batcon::source::ScriptedSource;
//!
//! # fn main() -> batcon::Result<()> {
//! let header = TestHeader::builder()
//!     .battery_id("2025A")
//!     .team_id(1076)
//!     .load_ohms(6.1)
//!     .log_volts_milli(50)
//!     .build()?;
//! let source = ScriptedSource::new(vec![12_000, 11_990, 11_900]);
//! let mut out = Vec::new();
//!
//! let mut logger = StreamLogger::with_clock(header, source, &mut out, ManualClock::new());
//! logger.start()?;
//! for _ in 0..3 {
//!     logger.record_reading()?;
//! }
//! logger.end()?;
//! drop(logger);
//!
//! let record = decode(&out)?;
//! assert_eq!(record.readings.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{BatconError, Result};
use crate::protocol::{CapacitySummary, LogFormat, Reading, TestHeader};
use crate::source::SampleSource;

/// Capability shared by every logger backend.
pub trait Logger {
    /// Write the header and start the elapsed-time reference. Called once.
    fn start(&mut self) -> Result<()>;

    /// Take one sample, persisting it if it passes the filter.
    ///
    /// Always returns the sampled reading so callers can evaluate stop
    /// conditions on every sample, logged or not.
    fn record_reading(&mut self) -> Result<Reading>;

    /// Integrate, append the trailer and close the sink. Called once.
    /// Returns the delivered charge in ampere-seconds.
    fn end(&mut self) -> Result<u64>;

    /// Header this logger writes.
    fn header(&self) -> &TestHeader;

    /// Number of readings persisted so far.
    fn readings_logged(&self) -> usize;

    /// Pause between samples.
    fn wait(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Logging { origin: Duration },
    Ended,
}

/// Logger pulling from any [`SampleSource`] and appending to any [`Write`] sink.
pub struct StreamLogger<S, W, C = MonotonicClock>
where
    S: SampleSource,
    W: Write,
    C: Clock,
{
    header: TestHeader,
    source: S,
    sink: Option<W>,
    clock: C,
    format: LogFormat,
    phase: Phase,
    previous_logged_mv: Option<u32>,
    readings: Vec<Reading>,
    samples_taken: u64,
    /// Set when a reading write failed partway; the trailer is then withheld.
    poisoned: bool,
}

impl<S, W> StreamLogger<S, W, MonotonicClock>
where
    S: SampleSource,
    W: Write,
{
    /// Logger timed by the process monotonic clock.
    pub fn new(header: TestHeader, source: S, sink: W) -> Self {
        Self::with_clock(header, source, sink, MonotonicClock::new())
    }
}

impl<S, W, C> StreamLogger<S, W, C>
where
    S: SampleSource,
    W: Write,
    C: Clock,
{
    /// Logger timed by an explicit clock.
    pub fn with_clock(header: TestHeader, source: S, sink: W, clock: C) -> Self {
        Self {
            header,
            source,
            sink: Some(sink),
            clock,
            format: LogFormat::default(),
            phase: Phase::Idle,
            previous_logged_mv: None,
            readings: Vec::new(),
            samples_taken: 0,
            poisoned: false,
        }
    }

    /// Choose the container flavour. Only meaningful before `start`.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Persisted readings, in capture order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Samples pulled from the source, persisted or not.
    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }

    /// Whether `end` has run.
    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    fn passes_filter(&self, voltage_mv: u32) -> bool {
        match self.previous_logged_mv {
            None => true,
            Some(previous) => {
                i64::from(previous) - i64::from(voltage_mv)
                    >= i64::from(self.header.log_volts_milli)
            }
        }
    }

    fn sink(&mut self) -> Result<&mut W> {
        self.sink
            .as_mut()
            .ok_or_else(|| BatconError::LoggerState("sink already closed".to_string()))
    }

    fn elapsed_ms(&self, origin: Duration) -> Result<u32> {
        let elapsed = self.clock.now().saturating_sub(origin).as_millis();
        u32::try_from(elapsed).map_err(|_| BatconError::ElapsedOverflow(elapsed))
    }
}

impl<S, W, C> Logger for StreamLogger<S, W, C>
where
    S: SampleSource,
    W: Write,
    C: Clock,
{
    fn start(&mut self) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(BatconError::LoggerState(
                "start called more than once".to_string(),
            ));
        }

        let encoded = self.header.encode()?;
        let preamble = self.format.preamble();
        let sink = self.sink()?;
        sink.write_all(preamble)?;
        sink.write_all(&encoded)?;

        self.phase = Phase::Logging {
            origin: self.clock.now(),
        };
        info!(
            fingerprint = format_args!("{:08x}", self.header.fingerprint),
            battery = %self.header.battery_id,
            load_ohms = self.header.load_ohms(),
            log_volts_milli = self.header.log_volts_milli,
            "Battery logging started"
        );
        Ok(())
    }

    fn record_reading(&mut self) -> Result<Reading> {
        let origin = match self.phase {
            Phase::Logging { origin } => origin,
            Phase::Idle => {
                return Err(BatconError::LoggerState(
                    "record_reading called before start".to_string(),
                ))
            }
            Phase::Ended => {
                return Err(BatconError::LoggerState(
                    "record_reading called after end".to_string(),
                ))
            }
        };

        let voltage_mv = self.source.read_millivolts()?;
        let elapsed_ms = self.elapsed_ms(origin)?;
        let reading = Reading::from_voltage(voltage_mv, self.header.load_milliohms, elapsed_ms);
        self.samples_taken += 1;

        if self.passes_filter(voltage_mv) {
            let written = self.sink()?.write_all(&reading.encode());
            if let Err(e) = written {
                self.poisoned = true;
                return Err(e.into());
            }
            self.readings.push(reading);
            self.previous_logged_mv = Some(voltage_mv);
            debug!(
                voltage_mv,
                current_ma = reading.current_ma,
                elapsed_ms,
                "Reading logged"
            );
        } else {
            trace!(voltage_mv, elapsed_ms, "Reading below logging threshold");
        }

        Ok(reading)
    }

    fn end(&mut self) -> Result<u64> {
        match self.phase {
            Phase::Logging { .. } => {}
            Phase::Idle => {
                return Err(BatconError::LoggerState(
                    "end called before start".to_string(),
                ))
            }
            Phase::Ended => {
                return Err(BatconError::LoggerState(
                    "end called more than once".to_string(),
                ))
            }
        }
        self.phase = Phase::Ended;

        if self.poisoned {
            self.sink = None;
            warn!(
                readings = self.readings.len(),
                "Reading write failed earlier; capacity trailer not written"
            );
            return Err(BatconError::LoggerState(
                "sink poisoned by a failed reading write".to_string(),
            ));
        }

        let summary = CapacitySummary::from_readings(&self.readings);
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| BatconError::LoggerState("sink already closed".to_string()))?;
        sink.write_all(&summary.encode())?;
        sink.flush()?;
        drop(sink);

        info!(
            readings = self.readings.len(),
            samples = self.samples_taken,
            ampere_seconds = summary.ampere_seconds,
            ampere_hours = summary.ampere_hours(),
            "Battery logging finished"
        );
        Ok(summary.ampere_seconds)
    }

    fn header(&self) -> &TestHeader {
        &self.header
    }

    fn readings_logged(&self) -> usize {
        self.readings.len()
    }

    fn wait(&self, duration: Duration) {
        self.clock.sleep(duration);
    }
}

impl<S, W, C> Drop for StreamLogger<S, W, C>
where
    S: SampleSource,
    W: Write,
    C: Clock,
{
    fn drop(&mut self) {
        if matches!(self.phase, Phase::Logging { .. }) {
            warn!("Logger dropped without end(); writing capacity trailer");
            if let Err(e) = self.end() {
                warn!(error = %e, "Failed to write capacity trailer on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::protocol::decode;
    use crate::source::ScriptedSource;
    use tracing_test::traced_test;

    fn header(log_volts_milli: u32) -> TestHeader {
        TestHeader {
            fingerprint: 0xABCD_1234,
            team_id: 1076,
            battery_id: "SIMBAT".to_string(),
            start_timestamp: 1_727_539_212,
            load_milliohms: 6100,
            poll_interval_ms: 100,
            min_volts_milli: 10_500,
            log_volts_milli,
        }
    }

    fn run_all(
        log_volts_milli: u32,
        voltages: &[u32],
        step: Duration,
    ) -> (Vec<u8>, Vec<Reading>, u64) {
        let mut out = Vec::new();
        let clock = ManualClock::new();
        let mut returned = Vec::new();
        let ampere_seconds = {
            let mut logger = StreamLogger::with_clock(
                header(log_volts_milli),
                ScriptedSource::new(voltages.to_vec()),
                &mut out,
                clock.clone(),
            );
            logger.start().unwrap();
            for _ in voltages {
                returned.push(logger.record_reading().unwrap());
                clock.advance(step);
            }
            logger.end().unwrap()
        };
        (out, returned, ampere_seconds)
    }

    #[test]
    fn test_first_sample_always_logged() {
        let (out, _, _) = run_all(10_000, &[12_000, 11_999], Duration::from_millis(100));
        let record = decode(&out).unwrap();
        assert_eq!(record.readings.len(), 1);
        assert_eq!(record.readings[0].voltage_mv, 12_000);
    }

    #[test]
    fn test_threshold_filter_against_last_persisted() {
        let voltages = [12_000, 11_980, 11_960, 11_950, 11_930, 11_900, 11_899];
        let (out, returned, _) = run_all(50, &voltages, Duration::from_millis(100));
        let record = decode(&out).unwrap();
        let logged: Vec<u32> = record.readings.iter().map(|r| r.voltage_mv).collect();
        assert_eq!(logged, vec![12_000, 11_950, 11_900]);

        // Every sample is returned to the caller regardless of the filter.
        let seen: Vec<u32> = returned.iter().map(|r| r.voltage_mv).collect();
        assert_eq!(seen, voltages);
    }

    #[test]
    fn test_zero_threshold_logs_everything() {
        let voltages = [12_000, 12_000, 11_800, 11_800, 11_500];
        let (out, _, _) = run_all(0, &voltages, Duration::from_millis(100));
        assert_eq!(decode(&out).unwrap().readings.len(), voltages.len());
    }

    #[test]
    fn test_rising_voltage_not_logged() {
        let (out, _, _) = run_all(0, &[11_000, 11_500, 10_900], Duration::from_millis(10));
        let logged: Vec<u32> = decode(&out)
            .unwrap()
            .readings
            .iter()
            .map(|r| r.voltage_mv)
            .collect();
        assert_eq!(logged, vec![11_000, 10_900]);
    }

    #[test]
    fn test_elapsed_from_clock() {
        let (out, returned, _) = run_all(0, &[12_000, 11_000, 10_000], Duration::from_millis(1500));
        let elapsed: Vec<u32> = returned.iter().map(|r| r.elapsed_ms).collect();
        assert_eq!(elapsed, vec![0, 1500, 3000]);
        assert_eq!(decode(&out).unwrap().readings[2].elapsed_ms, 3000);
    }

    #[test]
    fn test_trailer_matches_integration() {
        let voltages = [12_200, 12_100, 12_000, 11_900, 11_800];
        let (out, _, ampere_seconds) = run_all(0, &voltages, Duration::from_secs(60));
        let record = decode(&out).unwrap();
        assert_eq!(record.summary.ampere_seconds, ampere_seconds);
        assert!(record.verify_capacity());
        assert_eq!(out.len(), 48 + 12 * voltages.len());
    }

    #[test]
    fn test_framed_output() {
        let mut out = Vec::new();
        {
            let mut logger = StreamLogger::with_clock(
                header(0),
                ScriptedSource::new(vec![12_000]),
                &mut out,
                ManualClock::new(),
            )
            .with_format(LogFormat::Framed);
            logger.start().unwrap();
            logger.record_reading().unwrap();
            logger.end().unwrap();
        }
        assert!(out.starts_with(b"BCLG"));
        let record = crate::protocol::decode_auto(&out).unwrap();
        assert_eq!(record.readings.len(), 1);
    }

    #[test]
    fn test_lifecycle_misuse() {
        let mut out = Vec::new();
        let mut logger = StreamLogger::with_clock(
            header(0),
            ScriptedSource::new(vec![12_000]),
            &mut out,
            ManualClock::new(),
        );
        assert!(matches!(
            logger.record_reading(),
            Err(BatconError::LoggerState(_))
        ));
        assert!(matches!(logger.end(), Err(BatconError::LoggerState(_))));
        logger.start().unwrap();
        assert!(matches!(logger.start(), Err(BatconError::LoggerState(_))));
        logger.end().unwrap();
        assert!(matches!(logger.end(), Err(BatconError::LoggerState(_))));
        assert!(matches!(
            logger.record_reading(),
            Err(BatconError::LoggerState(_))
        ));
    }

    #[test]
    fn test_invalid_header_writes_nothing() {
        let mut bad = header(0);
        bad.battery_id = "WAY-TOO-LONG-ID".to_string();
        let mut out = Vec::new();
        {
            let mut logger = StreamLogger::with_clock(
                bad,
                ScriptedSource::new(vec![]),
                &mut out,
                ManualClock::new(),
            );
            assert!(matches!(logger.start(), Err(BatconError::Validation(_))));
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_exhaustion_propagates_as_recoverable() {
        let mut out = Vec::new();
        let mut logger = StreamLogger::with_clock(
            header(0),
            ScriptedSource::new(vec![]),
            &mut out,
            ManualClock::new(),
        );
        logger.start().unwrap();
        let err = logger.record_reading().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(logger.samples_taken(), 0);
    }

    /// Accepts `limit` bytes, then fails every write.
    struct FailingSink {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let room = self.limit - self.written.len();
            if room == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            let n = room.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_partial_reading_write_withholds_trailer() {
        let mut sink = FailingSink {
            written: Vec::new(),
            limit: 40 + 12 + 5,
        };
        {
            let mut logger = StreamLogger::with_clock(
                header(0),
                ScriptedSource::new(vec![12_000, 11_000]),
                &mut sink,
                ManualClock::new(),
            );
            logger.start().unwrap();
            logger.record_reading().unwrap();
            assert!(matches!(logger.record_reading(), Err(BatconError::Io(_))));
            assert!(matches!(logger.end(), Err(BatconError::LoggerState(_))));
            assert!(logger.is_ended());
        }
        assert_eq!(sink.written.len(), 57);
    }

    #[test]
    #[traced_test]
    fn test_drop_writes_trailer() {
        let mut out = Vec::new();
        {
            let mut logger = StreamLogger::with_clock(
                header(0),
                ScriptedSource::new(vec![12_000, 11_000]),
                &mut out,
                ManualClock::new(),
            );
            logger.start().unwrap();
            logger.record_reading().unwrap();
        }
        assert!(logs_contain("Logger dropped without end()"));
        let record = decode(&out).unwrap();
        assert_eq!(record.readings.len(), 1);
        assert_eq!(record.summary.ampere_seconds, 0);
    }
}
