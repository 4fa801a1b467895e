//! CLI entry point for batcon
//!
//! Provides command-line interface for:
//! - Running a discharge test from a stream of voltage samples
//! - Inspecting and exporting a recorded log
//!
//! # Usage
//!
//! Record a test, samples read as big-endian u32 millivolts from stdin:
//! ```bash
//! adc-reader | batcon run 2025A 6.1 --team 1076 -o 2025A.bclog
//! ```
//!
//! Inspect or export it:
//! ```bash
//! batcon inspect 2025A.bclog
//! batcon inspect 2025A.bclog --format csv > 2025A.csv
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use batcon::capture::{self, CaptureOutcome, CapturePlan};
use batcon::config::{BatconConfig, DEFAULT_CONFIG_FILE};
use batcon::export::ExporterRegistry;
use batcon::logger::StreamLogger;
use batcon::logging;
use batcon::protocol::{LogFormat, LogRecord, TestHeader};
use batcon::source::{SampleSource, StreamSource};

/// Path value meaning stdin or stdout.
const STDIO: &str = "-";

#[derive(Parser)]
#[command(name = "batcon")]
#[command(about = "Battery conditioner and capacity test logger", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a discharge test
    Run(RunArgs),

    /// Decode a log and print or export it
    Inspect {
        /// Log file (legacy or framed)
        log: PathBuf,

        /// summary, or any registered export format
        #[arg(long, default_value = "summary")]
        format: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Battery label, at most 10 ASCII characters
    battery_id: String,

    /// Load resistance in ohms
    load_ohms: f64,

    /// Team number
    #[arg(long)]
    team: Option<u32>,

    /// Output log path, `-` for stdout
    #[arg(short, long)]
    outfile: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(short, long)]
    interval: Option<u32>,

    /// Stop voltage in millivolts
    #[arg(long, value_name = "MILLIVOLTS")]
    min_volts: Option<u32>,

    /// Minimum voltage drop in millivolts before a reading is logged
    #[arg(long, value_name = "MILLIVOLTS")]
    log_volts: Option<u32>,

    /// Sample stream of big-endian u32 millivolts, `-` for stdin
    #[arg(long, default_value = STDIO)]
    input: PathBuf,

    /// Stop after this many samples
    #[arg(long)]
    max_samples: Option<u64>,

    /// Prefix the log with the versioned container preamble
    #[arg(long)]
    framed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BatconConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    logging::init(config.tracing()?).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Run(args) => run_test(args, &config).await,
        Commands::Inspect { log, format } => inspect(&log, &format),
    }
}

async fn run_test(args: RunArgs, config: &BatconConfig) -> Result<()> {
    let header = TestHeader::builder()
        .battery_id(args.battery_id.as_str())
        .team_id(args.team.unwrap_or(config.test.team_id))
        .load_ohms(args.load_ohms)
        .poll_interval_ms(args.interval.unwrap_or(config.test.poll_interval_ms))
        .min_volts_milli(args.min_volts.unwrap_or(config.test.min_volts_milli))
        .log_volts_milli(args.log_volts.unwrap_or(config.test.log_volts_milli))
        .build()
        .context("Invalid test parameters")?;

    let outfile = args.outfile.unwrap_or_else(|| config.test.output.clone());
    let to_stdout = is_stdio(&outfile);
    let format = if args.framed {
        LogFormat::Framed
    } else {
        LogFormat::Legacy
    };
    let mut plan = CapturePlan::from_header(&header);
    if let Some(max) = args.max_samples {
        plan = plan.with_max_samples(max);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(Arc::clone(&cancel));

    info!(output = %outfile.display(), input = %args.input.display(), "Starting capacity test");
    let input = args.input;
    let summary_header = header.clone();
    let capture = tokio::task::spawn_blocking(move || -> batcon::Result<CaptureOutcome> {
        let source = open_input(&input)?;
        let sink = open_output(&outfile)?;
        let mut logger = StreamLogger::new(header, source, sink).with_format(format);
        capture::run(&mut logger, &plan, &cancel)
    });
    let outcome = capture.await.context("Capture task failed")??;

    let report = render_outcome(&summary_header, &outcome);
    if to_stdout {
        eprint!("{report}");
    } else {
        print!("{report}");
    }
    Ok(())
}

/// First Ctrl-C closes the log at the next sample; a second one exits.
fn spawn_interrupt_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received; closing log after the current sample");
        cancel.store(true, Ordering::SeqCst);

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt; exiting without trailer");
            std::process::exit(130);
        }
    });
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO
}

fn open_input(path: &Path) -> batcon::Result<Box<dyn SampleSource + Send>> {
    if is_stdio(path) {
        Ok(Box::new(StreamSource::new(io::stdin())))
    } else {
        Ok(Box::new(StreamSource::new(BufReader::new(File::open(path)?))))
    }
}

fn open_output(path: &Path) -> batcon::Result<Box<dyn Write + Send>> {
    if is_stdio(path) {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

fn render_outcome(header: &TestHeader, outcome: &CaptureOutcome) -> String {
    let mut report = format!("{header}\n");
    report.push_str(&format!("# Stop Reason: {:?}\n", outcome.stop_reason));
    report.push_str(&format!(
        "# Samples: {} taken, {} logged\n",
        outcome.samples_taken, outcome.readings_logged
    ));
    if let Some(last) = outcome.last_reading {
        report.push_str(&format!(
            "# Last Reading: {} mV at {:.1} s\n",
            last.voltage_mv,
            last.seconds()
        ));
    }
    report.push_str(&format!(
        "# Capacity: {} A*s ({:.4} Ah)\n",
        outcome.ampere_seconds,
        outcome.ampere_hours()
    ));
    report
}

fn inspect(path: &Path, format: &str) -> Result<()> {
    let record =
        LogRecord::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if format == "summary" {
        writeln!(out, "{}", record.header)?;
        writeln!(out, "# Readings: {}", record.readings.len())?;
        writeln!(out, "# Duration: {:.1} s", record.duration().as_secs_f64())?;
        writeln!(
            out,
            "# Capacity: {} A*s ({:.4} Ah)",
            record.summary.ampere_seconds,
            record.ampere_hours()
        )?;
        if !record.verify_capacity() {
            warn!("Stored capacity does not match the logged readings");
        }
        return Ok(());
    }

    let exporter = ExporterRegistry::new().create(format)?;
    exporter.export(&record, &mut out)?;
    out.flush()?;
    Ok(())
}
