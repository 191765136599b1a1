//! Core application runner for `bthome-logger`.
//!
//! This module is decoupled from process setup (logging, signals, exit codes)
//! so the run loop can be tested with a fake scanner and in-memory writers.

use crate::advertisement::NameFilter;
use crate::output::OutputFormatter;
use crate::output::console::ConsoleFormatter;
use crate::output::influxdb::InfluxDbFormatter;
use crate::scanner::{Backend, ScanConfig, ScanError, ScanEvent};
use clap::Parser;
use std::future::Future;
use std::io;
use std::io::Write;
use std::pin::Pin;
use thiserror::Error;
use time::UtcOffset;
use tokio::sync::mpsc;

/// Output format for decoded advertisements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Coloured, human-readable blocks
    #[default]
    Console,
    /// InfluxDB line protocol, one line per reading
    Influxdb,
}

/// BThome v2 BLE Advertisement Logger - scans and displays BThome devices.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Filter BLE devices by this name (substring matching)
    #[arg(short = 'f', long = "filter", default_value = "MAKE")]
    pub filter: String,

    /// Show all BLE advertisements, not just BThome devices
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// Output format
    #[arg(long, default_value_t, value_enum)]
    pub format: Format,

    /// The name of the measurement in InfluxDB line protocol.
    #[arg(long, default_value = "bthome_measurement")]
    pub influxdb_measurement: String,

    /// Disable ANSI colours in console output
    #[arg(long)]
    pub no_color: bool,

    /// Offset for console timestamps, set by the binary from the local time zone
    #[arg(skip = UtcOffset::UTC)]
    pub utc_offset: UtcOffset,
}

impl Options {
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            filter: NameFilter::new(self.filter.as_str()),
            verbose: self.verbose,
        }
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        match self.format {
            Format::Console => Box::new(
                ConsoleFormatter::new(!self.no_color).with_offset(self.utc_offset),
            ),
            Format::Influxdb => Box::new(InfluxDbFormatter::new(
                self.influxdb_measurement.clone(),
            )),
        }
    }
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
        config: ScanConfig,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<ScanEvent>, ScanError>> + Send + '_>>;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
        config: ScanConfig,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<ScanEvent>, ScanError>> + Send + '_>>
    {
        Box::pin(async move { crate::scanner::start_scan(backend, config).await })
    }
}

/// Run the core processing loop, writing formatted output to `out` and verbose errors to `err`.
///
/// - The formatter's header is written once before scanning starts, its
///   started line once the scanner is running.
/// - Every event the formatter renders becomes one block/line on `out`.
/// - Decode failures the formatter skips are written to `err` only when
///   `options.verbose` is true.
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let formatter = options.formatter();

    if let Some(header) = formatter.header(&options.filter) {
        writeln!(out, "{header}")?;
        out.flush()?;
    }

    let mut events = scanner
        .start_scan(options.backend, options.scan_config())
        .await?;

    if let Some(started) = formatter.started() {
        writeln!(out, "{started}")?;
        out.flush()?;
    }

    while let Some(event) = events.recv().await {
        match formatter.format(&event) {
            Some(text) => {
                writeln!(out, "{text}")?;
                out.flush()?;
            }
            None => {
                if options.verbose
                    && let ScanEvent::Bthome(reading) = &event
                    && let Err(decode_err) = &reading.decoded
                {
                    writeln!(err, "{}: {decode_err}", reading.advertisement.address)?;
                }
            }
        }
    }

    Ok(())
}
