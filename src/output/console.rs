//! Human-readable terminal output with optional ANSI colours.

use crate::advertisement::Advertisement;
use crate::bthome::DecodedMeasurement;
use crate::output::OutputFormatter;
use crate::scanner::{Reading, ScanEvent};
use std::fmt::{self, Write};
use std::time::SystemTime;
use time::{OffsetDateTime, UtcOffset};
use time::macros::format_description;

/// ANSI escape sequences used by the console output.
mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RED: &str = "\x1b[91m";
    pub const GREEN: &str = "\x1b[92m";
    pub const YELLOW: &str = "\x1b[93m";
    pub const BLUE: &str = "\x1b[94m";
    pub const MAGENTA: &str = "\x1b[95m";
    pub const CYAN: &str = "\x1b[96m";
    pub const GRAY: &str = "\x1b[90m";
}

use ansi::{BLUE, BOLD, CYAN, GRAY, GREEN, MAGENTA, RED, YELLOW};

const RULE_WIDTH: usize = 70;

/// RSSI above this is shown green.
const RSSI_GOOD: i16 = -70;
/// RSSI above this (and not good) is shown yellow, anything lower red.
const RSSI_FAIR: i16 = -85;

/// Formats scan events as multi-line blocks for a terminal.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleFormatter {
    color: bool,
    /// Offset applied to timestamps, UTC unless set
    offset: UtcOffset,
}

impl ConsoleFormatter {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            offset: UtcOffset::UTC,
        }
    }

    /// Show timestamps at `offset`, usually the local one captured at startup.
    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    fn paint(&self, styles: &[&str], text: impl fmt::Display) -> String {
        if self.color {
            format!("{}{text}{}", styles.concat(), ansi::RESET)
        } else {
            text.to_string()
        }
    }

    /// `[HH:MM:SS.mmm]` at the configured offset.
    fn timestamp(&self, time: SystemTime) -> String {
        let formatted = OffsetDateTime::from(time)
            .to_offset(self.offset)
            .format(format_description!(
                "[hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .unwrap_or_else(|_| "--:--:--.---".to_string());
        self.paint(&[GRAY], format!("[{formatted}]"))
    }

    fn rssi(&self, rssi: Option<i16>) -> String {
        match rssi {
            Some(rssi) => {
                let color = if rssi > RSSI_GOOD {
                    GREEN
                } else if rssi > RSSI_FAIR {
                    YELLOW
                } else {
                    RED
                };
                self.paint(&[color], format!("{rssi} dBm"))
            }
            None => self.paint(&[GRAY], "n/a"),
        }
    }

    fn label(&self, text: &str) -> String {
        self.paint(&[GRAY], text)
    }

    fn format_reading(&self, reading: &Reading) -> String {
        let adv = &reading.advertisement;
        let mut out = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(out, "{}", self.paint(&[GRAY], "-".repeat(RULE_WIDTH)));
        let _ = writeln!(
            out,
            "{} {} ({})",
            self.timestamp(adv.timestamp),
            self.paint(
                &[BOLD, GREEN],
                format!("📱 {}", adv.name.as_deref().unwrap_or("(unnamed)"))
            ),
            self.paint(&[GRAY], adv.address)
        );
        let _ = writeln!(out, "  {} {}", self.label("RSSI:"), self.rssi(adv.rssi));
        let _ = writeln!(
            out,
            "  {} {}",
            self.label("Raw:"),
            self.paint(&[CYAN], hex(&reading.payload))
        );

        match &reading.decoded {
            Ok(result) => {
                let encryption = if result.encrypted {
                    self.paint(&[RED], "encrypted")
                } else {
                    self.paint(&[GREEN], "unencrypted")
                };
                let _ = writeln!(
                    out,
                    "  {} {} ({encryption})",
                    self.label("BThome:"),
                    result.version
                );

                if result.values.is_empty() {
                    let _ = writeln!(out, "    {}", self.label("(No decoded values)"));
                } else {
                    let _ = writeln!(out, "  {}", self.label("Values:"));
                    for measurement in &result.values {
                        let _ = writeln!(
                            out,
                            "    {}: {}",
                            self.paint(&[BOLD, MAGENTA], format!("• {}", measurement.name)),
                            self.paint(&[YELLOW], display_value(measurement))
                        );
                    }
                }
            }
            Err(_) => {
                let _ = writeln!(out, "  {}", self.paint(&[RED], "Error parsing BThome packet"));
            }
        }

        out
    }

    fn format_foreign(&self, adv: &Advertisement) -> String {
        adv.manufacturer_data
            .iter()
            .map(|(company_id, data)| {
                format!(
                    "{} {} ({}) | Company ID: 0x{company_id:04X} | Data: {} | RSSI: {}",
                    self.timestamp(adv.timestamp),
                    self.paint(&[BLUE], adv.name.as_deref().unwrap_or("(unnamed)")),
                    self.paint(&[GRAY], adv.address),
                    hex(data),
                    adv.rssi
                        .map_or_else(|| "n/a".to_string(), |rssi| format!("{rssi} dBm"))
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ConsoleFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Space separated lowercase hex, e.g. `40 02 34 08`.
fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Values with a unit get two decimals, dimensionless ones print as-is.
fn display_value(measurement: &DecodedMeasurement) -> String {
    match measurement.value {
        Some(value) if !measurement.unit.is_empty() => {
            format!("{value:.2} {}", measurement.unit)
        }
        Some(value) => value.to_string(),
        None => "-".to_string(),
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn header(&self, filter: &str) -> Option<String> {
        let rule = self.paint(&[BOLD, CYAN], "=".repeat(RULE_WIDTH));
        Some(format!(
            "\n{rule}\n{}\n{}\n{rule}\n\n{}\n{}\n",
            self.paint(&[BOLD, CYAN], "🔵 BThome Logger"),
            self.paint(&[CYAN], "Scans for BLE devices with BThome v2 protocol"),
            self.paint(&[YELLOW], format!("Filter: Devices with '{filter}' in name")),
            self.label("Press Ctrl+C to exit"),
        ))
    }

    fn started(&self) -> Option<String> {
        Some(format!("{}\n", self.paint(&[GREEN], "✓ Scanner started...")))
    }

    fn format(&self, event: &ScanEvent) -> Option<String> {
        match event {
            ScanEvent::Bthome(reading) => Some(self.format_reading(reading)),
            ScanEvent::Foreign(adv) => Some(self.format_foreign(adv)),
        }
    }
}
