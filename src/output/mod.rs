//! Output formatters for scan events.
//!
//! The console formatter mirrors what a human watching the terminal wants;
//! the InfluxDB formatter emits line protocol for Telegraf and friends.

pub mod console;
pub mod influxdb;

use crate::scanner::ScanEvent;

/// Trait for formatting scan events into output strings.
pub trait OutputFormatter: Send + Sync {
    /// Text printed once before scanning starts.
    fn header(&self, _filter: &str) -> Option<String> {
        None
    }

    /// Text printed once the scanner is running.
    fn started(&self) -> Option<String> {
        None
    }

    /// Format one event, or `None` if this format has nothing to say about it.
    fn format(&self, event: &ScanEvent) -> Option<String>;
}
