//! `bthome-logger` library.
//!
//! The binary (`src/main.rs`) is responsible for logging setup, signal handling
//! and process exit codes. The BThome decoder lives in [`crate::bthome`] and is
//! free of I/O; [`crate::app`] wires it to a scanner and an output format so
//! the run loop can be tested with an injected scanner and writers.

pub mod advertisement;
pub mod app;
pub mod bthome;
pub mod mac_address;
pub mod output;
pub mod scanner;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use advertisement::{Advertisement, NameFilter};
pub use bthome::{
    BTHOME_COMPANY_ID, DecodeError, DecodeResult, DecodedMeasurement, EncodeError,
    ObjectDefinition, PayloadBuilder, Termination, decode,
};
pub use mac_address::MacAddress;
pub use output::OutputFormatter;
pub use output::console::ConsoleFormatter;
pub use output::influxdb::InfluxDbFormatter;
pub use scanner::{Backend, Reading, ScanConfig, ScanError, ScanEvent, classify};
