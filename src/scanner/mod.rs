//! BLE scanner abstraction for BThome devices.
//!
//! Backends only turn radio traffic into [`Advertisement`] values. Name
//! filtering and payload decoding are shared and live in [`classify`].

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "hci")]
pub mod hci;

use crate::advertisement::{Advertisement, NameFilter};
use crate::bthome::{self, DecodeError, DecodeResult, Termination};
use log::debug;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// BThome company identifier as it appears on air (little-endian).
#[cfg(feature = "bluer")]
pub const BTHOME_COMPANY_ID_BYTES: [u8; 2] = bthome::BTHOME_COMPANY_ID.to_le_bytes();

/// Bluetooth manufacturer-specific data type (AD type 0xFF)
#[cfg(any(feature = "bluer", feature = "hci"))]
pub const MANUFACTURER_DATA_TYPE: u8 = 0xff;

/// Channel buffer size for scan events.
pub const EVENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// Scanner settings passed down from the command line.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    pub filter: NameFilter,
    /// Also report devices whose manufacturer data is not BThome
    pub verbose: bool,
}

/// A BThome advertisement together with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub advertisement: Advertisement,
    /// Manufacturer data for company 0xFCD2, prefix stripped
    pub payload: Vec<u8>,
    pub decoded: Result<DecodeResult, DecodeError>,
}

/// Something worth showing from one advertisement.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// A matching device sent BThome data
    Bthome(Reading),
    /// A matching device sent other manufacturer data (verbose only)
    Foreign(Advertisement),
}

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
    /// Raw HCI socket backend (direct kernel access, no daemon required)
    #[cfg(feature = "hci")]
    Hci,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "bluer")]
        return Backend::Bluer;
        #[cfg(all(feature = "hci", not(feature = "bluer")))]
        return Backend::Hci;
        #[cfg(not(any(feature = "bluer", feature = "hci")))]
        compile_error!("At least one backend feature must be enabled");
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            #[cfg(feature = "hci")]
            Backend::Hci => write!(f, "hci"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "bluer")]
            "bluer" | "bluez" => Ok(Backend::Bluer),
            #[cfg(feature = "hci")]
            "hci" | "raw" => Ok(Backend::Hci),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Decide what, if anything, to report for an advertisement.
///
/// Devices whose name does not match the filter are ignored. BThome data is
/// decoded; other manufacturer data is only reported when `config.verbose`
/// is set.
pub fn classify(advertisement: Advertisement, config: &ScanConfig) -> Option<ScanEvent> {
    if !config.filter.matches(advertisement.name.as_deref()) {
        return None;
    }

    let Some(payload) = advertisement.bthome_payload().map(<[u8]>::to_vec) else {
        return (config.verbose && !advertisement.manufacturer_data.is_empty())
            .then_some(ScanEvent::Foreign(advertisement));
    };

    let decoded = bthome::decode(&payload);
    match &decoded {
        Ok(result) if result.termination != Termination::Complete => {
            debug!(
                "{}: decoding stopped early, {}",
                advertisement.address, result.termination
            );
        }
        Err(e) => debug!("{}: {e}", advertisement.address),
        _ => {}
    }

    Some(ScanEvent::Bthome(Reading {
        advertisement,
        payload,
        decoded,
    }))
}

/// Start scanning for BThome devices using the specified backend.
///
/// Dispatches to the backend implementation selected by `backend`. Scanning
/// runs in a spawned task until the returned receiver is dropped or the
/// adapter goes away.
pub async fn start_scan(
    backend: Backend,
    config: ScanConfig,
) -> Result<mpsc::Receiver<ScanEvent>, ScanError> {
    match backend {
        #[cfg(feature = "bluer")]
        Backend::Bluer => bluer::start_scan(config).await,
        #[cfg(feature = "hci")]
        Backend::Hci => hci::start_scan(config).await,
    }
}
