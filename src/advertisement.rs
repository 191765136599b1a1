//! Backend-neutral view of a received BLE advertisement.

use crate::bthome::BTHOME_COMPANY_ID;
use crate::mac_address::MacAddress;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// What a scanner backend saw from one device at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    pub address: MacAddress,
    /// Local name, if the device broadcasts one
    pub name: Option<String>,
    /// Signal strength in dBm
    pub rssi: Option<i16>,
    /// Manufacturer-specific data keyed by company identifier
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
    pub timestamp: SystemTime,
}

impl Advertisement {
    /// The BThome payload (company id prefix stripped), if present.
    pub fn bthome_payload(&self) -> Option<&[u8]> {
        self.manufacturer_data
            .get(&BTHOME_COMPANY_ID)
            .map(Vec::as_slice)
    }

    /// Device name for display, falling back to the address when the name
    /// is missing or empty.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.address.to_string(),
        }
    }
}

/// Device name filter using substring matching.
///
/// Devices that do not advertise a name, or advertise an empty one, are let
/// through, since a name may only arrive in a later scan response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter(pub String);

impl NameFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn pattern(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, name: Option<&str>) -> bool {
        name.is_none_or(|name| name.is_empty() || name.contains(self.0.as_str()))
    }
}
