use crate::advertisement::Advertisement;
use crate::mac_address::MacAddress;
use std::time::{Duration, SystemTime};

/// A stable device address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xA4, 0xC1, 0x38, 0x0D, 0x2E, 0x9F]);

/// 2009-02-13T23:31:30.250Z, so formatted timestamps are predictable.
pub fn test_timestamp() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_millis(1_234_567_890_250)
}

/// Build an advertisement from `TEST_MAC` at `test_timestamp()` with RSSI -60.
pub fn advertisement(name: Option<&str>, manufacturer_data: &[(u16, &[u8])]) -> Advertisement {
    Advertisement {
        address: TEST_MAC,
        name: name.map(str::to_string),
        rssi: Some(-60),
        manufacturer_data: manufacturer_data
            .iter()
            .map(|(company_id, data)| (*company_id, data.to_vec()))
            .collect(),
        timestamp: test_timestamp(),
    }
}
