//! BThome v2 payload decoder and builder.
//!
//! A BThome v2 advertisement carries, after the company identifier, one
//! device-info byte followed by a stream of `(object id, value)` pairs. Value
//! widths are not encoded on the wire: they come from [`OBJECTS`], which is
//! why an unknown object id ends decoding.
//!
//! [`PayloadBuilder`] produces the same layout from the sending side.
//!
//! See: https://bthome.io/format/

use std::fmt;
use thiserror::Error;

/// Company identifier registered for BThome (`0xFCD2`).
///
/// Advertisements carry it little-endian (`D2 FC`).
pub const BTHOME_COMPANY_ID: u16 = 0xFCD2;

/// Bit 0 of the device-info byte marks an encrypted payload.
pub const ENCRYPTION_FLAG: u8 = 0x01;

/// Bit 2 of the device-info byte marks a trigger-based device.
pub const TRIGGER_FLAG: u8 = 0x04;

/// Bits 5-7 of the device-info byte hold the version; v2 sets `0x40`.
pub const VERSION_FLAG: u8 = 0x40;

/// Protocol version implemented by [`decode`].
pub const VERSION: &str = "v2";

/// Object bytes that fit in a 31-byte legacy advertisement after the AD
/// flags, the service data header and the device-info byte.
pub const MAX_OBJECT_BYTES: usize = 23;

/// Object bytes an encrypted payload gives up to its counter and tag.
pub const ENCRYPTION_OVERHEAD: usize = 12;

/// Width of an object's value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U8,
    U16,
    U24,
}

impl Width {
    /// Number of payload bytes occupied by the value.
    pub const fn len(self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U16 => 2,
            Width::U24 => 3,
        }
    }

    /// Read a little-endian integer of this width from `bytes`.
    ///
    /// Sign extension only applies to 2- and 3-byte values; single bytes are
    /// always read unsigned.
    fn read(self, bytes: &[u8], signed: bool) -> i32 {
        match (self, bytes) {
            (Width::U8, [b]) => i32::from(*b),
            (Width::U16, [lo, hi]) => {
                let raw = u16::from_le_bytes([*lo, *hi]);
                if signed {
                    i32::from(raw as i16)
                } else {
                    i32::from(raw)
                }
            }
            (Width::U24, [b0, b1, b2]) => {
                let raw = u32::from_le_bytes([*b0, *b1, *b2, 0]) as i32;
                if signed && raw >= 0x80_0000 {
                    raw - 0x100_0000
                } else {
                    raw
                }
            }
            _ => unreachable!("caller slices exactly {} bytes", self.len()),
        }
    }

    /// Smallest and largest raw value [`Width::read`] can produce.
    const fn range(self, signed: bool) -> (i32, i32) {
        match (self, signed) {
            (Width::U8, _) => (0, 0xFF),
            (Width::U16, false) => (0, 0xFFFF),
            (Width::U16, true) => (i16::MIN as i32, i16::MAX as i32),
            (Width::U24, false) => (0, 0xFF_FFFF),
            (Width::U24, true) => (-0x80_0000, 0x7F_FFFF),
        }
    }
}

/// Static description of one BThome object id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectDefinition {
    pub id: u8,
    pub name: &'static str,
    /// Multiplier from raw integer to physical value.
    pub factor: f64,
    /// Display unit, empty for dimensionless values.
    pub unit: &'static str,
    pub width: Width,
    pub signed: bool,
}

const fn object(
    id: u8,
    name: &'static str,
    factor: f64,
    unit: &'static str,
    width: Width,
    signed: bool,
) -> ObjectDefinition {
    ObjectDefinition {
        id,
        name,
        factor,
        unit,
        width,
        signed,
    }
}

/// Known BThome v2 objects, sorted by id.
///
/// New object ids are supported by adding a row here.
pub static OBJECTS: &[ObjectDefinition] = &[
    object(0x00, "Packet ID", 1.0, "", Width::U8, false),
    object(0x01, "Battery", 1.0, "%", Width::U8, false),
    object(0x02, "Temperature", 0.01, "°C", Width::U16, true),
    object(0x03, "Humidity", 0.01, "%", Width::U16, false),
    object(0x04, "Pressure", 0.01, "hPa", Width::U24, false),
    object(0x05, "Illuminance", 0.01, "lux", Width::U24, false),
    object(0x06, "Mass", 0.01, "kg", Width::U16, true),
    object(0x07, "Mass (lbs)", 0.01, "lbs", Width::U16, true),
    object(0x08, "Dew Point", 0.01, "°C", Width::U16, true),
    object(0x09, "Count", 1.0, "", Width::U8, false),
    object(0x0A, "Energy", 0.001, "kWh", Width::U24, false),
    object(0x0B, "Power", 0.01, "W", Width::U24, false),
    object(0x0C, "Voltage", 0.001, "V", Width::U16, false),
    object(0x0D, "PM2.5", 1.0, "µg/m³", Width::U16, false),
    object(0x0E, "PM10", 1.0, "µg/m³", Width::U16, false),
    object(0x0F, "Boolean", 1.0, "", Width::U8, false),
    object(0x10, "Power (On)", 1.0, "", Width::U8, false),
    object(0x11, "Opening", 1.0, "", Width::U8, false),
    object(0x12, "CO2", 1.0, "ppm", Width::U16, false),
    object(0x13, "TVOC", 1.0, "µg/m³", Width::U16, false),
    object(0x14, "Moisture", 0.01, "%", Width::U16, false),
];

/// Look up the definition for `object_id`, if the id is known.
pub fn lookup(object_id: u8) -> Option<&'static ObjectDefinition> {
    OBJECTS
        .binary_search_by_key(&object_id, |def| def.id)
        .ok()
        .map(|index| &OBJECTS[index])
}

/// One decoded object from the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMeasurement {
    pub name: String,
    /// Integer read from the wire, `None` for unknown objects.
    pub raw_value: Option<i32>,
    /// `raw_value * factor`, `None` for unknown objects.
    pub value: Option<f64>,
    pub unit: &'static str,
}

impl DecodedMeasurement {
    fn known(def: &ObjectDefinition, raw_value: i32) -> Self {
        Self {
            name: def.name.to_string(),
            raw_value: Some(raw_value),
            value: Some(f64::from(raw_value) * def.factor),
            unit: def.unit,
        }
    }

    fn unknown(object_id: u8) -> Self {
        Self {
            name: format!("Unknown (0x{object_id:02X})"),
            raw_value: None,
            value: None,
            unit: "",
        }
    }
}

/// Why the object loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every byte was consumed.
    Complete,
    /// An object id without a table entry; a placeholder was recorded.
    UnknownObject(u8),
    /// A known object needed more bytes than were left; it was dropped.
    Truncated {
        object_id: u8,
        needed: usize,
        remaining: usize,
    },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Complete => write!(f, "complete"),
            Termination::UnknownObject(id) => write!(f, "unknown object id 0x{id:02X}"),
            Termination::Truncated {
                object_id,
                needed,
                remaining,
            } => write!(
                f,
                "object 0x{object_id:02X} truncated: needs {needed} bytes, {remaining} left"
            ),
        }
    }
}

/// Result of decoding one BThome payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    /// First payload byte, unmodified.
    pub device_info: u8,
    pub encrypted: bool,
    pub version: &'static str,
    /// Measurements in payload order.
    pub values: Vec<DecodedMeasurement>,
    pub termination: Termination,
}

/// Error types for decoding BThome payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload had no device-info byte.
    #[error("Empty BThome payload")]
    EmptyPayload,
}

/// Decode a BThome v2 payload (company id already stripped).
///
/// Unknown object ids and truncated trailing objects do not fail the decode:
/// everything read up to that point is returned and [`DecodeResult::termination`]
/// says where it stopped. Encrypted payloads are flagged but not decrypted.
///
/// # Example
/// ```
/// use bthome_logger::bthome::decode;
///
/// let result = decode(&[0x40, 0x02, 0x34, 0x08]).unwrap();
/// assert!(!result.encrypted);
/// assert_eq!(result.values[0].name, "Temperature");
/// assert_eq!(result.values[0].raw_value, Some(2100));
/// ```
pub fn decode(payload: &[u8]) -> Result<DecodeResult, DecodeError> {
    let (&device_info, mut rest) = payload.split_first().ok_or(DecodeError::EmptyPayload)?;

    let mut values = Vec::new();
    let mut termination = Termination::Complete;

    while let Some((&object_id, tail)) = rest.split_first() {
        let Some(def) = lookup(object_id) else {
            values.push(DecodedMeasurement::unknown(object_id));
            termination = Termination::UnknownObject(object_id);
            break;
        };

        let needed = def.width.len();
        if tail.len() < needed {
            termination = Termination::Truncated {
                object_id,
                needed,
                remaining: tail.len(),
            };
            break;
        }

        let (bytes, tail) = tail.split_at(needed);
        values.push(DecodedMeasurement::known(
            def,
            def.width.read(bytes, def.signed),
        ));
        rest = tail;
    }

    Ok(DecodeResult {
        device_info,
        encrypted: device_info & ENCRYPTION_FLAG != 0,
        version: VERSION,
        values,
        termination,
    })
}

/// Error types for building BThome payloads.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unknown object id 0x{0:02X}")]
    UnknownObject(u8),
    #[error("value out of range for object 0x{0:02X}")]
    OutOfRange(u8),
    #[error("no room for object 0x{object_id:02X}: needs {needed} bytes, {remaining} left")]
    PayloadFull {
        object_id: u8,
        needed: usize,
        remaining: usize,
    },
}

/// Assembles a BThome v2 payload (device-info byte and objects) as a sending
/// device would put it behind the company identifier.
///
/// Objects are written sorted by id regardless of the order they were added.
/// The encrypted flag only sets bit 0 and shrinks the space left for objects;
/// the payload itself is never encrypted.
///
/// # Example
/// ```
/// use bthome_logger::bthome::{PayloadBuilder, decode};
///
/// let mut builder = PayloadBuilder::new();
/// builder.add_value(0x02, 21.0)?.add_raw(0x01, 100)?;
/// let payload = builder.build();
/// assert_eq!(payload, [0x40, 0x01, 0x64, 0x02, 0x34, 0x08]);
///
/// let result = decode(&payload).unwrap();
/// assert_eq!(result.values[1].raw_value, Some(2100));
/// # Ok::<(), bthome_logger::bthome::EncodeError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    trigger: bool,
    encrypted: bool,
    objects: Vec<(&'static ObjectDefinition, i32)>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(mut self, trigger: bool) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn device_info(&self) -> u8 {
        let mut info = VERSION_FLAG;
        if self.trigger {
            info |= TRIGGER_FLAG;
        }
        if self.encrypted {
            info |= ENCRYPTION_FLAG;
        }
        info
    }

    /// Object bytes that can still be added.
    pub fn remaining(&self) -> usize {
        let budget = if self.encrypted {
            MAX_OBJECT_BYTES - ENCRYPTION_OVERHEAD
        } else {
            MAX_OBJECT_BYTES
        };
        let used: usize = self.objects.iter().map(|(def, _)| 1 + def.width.len()).sum();
        budget.saturating_sub(used)
    }

    /// Add an object from its raw wire integer.
    pub fn add_raw(&mut self, object_id: u8, raw: i32) -> Result<&mut Self, EncodeError> {
        let def = lookup(object_id).ok_or(EncodeError::UnknownObject(object_id))?;
        let (min, max) = def.width.range(def.signed);
        if !(min..=max).contains(&raw) {
            return Err(EncodeError::OutOfRange(object_id));
        }
        self.push(def, raw)
    }

    /// Add an object from its physical value, rounded to the object's factor.
    pub fn add_value(&mut self, object_id: u8, value: f64) -> Result<&mut Self, EncodeError> {
        let def = lookup(object_id).ok_or(EncodeError::UnknownObject(object_id))?;
        let scaled = (value / def.factor).round();
        let (min, max) = def.width.range(def.signed);
        if !(f64::from(min)..=f64::from(max)).contains(&scaled) {
            return Err(EncodeError::OutOfRange(object_id));
        }
        self.push(def, scaled as i32)
    }

    fn push(
        &mut self,
        def: &'static ObjectDefinition,
        raw: i32,
    ) -> Result<&mut Self, EncodeError> {
        let needed = 1 + def.width.len();
        let remaining = self.remaining();
        if needed > remaining {
            return Err(EncodeError::PayloadFull {
                object_id: def.id,
                needed,
                remaining,
            });
        }
        self.objects.push((def, raw));
        Ok(self)
    }

    /// Drop all objects, keeping the flags.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Serialise the device-info byte followed by the objects sorted by id.
    pub fn build(&self) -> Vec<u8> {
        let mut objects = self.objects.clone();
        objects.sort_by_key(|(def, _)| def.id);

        let mut payload = vec![self.device_info()];
        for (def, raw) in objects {
            payload.push(def.id);
            payload.extend_from_slice(&raw.to_le_bytes()[..def.width.len()]);
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_table_is_sorted_and_complete() {
        assert_eq!(OBJECTS.len(), 21);
        for (index, def) in OBJECTS.iter().enumerate() {
            assert_eq!(usize::from(def.id), index);
        }
        assert!(lookup(0x15).is_none());
        assert!(lookup(0xFF).is_none());
    }

    #[test]
    fn test_one_byte_objects_are_unsigned() {
        assert!(
            OBJECTS
                .iter()
                .filter(|def| def.width == Width::U8)
                .all(|def| !def.signed)
        );
    }

    #[test]
    fn test_decode_temperature() {
        let result = decode(&[0x40, 0x02, 0x34, 0x08]).unwrap();
        assert_eq!(result.device_info, 0x40);
        assert!(!result.encrypted);
        assert_eq!(result.version, "v2");
        assert_eq!(result.termination, Termination::Complete);
        assert_eq!(result.values.len(), 1);

        let temperature = &result.values[0];
        assert_eq!(temperature.name, "Temperature");
        assert_eq!(temperature.raw_value, Some(2100));
        assert_close(temperature.value, 21.0);
        assert_eq!(temperature.unit, "°C");
    }

    #[test]
    fn test_decode_battery() {
        let result = decode(&[0x00, 0x01, 0x64]).unwrap();
        assert_eq!(result.values.len(), 1);
        assert_eq!(result.values[0].name, "Battery");
        assert_eq!(result.values[0].raw_value, Some(100));
        assert_close(result.values[0].value, 100.0);
        assert_eq!(result.values[0].unit, "%");
    }

    #[test]
    fn test_decode_empty_payload() {
        assert_eq!(decode(&[]), Err(DecodeError::EmptyPayload));
    }

    #[test]
    fn test_device_info_only() {
        let result = decode(&[0x40]).unwrap();
        assert!(result.values.is_empty());
        assert_eq!(result.termination, Termination::Complete);
    }

    #[test]
    fn test_encryption_flag() {
        assert!(decode(&[0x41]).unwrap().encrypted);
        assert!(decode(&[0x01]).unwrap().encrypted);
        assert!(!decode(&[0x40]).unwrap().encrypted);
        assert!(!decode(&[0xFE]).unwrap().encrypted);
    }

    #[test]
    fn test_negative_temperature() {
        // 0xFF38 = -200 -> -2.00 °C
        let result = decode(&[0x40, 0x02, 0x38, 0xFF]).unwrap();
        assert_eq!(result.values[0].raw_value, Some(-200));
        assert_close(result.values[0].value, -2.0);
    }

    #[test]
    fn test_unsigned_sixteen_bit_high_values() {
        // Humidity is unsigned, so 0xFFFF stays positive
        let result = decode(&[0x40, 0x03, 0xFF, 0xFF]).unwrap();
        assert_eq!(result.values[0].raw_value, Some(0xFFFF));
        assert_close(result.values[0].value, 655.35);
    }

    #[test]
    fn test_three_byte_pressure() {
        // 0x018A92 = 100498 -> 1004.98 hPa
        let result = decode(&[0x40, 0x04, 0x92, 0x8A, 0x01]).unwrap();
        assert_eq!(result.values[0].name, "Pressure");
        assert_eq!(result.values[0].raw_value, Some(100_498));
        assert_close(result.values[0].value, 1004.98);
        assert_eq!(result.values[0].unit, "hPa");
    }

    #[test]
    fn test_three_byte_sign_extension() {
        assert_eq!(Width::U24.read(&[0xFF, 0xFF, 0xFF], true), -1);
        assert_eq!(Width::U24.read(&[0xFF, 0xFF, 0xFF], false), 0xFF_FFFF);
        assert_eq!(Width::U24.read(&[0x00, 0x00, 0x80], true), -0x80_0000);
        assert_eq!(Width::U24.read(&[0xFF, 0xFF, 0x7F], true), 0x7F_FFFF);
    }

    #[test]
    fn test_one_byte_ignores_sign() {
        assert_eq!(Width::U8.read(&[0xFF], true), 255);
    }

    #[test]
    fn test_multiple_objects_in_order() {
        let payload = [
            0x40, // device info
            0x00, 0x07, // Packet ID 7
            0x01, 0x5A, // Battery 90 %
            0x02, 0xCA, 0x09, // Temperature 25.06 °C
            0x03, 0xBF, 0x13, // Humidity 50.55 %
            0x0C, 0xB8, 0x0B, // Voltage 3.000 V
        ];
        let result = decode(&payload).unwrap();
        let names: Vec<&str> = result.values.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            ["Packet ID", "Battery", "Temperature", "Humidity", "Voltage"]
        );
        assert_close(result.values[2].value, 25.06);
        assert_close(result.values[3].value, 50.55);
        assert_close(result.values[4].value, 3.0);
        assert_eq!(result.termination, Termination::Complete);
    }

    #[test]
    fn test_unknown_object_stops_decoding() {
        let payload = [0x40, 0x01, 0x64, 0xFF, 0x02, 0x34, 0x08];
        let result = decode(&payload).unwrap();
        assert_eq!(result.values.len(), 2);
        assert_eq!(result.values[0].name, "Battery");

        let unknown = &result.values[1];
        assert_eq!(unknown.name, "Unknown (0xFF)");
        assert_eq!(unknown.raw_value, None);
        assert_eq!(unknown.value, None);
        assert_eq!(unknown.unit, "");
        assert_eq!(result.termination, Termination::UnknownObject(0xFF));
    }

    #[test]
    fn test_unknown_object_name_is_uppercase_hex() {
        let result = decode(&[0x40, 0x2A]).unwrap();
        assert_eq!(result.values[0].name, "Unknown (0x2A)");
    }

    #[test]
    fn test_truncated_object_is_dropped() {
        let result = decode(&[0x40, 0x01, 0x64, 0x02, 0x34]).unwrap();
        assert_eq!(result.values.len(), 1);
        assert_eq!(result.values[0].name, "Battery");
        assert_eq!(
            result.termination,
            Termination::Truncated {
                object_id: 0x02,
                needed: 2,
                remaining: 1,
            }
        );
    }

    #[test]
    fn test_trailing_object_id_without_value() {
        let result = decode(&[0x40, 0x04]).unwrap();
        assert!(result.values.is_empty());
        assert!(matches!(
            result.termination,
            Termination::Truncated { remaining: 0, .. }
        ));
    }

    #[test]
    fn test_every_known_object_decodes_alone() {
        for def in OBJECTS {
            let raw = match (def.width, def.signed) {
                (Width::U8, _) => 0xC8,
                (Width::U16, true) => -1234,
                (Width::U16, false) => 0xBEEF,
                (Width::U24, true) => -70_000,
                (Width::U24, false) => 0x12_3456,
            };
            let mut builder = PayloadBuilder::new();
            builder.add_raw(def.id, raw).unwrap();
            let payload = builder.build();

            let result = decode(&payload).unwrap();
            assert_eq!(result.values.len(), 1, "object 0x{:02X}", def.id);
            let measurement = &result.values[0];
            assert_eq!(measurement.name, def.name);
            assert_eq!(measurement.raw_value, Some(raw));
            assert_close(measurement.value, f64::from(raw) * def.factor);
            assert_eq!(measurement.unit, def.unit);
        }
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(
            Termination::UnknownObject(0xAB).to_string(),
            "unknown object id 0xAB"
        );
        assert_eq!(
            Termination::Truncated {
                object_id: 0x04,
                needed: 3,
                remaining: 1,
            }
            .to_string(),
            "object 0x04 truncated: needs 3 bytes, 1 left"
        );
    }

    #[test]
    fn test_builder_device_info_flags() {
        assert_eq!(PayloadBuilder::new().build(), [0x40]);
        assert_eq!(PayloadBuilder::new().trigger(true).device_info(), 0x44);
        assert_eq!(PayloadBuilder::new().encrypted(true).device_info(), 0x41);

        let result = decode(&PayloadBuilder::new().encrypted(true).build()).unwrap();
        assert!(result.encrypted);
    }

    #[test]
    fn test_builder_sorts_objects_by_id() {
        let mut builder = PayloadBuilder::new();
        builder
            .add_raw(0x03, 5055)
            .unwrap()
            .add_raw(0x00, 7)
            .unwrap()
            .add_raw(0x02, -200)
            .unwrap();

        assert_eq!(
            builder.build(),
            [0x40, 0x00, 0x07, 0x02, 0x38, 0xFF, 0x03, 0xBF, 0x13]
        );
    }

    #[test]
    fn test_builder_round_trips_through_decode() {
        let mut builder = PayloadBuilder::new().trigger(true);
        builder
            .add_value(0x04, 1004.98)
            .unwrap()
            .add_value(0x02, -12.34)
            .unwrap()
            .add_value(0x0C, 3.0)
            .unwrap()
            .add_value(0x01, 90.0)
            .unwrap();

        let result = decode(&builder.build()).unwrap();
        assert_eq!(result.device_info, 0x44);
        assert_eq!(result.termination, Termination::Complete);
        let names: Vec<&str> = result.values.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Battery", "Temperature", "Pressure", "Voltage"]);
        assert_close(result.values[0].value, 90.0);
        assert_close(result.values[1].value, -12.34);
        assert_close(result.values[2].value, 1004.98);
        assert_close(result.values[3].value, 3.0);
    }

    #[test]
    fn test_builder_rejects_unknown_and_out_of_range() {
        let mut builder = PayloadBuilder::new();
        assert_eq!(
            builder.add_raw(0x15, 1).unwrap_err(),
            EncodeError::UnknownObject(0x15)
        );
        assert_eq!(
            builder.add_raw(0x01, 256).unwrap_err(),
            EncodeError::OutOfRange(0x01)
        );
        assert_eq!(
            builder.add_raw(0x03, -1).unwrap_err(),
            EncodeError::OutOfRange(0x03)
        );
        assert_eq!(
            builder.add_value(0x02, 400.0).unwrap_err(),
            EncodeError::OutOfRange(0x02)
        );
        assert_eq!(
            builder.add_value(0x02, f64::NAN).unwrap_err(),
            EncodeError::OutOfRange(0x02)
        );
        builder.add_raw(0x02, i32::from(i16::MIN)).unwrap();
        builder.add_raw(0x04, 0xFF_FFFF).unwrap();
        assert_eq!(builder.build().len(), 1 + 3 + 4);
    }

    #[test]
    fn test_builder_stops_at_advertisement_limit() {
        let mut builder = PayloadBuilder::new();
        // 11 batteries take 22 of 23 bytes
        for _ in 0..11 {
            builder.add_raw(0x01, 50).unwrap();
        }
        assert_eq!(builder.remaining(), 1);
        assert_eq!(
            builder.add_raw(0x01, 50).unwrap_err(),
            EncodeError::PayloadFull {
                object_id: 0x01,
                needed: 2,
                remaining: 1,
            }
        );
        assert_eq!(builder.build().len(), 1 + 22);

        builder.clear();
        assert_eq!(builder.remaining(), MAX_OBJECT_BYTES);
    }

    #[test]
    fn test_builder_encrypted_leaves_less_room() {
        let mut builder = PayloadBuilder::new().encrypted(true);
        assert_eq!(builder.remaining(), 11);
        for _ in 0..5 {
            builder.add_raw(0x01, 50).unwrap();
        }
        assert!(matches!(
            builder.add_raw(0x01, 50),
            Err(EncodeError::PayloadFull { remaining: 1, .. })
        ));
    }
}
