//! InfluxDB line protocol output formatter.

use crate::output::OutputFormatter;
use crate::scanner::{Reading, ScanEvent};
use std::collections::BTreeMap;
use std::fmt;
#[cfg(test)]
use std::time::Duration;
use std::time::SystemTime;

/// Field values for InfluxDB line protocol
#[derive(Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Float(num) => write!(f, "{num}"),
            FieldValue::Integer(num) => write!(f, "{num}i"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Data point in InfluxDB line protocol
#[derive(Debug)]
pub struct DataPoint {
    pub measurement: String,
    pub tag_set: BTreeMap<String, String>,
    pub field_set: BTreeMap<String, FieldValue>,
    pub timestamp: Option<SystemTime>,
}

/// Backslash-escape every character in `special`.
fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Measurement names only need commas and spaces escaped.
fn escape_measurement(value: &str) -> String {
    escape(value, &[',', ' '])
}

/// Escape commas, equals signs and spaces in tag keys and values.
fn escape_tag(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

fn fmt_tags(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    for (key, value) in data_point.tag_set.iter() {
        write!(fmt, ",{}={}", escape_tag(key), escape_tag(value))?;
    }
    Ok(())
}

fn fmt_fields(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    for (i, (key, value)) in data_point.field_set.iter().enumerate() {
        if i > 0 {
            write!(fmt, ",")?;
        }
        write!(fmt, "{}={}", key, value)?;
    }
    Ok(())
}

fn fmt_timestamp(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    if let Some(since_epoch) = data_point
        .timestamp
        .and_then(|time| time.duration_since(SystemTime::UNIX_EPOCH).ok())
    {
        write!(fmt, " {}", since_epoch.as_nanos())?;
    }
    Ok(())
}

impl fmt::Display for DataPoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", escape_measurement(&self.measurement))?;
        fmt_tags(self, fmt)?;
        write!(fmt, " ")?;
        fmt_fields(self, fmt)?;
        fmt_timestamp(self, fmt)
    }
}

/// Turn an object name into a field key: `Mass (lbs)` -> `mass_lbs`, `PM2.5` -> `pm2_5`.
pub fn field_key(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// InfluxDB line protocol formatter.
///
/// Emits one line per successfully decoded BThome reading. Other events are
/// skipped.
pub struct InfluxDbFormatter {
    /// The measurement name in InfluxDB
    measurement_name: String,
}

impl InfluxDbFormatter {
    /// Create a new InfluxDB formatter.
    ///
    /// # Arguments
    /// * `measurement_name` - The measurement name to use in the line protocol
    pub fn new(measurement_name: String) -> Self {
        Self { measurement_name }
    }

    /// Tags are the device address and its name (the address when unnamed).
    fn tag_set(&self, reading: &Reading) -> BTreeMap<String, String> {
        let adv = &reading.advertisement;
        let mut tags = BTreeMap::new();
        tags.insert("mac".to_string(), adv.address.to_string());
        tags.insert("name".to_string(), adv.display_name());
        tags
    }

    /// One field per decoded value; repeated objects get `_2`, `_3`, ...
    ///
    /// Placeholders for unknown objects carry no value and are left out.
    fn field_set(&self, reading: &Reading) -> Option<BTreeMap<String, FieldValue>> {
        let result = reading.decoded.as_ref().ok()?;
        let mut fields = BTreeMap::new();
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();

        for measurement in &result.values {
            let Some(value) = measurement.value else {
                continue;
            };
            let key = field_key(&measurement.name);
            let count = seen.entry(key.clone()).or_default();
            *count += 1;
            let key = if *count == 1 {
                key
            } else {
                format!("{key}_{count}")
            };
            fields.insert(key, FieldValue::Float(value));
        }

        fields.insert("encrypted".into(), FieldValue::Boolean(result.encrypted));
        if let Some(rssi) = reading.advertisement.rssi {
            fields.insert("rssi".into(), FieldValue::Integer(i64::from(rssi)));
        }

        Some(fields)
    }

    fn to_data_point(&self, reading: &Reading) -> Option<DataPoint> {
        Some(DataPoint {
            measurement: self.measurement_name.clone(),
            tag_set: self.tag_set(reading),
            field_set: self.field_set(reading)?,
            timestamp: Some(reading.advertisement.timestamp),
        })
    }
}

impl OutputFormatter for InfluxDbFormatter {
    fn format(&self, event: &ScanEvent) -> Option<String> {
        match event {
            ScanEvent::Bthome(reading) => self.to_data_point(reading).map(|dp| dp.to_string()),
            ScanEvent::Foreign(_) => None,
        }
    }
}
