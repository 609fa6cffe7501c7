//! Flat attribute record adapter.
//!
//! Accepts either a bare JSON array or an object wrapping the array under
//! `records`:
//!
//! ```json
//! [{ "latitude": 37.77, "longitude": -122.42, "speed_limit": 35,
//!    "location": "Market Street at 5th", "direction": "Westbound" }]
//! ```
//!
//! `speed_limit` is numeric in the dataset's unit; a missing or null limit
//! means the limit is unknown (stored as 0).

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use super::{format_limit_with_unit, LimitField, ParsedDataset, SpeedUnit};
use crate::error::{OptionExt, Result};
use crate::{GpsPoint, TrapRecord, TrapSource};

#[derive(Deserialize)]
#[serde(untagged)]
enum FlatDocument {
    Bare(Vec<Value>),
    Wrapped { records: Vec<Value> },
}

#[derive(Deserialize)]
struct FlatRecord {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    speed_limit: Option<LimitField>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    direction: Option<String>,
}

/// Parse flat attribute records, converting limits from `unit` to km/h.
pub fn parse_flat_records(bytes: &[u8], unit: SpeedUnit) -> Result<ParsedDataset> {
    let entries = match serde_json::from_slice::<FlatDocument>(bytes)? {
        FlatDocument::Bare(entries) => entries,
        FlatDocument::Wrapped { records } => records,
    };
    let mut parsed = ParsedDataset::default();

    for (index, value) in entries.into_iter().enumerate() {
        match parse_record(index, value, unit) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                debug!("[TrapStore] Skipping flat record: {}", e);
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

fn parse_record(index: usize, value: Value, unit: SpeedUnit) -> Result<TrapRecord> {
    let raw: FlatRecord = serde_json::from_value(value)?;

    let position = raw
        .latitude
        .zip(raw.longitude)
        .map(|(lat, lng)| GpsPoint::new(lat, lng))
        .filter(GpsPoint::is_valid)
        .ok_or_malformed(index, "missing or invalid coordinates")?;

    let (speed_limit_kph, speed_limit_display) = match raw.speed_limit {
        Some(field) => {
            let value = field
                .value()
                .ok_or_malformed(index, "unparseable speed limit")?;
            (unit.to_kph(value), format_limit_with_unit(value, unit))
        }
        None => (0.0, String::new()),
    };

    Ok(TrapRecord {
        position,
        speed_limit_kph,
        speed_limit_display,
        address: raw.location.unwrap_or_default(),
        direction: raw.direction.unwrap_or_default(),
        source: TrapSource::FlatRecords,
    })
}
