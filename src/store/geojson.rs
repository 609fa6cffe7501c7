//! GeoJSON trap dataset adapter.
//!
//! Expected shape (only the fields used here are required):
//!
//! ```json
//! {
//!   "type": "FeatureCollection",
//!   "features": [{
//!     "geometry": { "coordinates": [121.5654, 25.0330] },
//!     "properties": { "name": "60.0", "設置地址": "中山路", "拍攝方向": "北向南" }
//!   }]
//! }
//! ```
//!
//! `name` carries the posted limit in km/h. Coordinates are `[lon, lat, ...]`.

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use super::{format_limit, LimitField, ParsedDataset};
use crate::error::{OptionExt, Result};
use crate::{GpsPoint, TrapRecord, TrapSource};

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Value>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Geometry,
    properties: Properties,
}

#[derive(Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

#[derive(Deserialize)]
struct Properties {
    name: LimitField,
    #[serde(rename = "設置地址", default)]
    address: Option<String>,
    #[serde(rename = "拍攝方向", default)]
    direction: Option<String>,
}

/// Parse a GeoJSON feature collection into trap records.
///
/// Fails only when the document itself is not a feature collection.
/// Individual features with fewer than two coordinates, invalid coordinates
/// or an unparseable limit are skipped and counted.
pub fn parse_geojson(bytes: &[u8]) -> Result<ParsedDataset> {
    let collection: FeatureCollection = serde_json::from_slice(bytes)?;
    let mut parsed = ParsedDataset::default();

    for (index, value) in collection.features.into_iter().enumerate() {
        match parse_feature(index, value) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                debug!("[TrapStore] Skipping GeoJSON feature: {}", e);
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

fn parse_feature(index: usize, value: Value) -> Result<TrapRecord> {
    let feature: Feature = serde_json::from_value(value)?;

    let coords = &feature.geometry.coordinates;
    let position = (coords.len() >= 2)
        .then(|| GpsPoint::new(coords[1], coords[0]))
        .filter(GpsPoint::is_valid)
        .ok_or_malformed(index, "missing or invalid coordinates")?;

    let limit = feature
        .properties
        .name
        .value()
        .ok_or_malformed(index, "unparseable speed limit")?;

    let display = match &feature.properties.name {
        LimitField::Text(text) => display_text(text),
        LimitField::Number(n) => format_limit(*n),
    };

    Ok(TrapRecord {
        position,
        speed_limit_kph: limit,
        speed_limit_display: display,
        address: feature.properties.address.unwrap_or_default(),
        direction: feature.properties.direction.unwrap_or_default(),
        source: TrapSource::GeoJson,
    })
}

/// Source text with a redundant trailing ".0" removed ("60.0" -> "60").
fn display_text(text: &str) -> String {
    let text = text.trim();
    text.strip_suffix(".0").unwrap_or(text).to_string()
}
