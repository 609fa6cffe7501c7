//! # Trap Store
//!
//! Loads the bundled speed-camera datasets, normalizes them into one
//! [`TrapRecord`] list and caches the result for the lifetime of the store.
//!
//! Two schemas are supported, each handled by its own adapter:
//! - [`geojson`]: a GeoJSON feature collection with localized property names
//!   and km/h limits written as text
//! - [`flat`]: flat attribute records with English field names and a numeric
//!   limit in either km/h or mph
//!
//! Loading degrades rather than fails. A missing or unparseable dataset
//! contributes zero records, a malformed record is skipped, and the detector
//! only ever sees a (possibly empty) list.

use std::collections::HashSet;
use std::path::PathBuf;

use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrapMatchError};
use crate::{GpsPoint, TrapRecord};

pub mod flat;
pub mod geojson;
pub mod index;

pub use flat::parse_flat_records;
pub use geojson::parse_geojson;
pub use index::TrapIndex;

/// Conversion factor from miles per hour to kilometres per hour.
pub const MPH_TO_KPH: f64 = 1.60934;

/// Unit a dataset writes its speed limits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SpeedUnit {
    Kph,
    Mph,
}

impl SpeedUnit {
    /// Convert a limit in this unit to km/h.
    pub fn to_kph(self, value: f64) -> f64 {
        match self {
            SpeedUnit::Kph => value,
            SpeedUnit::Mph => value * MPH_TO_KPH,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            SpeedUnit::Kph => "km/h",
            SpeedUnit::Mph => "mph",
        }
    }
}

/// Schema of a bundled dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetFormat {
    /// GeoJSON feature collection (limits in km/h)
    GeoJson,
    /// Flat attribute records
    FlatRecords { unit: SpeedUnit },
}

/// A dataset file and the schema it follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub path: PathBuf,
    pub format: DatasetFormat,
}

impl DatasetSpec {
    pub fn geojson(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: DatasetFormat::GeoJson,
        }
    }

    pub fn flat(path: impl Into<PathBuf>, unit: SpeedUnit) -> Self {
        Self {
            path: path.into(),
            format: DatasetFormat::FlatRecords { unit },
        }
    }
}

/// Records produced by one adapter, plus how many source entries were dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedDataset {
    pub records: Vec<TrapRecord>,
    pub skipped: usize,
}

/// A speed limit field that sources write either as a number or as text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum LimitField {
    Number(f64),
    Text(String),
}

impl LimitField {
    /// Numeric value of the limit. Empty, non-numeric, negative and
    /// non-finite values are rejected.
    pub(crate) fn value(&self) -> Option<f64> {
        let value = match self {
            LimitField::Number(n) => *n,
            LimitField::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        (value.is_finite() && value >= 0.0).then_some(value)
    }
}

/// Render a numeric limit without a trailing ".0" for whole numbers.
pub(crate) fn format_limit(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Render a numeric limit with the dataset's unit, e.g. "55 mph".
pub(crate) fn format_limit_with_unit(value: f64, unit: SpeedUnit) -> String {
    format!("{} {}", format_limit(value), unit.suffix())
}

/// Parse raw dataset bytes with the adapter for `format`.
pub fn parse_dataset(bytes: &[u8], format: DatasetFormat) -> Result<ParsedDataset> {
    match format {
        DatasetFormat::GeoJson => parse_geojson(bytes),
        DatasetFormat::FlatRecords { unit } => parse_flat_records(bytes, unit),
    }
}

/// Read and parse one dataset file.
pub fn load_dataset(spec: &DatasetSpec) -> Result<ParsedDataset> {
    let bytes = std::fs::read(&spec.path).map_err(|e| TrapMatchError::DataLoad {
        path: spec.path.clone(),
        message: e.to_string(),
    })?;
    parse_dataset(&bytes, spec.format).map_err(|e| e.at_path(&spec.path))
}

/// Drop records that repeat an earlier record's position, limit and direction.
///
/// Positions are compared at 1e-6° (~10 cm) and limits at 0.01 km/h; the
/// first occurrence wins so dataset order decides which copy survives.
pub fn dedup_records(records: Vec<TrapRecord>) -> Vec<TrapRecord> {
    let mut seen: HashSet<(i64, i64, i64, String)> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| {
            seen.insert((
                (r.position.latitude * 1e6).round() as i64,
                (r.position.longitude * 1e6).round() as i64,
                (r.speed_limit_kph * 100.0).round() as i64,
                r.direction.trim().to_string(),
            ))
        })
        .collect()
}

// ============================================================================
// Trap Store
// ============================================================================

/// Loaded, de-duplicated records together with their spatial index.
struct TrapCache {
    records: Vec<TrapRecord>,
    index: TrapIndex,
}

impl TrapCache {
    fn build(records: Vec<TrapRecord>) -> Self {
        let records = dedup_records(records);
        let index = TrapIndex::build(&records);
        Self { records, index }
    }
}

/// Lazily loaded, read-only trap reference data.
///
/// The first query reads every configured dataset; later queries share the
/// cached list without locking.
pub struct TrapStore {
    datasets: Vec<DatasetSpec>,
    cache: OnceCell<TrapCache>,
}

impl TrapStore {
    /// Create a store over the given dataset files. Nothing is read until the
    /// first query.
    pub fn new(datasets: Vec<DatasetSpec>) -> Self {
        Self {
            datasets,
            cache: OnceCell::new(),
        }
    }

    /// Create a store that is already loaded with `records`.
    pub fn from_records(records: Vec<TrapRecord>) -> Self {
        Self {
            datasets: Vec::new(),
            cache: OnceCell::with_value(TrapCache::build(records)),
        }
    }

    /// Dataset files this store reads from.
    pub fn datasets(&self) -> &[DatasetSpec] {
        &self.datasets
    }

    /// All trap records, loading them on first use.
    ///
    /// Returns an empty slice when no dataset could be loaded; in that case
    /// nothing is cached and the next call reads the files again.
    pub fn load_all(&self) -> &[TrapRecord] {
        self.cache()
            .map(|c| c.records.as_slice())
            .unwrap_or(&[])
    }

    /// Records that may lie within `radius_meters` of `center`.
    ///
    /// This is a conservative envelope query: every record within the radius
    /// is returned, along with some that are slightly outside it. Callers
    /// still need an exact distance check.
    pub fn candidates_near(&self, center: &GpsPoint, radius_meters: f64) -> Vec<&TrapRecord> {
        let Some(cache) = self.cache() else {
            return Vec::new();
        };
        match cache.index.candidates_within(center, radius_meters) {
            Some(indices) => indices.into_iter().map(|i| &cache.records[i]).collect(),
            None => cache.records.iter().collect(),
        }
    }

    /// Number of loaded records (triggers loading).
    pub fn len(&self) -> usize {
        self.load_all().len()
    }

    /// Whether the store holds no records (triggers loading).
    pub fn is_empty(&self) -> bool {
        self.load_all().is_empty()
    }

    /// Whether the datasets have been read and cached.
    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    fn cache(&self) -> Option<&TrapCache> {
        match self.cache.get_or_try_init(|| self.read_datasets()) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!("[TrapStore] No trap data available: {}", e);
                None
            }
        }
    }

    fn read_datasets(&self) -> Result<TrapCache> {
        let mut records = Vec::new();
        let mut last_error = None;
        let mut loaded = 0usize;

        for spec in &self.datasets {
            match load_dataset(spec) {
                Ok(parsed) => {
                    info!(
                        "[TrapStore] Loaded {} traps from {} ({} skipped)",
                        parsed.records.len(),
                        spec.path.display(),
                        parsed.skipped
                    );
                    loaded += 1;
                    records.extend(parsed.records);
                }
                Err(e) => {
                    warn!("[TrapStore] {}", e);
                    last_error = Some(e);
                }
            }
        }

        if loaded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let total = records.len();
        let cache = TrapCache::build(records);
        debug!(
            "[TrapStore] {} unique traps ({} duplicates dropped)",
            cache.records.len(),
            total - cache.records.len()
        );
        Ok(cache)
    }
}

impl std::fmt::Debug for TrapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrapStore")
            .field("datasets", &self.datasets)
            .field("loaded", &self.cache.get().map(|c| c.records.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrapSource;

    fn record(lat: f64, lng: f64, limit: f64, direction: &str) -> TrapRecord {
        TrapRecord {
            position: GpsPoint::new(lat, lng),
            speed_limit_kph: limit,
            speed_limit_display: format_limit(limit),
            address: String::new(),
            direction: direction.to_string(),
            source: TrapSource::GeoJson,
        }
    }

    #[test]
    fn test_limit_field_values() {
        assert_eq!(LimitField::Text("60.0".into()).value(), Some(60.0));
        assert_eq!(LimitField::Text(" 70 ".into()).value(), Some(70.0));
        assert_eq!(LimitField::Number(0.0).value(), Some(0.0));
        assert_eq!(LimitField::Text("".into()).value(), None);
        assert_eq!(LimitField::Text("fast".into()).value(), None);
        assert_eq!(LimitField::Number(-10.0).value(), None);
        assert_eq!(LimitField::Text("NaN".into()).value(), None);
    }

    #[test]
    fn test_format_limit() {
        assert_eq!(format_limit(60.0), "60");
        assert_eq!(format_limit(62.5), "62.5");
        assert_eq!(format_limit_with_unit(55.0, SpeedUnit::Mph), "55 mph");
    }

    #[test]
    fn test_mph_conversion() {
        assert!((SpeedUnit::Mph.to_kph(55.0) - 88.5137).abs() < 1e-9);
        assert_eq!(SpeedUnit::Kph.to_kph(55.0), 55.0);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut first = record(25.0, 121.0, 60.0, "北向南");
        first.address = "first".to_string();
        let mut dup = first.clone();
        dup.address = "second".to_string();
        let other_direction = record(25.0, 121.0, 60.0, "南向北");

        let records = dedup_records(vec![first, dup, other_direction]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "first");
    }

    #[test]
    fn test_from_records_is_loaded() {
        let store = TrapStore::from_records(vec![record(25.0, 121.0, 60.0, "")]);
        assert!(store.is_loaded());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_dataset_yields_empty_and_stays_unloaded() {
        let store = TrapStore::new(vec![DatasetSpec::geojson(
            "/nonexistent/speedtraps.geojson",
        )]);
        assert!(store.load_all().is_empty());
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_no_datasets_caches_empty() {
        let store = TrapStore::new(Vec::new());
        assert!(store.is_empty());
        assert!(store.is_loaded());
    }

    #[test]
    fn test_candidates_near_filters_far_records() {
        let store = TrapStore::from_records(vec![
            record(25.0, 121.0, 60.0, ""),
            record(25.01, 121.0, 60.0, ""),
            record(26.0, 121.0, 60.0, ""),
        ]);
        let near = store.candidates_near(&GpsPoint::new(25.0, 121.0), 2000.0);
        assert_eq!(near.len(), 2);
    }
}
