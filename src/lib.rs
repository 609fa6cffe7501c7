//! # Trap Matcher
//!
//! Speed-trap proximity and directional matching for driving companions.
//!
//! This library provides:
//! - Loading of fixed speed-camera records from bundled reference datasets
//! - Multi-factor scoring of each trap against the current driving context
//!   (road name, direction of travel, ahead/behind, distance)
//! - A proximity detector that picks the single relevant trap and derives
//!   an in-range flag and a speeding signal
//!
//! ## Features
//!
//! - **`parallel`** - Score candidates in parallel with rayon
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use trap_matcher::{
//!     DetectorConfig, DrivingContext, GpsPoint, ProximityDetector, TrapRecord, TrapSource,
//!     TrapStore,
//! };
//!
//! let camera = TrapRecord {
//!     position: GpsPoint::new(25.0348, 121.5654),
//!     speed_limit_kph: 50.0,
//!     speed_limit_display: "50".to_string(),
//!     address: "Xinyi Rd".to_string(),
//!     direction: "northbound".to_string(),
//!     source: TrapSource::FlatRecords,
//! };
//!
//! let store = Arc::new(TrapStore::from_records(vec![camera]));
//! let detector = ProximityDetector::new(store, DetectorConfig::default());
//!
//! let context = DrivingContext::new(GpsPoint::new(25.0330, 121.5654), 0.0, 16.0, "Xinyi Road");
//! detector.evaluate(&context);
//!
//! let state = detector.state();
//! assert!(state.is_within_range);
//! assert!(state.is_speeding);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrapMatchError};

// Geographic utilities (distance, bearing, heading arithmetic)
pub mod geo_utils;

// Bundled dataset loading, normalization and caching
pub mod store;
pub use store::{DatasetFormat, DatasetSpec, SpeedUnit, TrapStore};

// Candidate scoring against the driving context
pub mod scoring;
pub use scoring::{score_trap, ScoreBreakdown, ScoringConfig, TravelDirection};

// Stateful detector (guarded scans, throttling, published state)
pub mod detector;
pub use detector::{
    init_detector, with_detector, NearbyTrap, ProximityDetector, ScanHandle, ScanOutcome,
    DETECTOR,
};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TrapMatcherRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// Conversion factor from metres per second to kilometres per hour.
pub const MPS_TO_KPH: f64 = 3.6;

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use trap_matcher::GpsPoint;
/// let point = GpsPoint::new(25.0330, 121.5654); // Taipei
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Which bundled schema a trap record was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrapSource {
    /// GeoJSON feature collection with localized property names
    GeoJson,
    /// Flat attribute records with English field names
    FlatRecords,
}

/// A fixed speed-enforcement camera, normalized from any source schema.
///
/// Records are immutable once loaded. `speed_limit_kph == 0.0` means the
/// limit is unknown and never produces a speeding signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrapRecord {
    pub position: GpsPoint,
    /// Posted limit in km/h (converted from mph at load time where needed)
    pub speed_limit_kph: f64,
    /// Limit as written in the source, for presentation
    pub speed_limit_display: String,
    /// Free-text road/location description
    pub address: String,
    /// Free-text or coded direction the camera enforces (may be empty)
    pub direction: String,
    pub source: TrapSource,
}

impl TrapRecord {
    /// Whether the record carries a usable speed limit.
    pub fn has_known_limit(&self) -> bool {
        self.speed_limit_kph > 0.0
    }
}

/// One sample of the vehicle's situation, supplied per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DrivingContext {
    pub position: GpsPoint,
    /// Course over ground in degrees; any negative value means unknown
    pub heading_degrees: f64,
    pub speed_mps: f64,
    /// Current street name; may be a "still resolving" placeholder
    pub street_name: String,
}

impl DrivingContext {
    /// Heading sentinel reported by location providers without a valid course.
    pub const UNKNOWN_HEADING: f64 = -1.0;

    pub fn new(
        position: GpsPoint,
        heading_degrees: f64,
        speed_mps: f64,
        street_name: impl Into<String>,
    ) -> Self {
        Self {
            position,
            heading_degrees,
            speed_mps,
            street_name: street_name.into(),
        }
    }

    /// Heading normalized to [0, 360), or `None` when unknown.
    pub fn heading(&self) -> Option<f64> {
        if self.heading_degrees.is_finite() && self.heading_degrees >= 0.0 {
            Some(geo_utils::normalize_degrees(self.heading_degrees))
        } else {
            None
        }
    }

    /// Current speed in km/h. Invalid (negative or non-finite) readings count as stopped.
    pub fn speed_kph(&self) -> f64 {
        if self.speed_mps.is_finite() && self.speed_mps > 0.0 {
            self.speed_mps * MPS_TO_KPH
        } else {
            0.0
        }
    }

    /// Street name if it is usable for matching.
    pub fn resolved_street_name(&self) -> Option<&str> {
        let name = self.street_name.trim();
        if scoring::road::is_unresolved_street(name) {
            None
        } else {
            Some(name)
        }
    }
}

/// A scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MatchResult {
    pub trap: TrapRecord,
    pub distance_meters: f64,
    pub score: i64,
}

impl MatchResult {
    /// Higher score wins; equal scores fall back to the strictly closer trap.
    pub fn is_better_than(&self, other: &MatchResult) -> bool {
        scoring::ranks_above(
            self.score,
            self.distance_meters,
            other.score,
            other.distance_meters,
        )
    }
}

/// Published detector output. Replaced wholesale after every scan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DetectorState {
    pub closest_trap: Option<MatchResult>,
    /// `closest_trap.distance_meters <= alert_distance_meters`
    pub is_within_range: bool,
    pub is_speeding: bool,
    /// Current speed minus the trap's limit, in km/h (0 when the limit is unknown)
    pub speeding_amount_kph: f64,
}

/// Configuration for the proximity detector.
///
/// Every field has a default, so partial JSON settings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct DetectorConfig {
    /// Distance at which the surfaced trap counts as "in range".
    /// Default: 500.0 meters
    pub alert_distance_meters: f64,

    /// Disable the search cutoff and the movement throttle.
    /// Default: false
    pub infinite_proximity: bool,

    /// Candidates farther than this are never scored (unless infinite proximity).
    /// Default: 2000.0 meters
    pub search_radius_meters: f64,

    /// Minimum movement since the last evaluated position before rescanning.
    /// Default: 100.0 meters
    pub rescan_distance_meters: f64,

    /// Scoring weights and thresholds.
    pub scoring: ScoringConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            alert_distance_meters: 500.0,
            infinite_proximity: false,
            search_radius_meters: 2000.0,
            rescan_distance_meters: 100.0,
            scoring: ScoringConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Parse settings from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DetectorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject distances that would make the detector meaningless.
    pub fn validate(&self) -> Result<()> {
        let distances = [
            ("alert_distance_meters", self.alert_distance_meters),
            ("search_radius_meters", self.search_radius_meters),
            ("rescan_distance_meters", self.rescan_distance_meters),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(TrapMatchError::Config {
                    message: format!("{name} must be a non-negative number, got {value}"),
                });
            }
        }
        self.scoring.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
