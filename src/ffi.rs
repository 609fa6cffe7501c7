//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose the global detector
//! to Kotlin and Swift. All functions are prefixed with `detector_` and
//! operate on the singleton installed by [`detector_init`].

use crate::{
    init_detector, init_logging, with_detector, DatasetSpec, DetectorConfig, DetectorState,
    DrivingContext, GpsPoint, NearbyTrap, ScanOutcome, SpeedUnit, TrapStore,
};
use log::{debug, info, warn};

// ============================================================================
// Lifecycle
// ============================================================================

/// Install the global detector over the bundled dataset files.
///
/// Either path may be `None` when the platform does not ship that dataset.
/// Files are not read until the first evaluation.
#[uniffi::export]
pub fn detector_init(
    geojson_path: Option<String>,
    flat_path: Option<String>,
    flat_unit: SpeedUnit,
    config: DetectorConfig,
) -> bool {
    init_logging();

    if let Err(e) = config.validate() {
        warn!("[TrapMatcherRust] Rejected detector config: {}", e);
        return false;
    }

    let mut datasets = Vec::new();
    if let Some(path) = geojson_path {
        datasets.push(DatasetSpec::geojson(path));
    }
    if let Some(path) = flat_path {
        datasets.push(DatasetSpec::flat(path, flat_unit));
    }

    info!(
        "[TrapMatcherRust] detector_init with {} dataset(s), alert {:.0}m",
        datasets.len(),
        config.alert_distance_meters
    );
    init_detector(TrapStore::new(datasets), config);
    true
}

/// Get default configuration.
#[uniffi::export]
pub fn default_detector_config() -> DetectorConfig {
    init_logging();
    DetectorConfig::default()
}

/// Clear the published state and the movement throttle.
#[uniffi::export]
pub fn detector_reset() {
    init_logging();
    with_detector(|d| d.reset());
}

// ============================================================================
// Evaluation
// ============================================================================

/// Process one location sample on the calling thread.
///
/// Returns `None` if [`detector_init`] has not been called.
#[uniffi::export]
pub fn detector_evaluate(context: DrivingContext) -> Option<ScanOutcome> {
    init_logging();
    let outcome = with_detector(|d| d.evaluate(&context));
    if outcome.is_none() {
        warn!("[TrapMatcherRust] detector_evaluate called before detector_init");
    }
    outcome
}

/// Snapshot of the published detector state.
#[uniffi::export]
pub fn detector_state() -> DetectorState {
    init_logging();
    with_detector(|d| d.state()).unwrap_or_default()
}

/// Published detector state as JSON (`"{}"` before initialization).
#[uniffi::export]
pub fn detector_state_json() -> String {
    init_logging();
    with_detector(|d| d.state_json()).unwrap_or_else(|| "{}".to_string())
}

/// Nearest traps by plain distance, for list views.
#[uniffi::export]
pub fn detector_rank_nearest(position: GpsPoint, count: u32) -> Vec<NearbyTrap> {
    init_logging();
    let ranked = with_detector(|d| d.rank_nearest(&position, count as usize)).unwrap_or_default();
    debug!(
        "[TrapMatcherRust] rank_nearest returned {} of {} requested",
        ranked.len(),
        count
    );
    ranked
}

// ============================================================================
// Settings
// ============================================================================

#[uniffi::export]
pub fn detector_set_alert_distance(meters: f64) {
    init_logging();
    if !meters.is_finite() || meters < 0.0 {
        warn!("[TrapMatcherRust] Ignoring invalid alert distance {}", meters);
        return;
    }
    with_detector(|d| d.set_alert_distance(meters));
}

#[uniffi::export]
pub fn detector_set_infinite_proximity(enabled: bool) {
    init_logging();
    info!("[TrapMatcherRust] Infinite proximity: {}", enabled);
    with_detector(|d| d.set_infinite_proximity(enabled));
}
