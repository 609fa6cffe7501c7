//! End-to-end detector scenarios over on-disk datasets.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use trap_matcher::{
    init_detector, with_detector, DatasetSpec, DetectorConfig, DetectorState, DrivingContext,
    GpsPoint, ProximityDetector, ScanOutcome, SpeedUnit, TrapStore,
};

fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const ORIGIN: GpsPoint = GpsPoint {
    latitude: 25.0330,
    longitude: 121.5654,
};

/// A flat km/h record at a latitude offset from `ORIGIN`.
fn flat_entry(lat_offset: f64, limit: Option<f64>, location: &str, direction: &str) -> String {
    let limit = limit.map_or("null".to_string(), |l| l.to_string());
    format!(
        r#"{{"latitude": {}, "longitude": {}, "speed_limit": {}, "location": "{}", "direction": "{}"}}"#,
        ORIGIN.latitude + lat_offset,
        ORIGIN.longitude,
        limit,
        location,
        direction
    )
}

/// Detector over a single flat km/h dataset built from `entries`.
fn detector_with(
    entries: &[String],
    config: DetectorConfig,
) -> (ProximityDetector, TempDir) {
    init_test_logging();
    let tmp = TempDir::new().expect("failed to create temp dir");
    let path = tmp.path().join("traps.json");
    fs::write(&path, format!("[{}]", entries.join(","))).expect("failed to write dataset");
    let store = TrapStore::new(vec![DatasetSpec::flat(path, SpeedUnit::Kph)]);
    (ProximityDetector::new(Arc::new(store), config), tmp)
}

fn context(heading: f64, speed_mps: f64, street: &str) -> DrivingContext {
    DrivingContext::new(ORIGIN, heading, speed_mps, street)
}

#[test]
fn test_main_street_camera_ahead_reports_speeding() {
    // ~200 m north, southbound enforcement, driving north at 108 km/h
    let (detector, _tmp) = detector_with(
        &[flat_entry(0.0018, Some(100.0), "Main St", "southbound")],
        DetectorConfig::default(),
    );

    let outcome = detector.evaluate(&context(0.0, 30.0, "Main St"));
    assert_eq!(outcome, ScanOutcome::Scanned { found: true });

    let state = detector.state();
    let closest = state.closest_trap.as_ref().expect("trap expected");
    assert!((closest.distance_meters - 200.0).abs() < 2.0);
    assert!(closest.score > 770 && closest.score <= 780, "score {}", closest.score);
    assert!(state.is_within_range);
    assert!(state.is_speeding);
    assert!((state.speeding_amount_kph - 8.0).abs() < 1e-9);
}

#[test]
fn test_trap_beyond_search_radius_is_ignored() {
    // ~3000 m away
    let (detector, _tmp) = detector_with(
        &[flat_entry(0.027, Some(50.0), "Main St", "northbound")],
        DetectorConfig::default(),
    );

    assert_eq!(
        detector.evaluate(&context(0.0, 30.0, "Main St")),
        ScanOutcome::Scanned { found: false }
    );
    assert_eq!(detector.state(), DetectorState::default());
}

#[test]
fn test_search_radius_boundary() {
    // ~1990 m is scored, ~2013 m is not
    let (detector, _tmp) = detector_with(
        &[
            flat_entry(0.0181, Some(50.0), "outside", ""),
            flat_entry(0.0179, Some(50.0), "inside", ""),
        ],
        DetectorConfig::default(),
    );

    detector.evaluate(&context(DrivingContext::UNKNOWN_HEADING, 0.0, ""));
    let state = detector.state();
    let closest = state.closest_trap.expect("inside trap expected");
    assert_eq!(closest.trap.address, "inside");
    assert!(!state.is_within_range);
}

#[test]
fn test_infinite_proximity_ties_go_to_closer_trap() {
    // Both beyond 2000 m with identical zero scores; the farther one comes first
    let config = DetectorConfig {
        infinite_proximity: true,
        ..DetectorConfig::default()
    };
    let (detector, _tmp) = detector_with(
        &[
            flat_entry(0.036, Some(50.0), "farther", ""),
            flat_entry(0.0225, Some(50.0), "closer", ""),
        ],
        config,
    );

    detector.evaluate(&context(DrivingContext::UNKNOWN_HEADING, 20.0, ""));
    let state = detector.state();
    let closest = state.closest_trap.expect("trap expected with infinite proximity");
    assert_eq!(closest.trap.address, "closer");
    assert_eq!(closest.score, 0);
    assert!(!state.is_within_range);
    // Out of range but infinite proximity still raises the speeding signal
    assert!(state.is_speeding);
}

#[test]
fn test_infinite_proximity_bypasses_throttle() {
    let config = DetectorConfig {
        infinite_proximity: true,
        ..DetectorConfig::default()
    };
    let (detector, _tmp) = detector_with(&[flat_entry(0.001, Some(50.0), "", "")], config);

    let ctx = context(0.0, 10.0, "");
    assert!(matches!(detector.evaluate(&ctx), ScanOutcome::Scanned { .. }));
    assert!(matches!(detector.evaluate(&ctx), ScanOutcome::Scanned { .. }));

    detector.set_infinite_proximity(false);
    assert_eq!(detector.evaluate(&ctx), ScanOutcome::Throttled);
}

#[test]
fn test_unknown_limit_never_speeding() {
    let (detector, _tmp) = detector_with(
        &[flat_entry(0.001, None, "Mission St", "")],
        DetectorConfig::default(),
    );

    detector.evaluate(&context(0.0, 60.0, "Mission St"));
    let state = detector.state();
    assert!(state.closest_trap.is_some());
    assert!(state.is_within_range);
    assert!(!state.is_speeding);
    assert_eq!(state.speeding_amount_kph, 0.0);
}

#[test]
fn test_passed_trap_loses_to_one_ahead() {
    // Driving south: one camera ~150 m behind (north), one ~300 m ahead (south)
    let (detector, _tmp) = detector_with(
        &[
            flat_entry(0.00135, Some(50.0), "忠孝東路", "北向南"),
            flat_entry(-0.0027, Some(60.0), "忠孝東路四段", "北向南"),
        ],
        DetectorConfig::default(),
    );

    detector.evaluate(&context(180.0, 20.0, "忠孝東路"));
    let state = detector.state();
    let closest = state.closest_trap.expect("trap expected");
    assert_eq!(closest.trap.address, "忠孝東路四段");
    assert!(state.is_within_range);
    assert!(state.is_speeding);
    assert!((state.speeding_amount_kph - 12.0).abs() < 1e-9);
}

#[test]
fn test_missing_dataset_publishes_no_trap() {
    init_test_logging();
    let store = TrapStore::new(vec![DatasetSpec::geojson("/nonexistent/traps.geojson")]);
    let detector = ProximityDetector::new(Arc::new(store), DetectorConfig::default());

    assert_eq!(
        detector.evaluate(&context(0.0, 30.0, "Main St")),
        ScanOutcome::Scanned { found: false }
    );
    assert_eq!(detector.state(), DetectorState::default());
    assert!(detector.rank_nearest(&ORIGIN, 5).is_empty());
}

#[test]
fn test_global_detector() {
    init_test_logging();
    let tmp = TempDir::new().expect("failed to create temp dir");
    let path = tmp.path().join("traps.json");
    fs::write(
        &path,
        format!("[{}]", flat_entry(0.001, Some(40.0), "Xinyi Rd", "")),
    )
    .expect("failed to write dataset");

    init_detector(
        TrapStore::new(vec![DatasetSpec::flat(path, SpeedUnit::Kph)]),
        DetectorConfig::default(),
    );

    let outcome = with_detector(|d| d.evaluate(&context(0.0, 15.0, "Xinyi Road")));
    assert_eq!(outcome, Some(ScanOutcome::Scanned { found: true }));

    let state = with_detector(|d| d.state()).expect("detector installed");
    assert!(state.is_speeding);

    let nearest = with_detector(|d| d.rank_nearest(&ORIGIN, 3)).expect("detector installed");
    assert_eq!(nearest.len(), 1);
    assert_eq!(nearest[0].trap.address, "Xinyi Rd");
}
