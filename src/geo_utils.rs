//! Geographic utilities: great-circle distance, bearings and heading arithmetic.
//!
//! All angles are compass degrees (0 = north, 90 = east) and all distances
//! are metres.

use geo::{Distance, Haversine, Point};

use crate::GpsPoint;

/// Approximate metres per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Calculate haversine distance between two GPS points in meters.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Initial great-circle bearing from `from` toward `to`, in [0, 360).
pub fn bearing(from: &GpsPoint, to: &GpsPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    normalize_degrees(x.atan2(y).to_degrees())
}

/// Wrap an angle into [0, 360).
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Smallest absolute difference between two headings, in [0, 180].
///
/// ```
/// use trap_matcher::geo_utils::angular_difference;
/// assert_eq!(angular_difference(10.0, 350.0), 20.0);
/// assert_eq!(angular_difference(0.0, 180.0), 180.0);
/// ```
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

/// Convert a distance in meters to (latitude, longitude) degree spans at `ref_lat`.
///
/// The longitude span grows without bound toward the poles; callers that
/// build envelopes must check it against the 360° world width.
pub fn meters_to_degrees(meters: f64, ref_lat: f64) -> (f64, f64) {
    let dlat = meters / METERS_PER_DEGREE;
    let cos_lat = ref_lat.to_radians().cos().abs();
    let dlng = if cos_lat < 1e-9 {
        f64::INFINITY
    } else {
        meters / (METERS_PER_DEGREE * cos_lat)
    };
    (dlat, dlng)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_haversine_identity() {
        for p in [
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(25.0330, 121.5654),
            GpsPoint::new(-33.8688, 151.2093),
            GpsPoint::new(89.9, -179.9),
        ] {
            assert_eq!(haversine_distance(&p, &p), 0.0);
        }
    }

    #[test]
    fn test_haversine_symmetry() {
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let there = haversine_distance(&london, &paris);
        let back = haversine_distance(&paris, &london);
        assert!((there - back).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_reference_distance() {
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let km = haversine_distance(&london, &paris) / 1000.0;
        assert!((km - 343.5).abs() < 2.0, "got {km} km");

        // One thousandth of a degree of latitude is ~111 m
        let a = GpsPoint::new(25.0, 121.0);
        let b = GpsPoint::new(25.001, 121.0);
        let d = haversine_distance(&a, &b);
        assert!((d - 111.2).abs() < 0.5, "got {d} m");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = GpsPoint::new(0.0, 0.0);
        assert!(bearing(&origin, &GpsPoint::new(1.0, 0.0)).abs() < EPS);
        assert!((bearing(&origin, &GpsPoint::new(0.0, 1.0)) - 90.0).abs() < EPS);
        assert!((bearing(&origin, &GpsPoint::new(-1.0, 0.0)) - 180.0).abs() < EPS);
        assert!((bearing(&origin, &GpsPoint::new(0.0, -1.0)) - 270.0).abs() < EPS);
    }

    #[test]
    fn test_bearing_range() {
        let from = GpsPoint::new(25.0330, 121.5654);
        for i in 0..36 {
            let angle = (i as f64 * 10.0).to_radians();
            let to = GpsPoint::new(
                from.latitude + 0.01 * angle.cos(),
                from.longitude + 0.01 * angle.sin(),
            );
            let b = bearing(&from, &to);
            assert!((0.0..360.0).contains(&b), "bearing {b} out of range");
        }
    }

    #[test]
    fn test_angular_difference_wraps() {
        assert_eq!(angular_difference(10.0, 350.0), 20.0);
        assert_eq!(angular_difference(350.0, 10.0), 20.0);
        assert_eq!(angular_difference(0.0, 180.0), 180.0);
        assert_eq!(angular_difference(90.0, 90.0), 0.0);
        assert_eq!(angular_difference(0.0, 360.0), 0.0);
        assert_eq!(angular_difference(45.0, 270.0), 135.0);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(370.0), 10.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(-1e-20), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
    }

    #[test]
    fn test_meters_to_degrees() {
        let (dlat, dlng) = meters_to_degrees(111_320.0, 0.0);
        assert!((dlat - 1.0).abs() < EPS);
        assert!((dlng - 1.0).abs() < EPS);

        let (_, dlng_60) = meters_to_degrees(111_320.0, 60.0);
        assert!((dlng_60 - 2.0).abs() < 1e-6);

        let (_, dlng_pole) = meters_to_degrees(1000.0, 90.0);
        assert!(dlng_pole.is_infinite() || dlng_pole > 360.0);
    }
}
