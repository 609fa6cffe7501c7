//! R-tree index over trap positions for radius pre-filtering.

use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::meters_to_degrees;
use crate::{GpsPoint, TrapRecord};

/// Envelope growth over the nominal radius. Covers the difference between
/// the flat degree approximation and great-circle distance.
const ENVELOPE_MARGIN: f64 = 1.2;

/// A trap position with its index in the store's record list
#[derive(Debug, Clone, Copy)]
pub struct IndexedTrap {
    pub idx: usize,
    pub lat: f64,
    pub lng: f64,
}

impl RTreeObject for IndexedTrap {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

/// Spatial index over the store's records.
#[derive(Debug)]
pub struct TrapIndex {
    tree: RTree<IndexedTrap>,
}

impl TrapIndex {
    /// Build the index from records (bulk-loaded).
    pub fn build(records: &[TrapRecord]) -> Self {
        let indexed: Vec<IndexedTrap> = records
            .iter()
            .enumerate()
            .map(|(i, r)| IndexedTrap {
                idx: i,
                lat: r.position.latitude,
                lng: r.position.longitude,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Record indices whose position falls inside a lat/lng envelope that
    /// contains the circle of `radius_meters` around `center`.
    ///
    /// Returns `None` when the envelope would cross a pole or the
    /// antimeridian; callers should then consider every record. Indices are
    /// returned in ascending order.
    pub fn candidates_within(&self, center: &GpsPoint, radius_meters: f64) -> Option<Vec<usize>> {
        let reach = radius_meters.max(0.0) * ENVELOPE_MARGIN;
        let (dlat, _) = meters_to_degrees(reach, center.latitude);
        let min_lat = center.latitude - dlat;
        let max_lat = center.latitude + dlat;
        if min_lat < -90.0 || max_lat > 90.0 {
            return None;
        }

        // Longitude degrees shrink poleward, so size the span at the poleward edge
        let poleward = min_lat.abs().max(max_lat.abs());
        let (_, dlng) = meters_to_degrees(reach, poleward);
        let min_lng = center.longitude - dlng;
        let max_lng = center.longitude + dlng;
        if !dlng.is_finite() || min_lng < -180.0 || max_lng > 180.0 {
            return None;
        }

        let envelope = AABB::from_corners([min_lat, min_lng], [max_lat, max_lng]);
        let mut indices: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .map(|t| t.idx)
            .collect();
        indices.sort_unstable();
        Some(indices)
    }
}
