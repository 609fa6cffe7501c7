//! # Match Scoring
//!
//! Scores one trap against the current driving context. Four additive
//! components make up the score:
//!
//! | Component | Effect |
//! |-----------|--------|
//! | Road name | `+road_match_bonus` when the street matches the trap address |
//! | Direction | `+direction_match_bonus` / `-direction_mismatch_penalty` / 0 if unknown |
//! | Ahead     | `+ahead_bonus` when in front, `-passed_penalty` when behind and far |
//! | Distance  | `max(0, range - d) / divisor`, a mild preference for closer traps |
//!
//! Negative totals disqualify in practice but are still comparable; only the
//! detector's search radius removes a candidate outright.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrapMatchError};
use crate::geo_utils::{angular_difference, bearing};
use crate::{DrivingContext, TrapRecord};

pub mod direction;
pub mod road;

pub use direction::TravelDirection;
pub use road::{normalize_road_name, roads_match};

/// Scoring weights and thresholds.
///
/// The defaults are empirically tuned values; behaviour parity depends on
/// keeping them unless a deployment deliberately retunes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct ScoringConfig {
    /// Added when the street name matches the trap address. Default: 1200
    pub road_match_bonus: i64,
    /// Added when the heading agrees with the trap direction. Default: 500
    pub direction_match_bonus: i64,
    /// Subtracted when the heading disagrees with the trap direction. Default: 1000
    pub direction_mismatch_penalty: i64,
    /// Maximum heading deviation still counted as agreeing. Default: 45°
    pub heading_tolerance_degrees: f64,
    /// Added when the trap lies ahead of the vehicle. Default: 400
    pub ahead_bonus: i64,
    /// Subtracted when the trap has been passed. Default: 2000
    pub passed_penalty: i64,
    /// Bearing deviation below which a trap is ahead. Default: 60°
    pub ahead_max_angle_degrees: f64,
    /// Bearing deviation above which a trap is behind. Default: 120°
    pub behind_min_angle_degrees: f64,
    /// A trap behind the vehicle only counts as passed beyond this. Default: 50 m
    pub passed_min_distance_meters: f64,
    /// Distance at which the proximity reward reaches zero. Default: 2000 m
    pub distance_decay_range_meters: f64,
    /// Divisor turning remaining meters into points. Default: 10
    pub distance_decay_divisor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            road_match_bonus: 1200,
            direction_match_bonus: 500,
            direction_mismatch_penalty: 1000,
            heading_tolerance_degrees: 45.0,
            ahead_bonus: 400,
            passed_penalty: 2000,
            ahead_max_angle_degrees: 60.0,
            behind_min_angle_degrees: 120.0,
            passed_min_distance_meters: 50.0,
            distance_decay_range_meters: 2000.0,
            distance_decay_divisor: 10.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.distance_decay_divisor.is_finite() && self.distance_decay_divisor > 0.0) {
            return Err(TrapMatchError::Config {
                message: format!(
                    "distance_decay_divisor must be positive, got {}",
                    self.distance_decay_divisor
                ),
            });
        }
        if self.ahead_max_angle_degrees > self.behind_min_angle_degrees {
            return Err(TrapMatchError::Config {
                message: "ahead_max_angle_degrees must not exceed behind_min_angle_degrees"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Per-component contributions to a trap's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub road: i64,
    pub direction: i64,
    pub ahead: i64,
    pub distance: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.road + self.direction + self.ahead + self.distance
    }
}

/// Score `trap` at `distance_meters` from the vehicle described by `context`.
pub fn score_trap(
    context: &DrivingContext,
    trap: &TrapRecord,
    distance_meters: f64,
    config: &ScoringConfig,
) -> ScoreBreakdown {
    ScoreBreakdown {
        road: road_score(context, trap, config),
        direction: direction_score(context, trap, config),
        ahead: ahead_score(context, trap, distance_meters, config),
        distance: distance_score(distance_meters, config),
    }
}

/// Absent or placeholder street names never count against a trap.
fn road_score(context: &DrivingContext, trap: &TrapRecord, config: &ScoringConfig) -> i64 {
    match context.resolved_street_name() {
        Some(street) if roads_match(street, &trap.address) => config.road_match_bonus,
        _ => 0,
    }
}

fn direction_score(context: &DrivingContext, trap: &TrapRecord, config: &ScoringConfig) -> i64 {
    let Some(heading) = context.heading() else {
        return 0;
    };
    match TravelDirection::parse(&trap.direction)
        .agrees_with(heading, config.heading_tolerance_degrees)
    {
        Some(true) => config.direction_match_bonus,
        Some(false) => -config.direction_mismatch_penalty,
        None => 0,
    }
}

fn ahead_score(
    context: &DrivingContext,
    trap: &TrapRecord,
    distance_meters: f64,
    config: &ScoringConfig,
) -> i64 {
    let Some(heading) = context.heading() else {
        return 0;
    };
    let deviation = angular_difference(bearing(&context.position, &trap.position), heading);
    if deviation < config.ahead_max_angle_degrees {
        config.ahead_bonus
    } else if deviation > config.behind_min_angle_degrees
        && distance_meters > config.passed_min_distance_meters
    {
        -config.passed_penalty
    } else {
        0
    }
}

fn distance_score(distance_meters: f64, config: &ScoringConfig) -> i64 {
    let remaining = (config.distance_decay_range_meters - distance_meters).max(0.0);
    (remaining / config.distance_decay_divisor) as i64
}

/// Ranking rule shared by scans and results: higher score first, then
/// strictly smaller distance. Complete ties do not rank above.
pub fn ranks_above(score: i64, distance: f64, other_score: i64, other_distance: f64) -> bool {
    score > other_score || (score == other_score && distance < other_distance)
}
