//! # Proximity Detector
//!
//! Stateful detector that turns a stream of driving-context samples into a
//! published [`DetectorState`].
//!
//! ## Lifecycle of an evaluation
//!
//! 1. **Guard**: only one scan runs at a time. A sample that arrives while a
//!    scan is in progress is dropped ([`ScanOutcome::SkippedBusy`]).
//! 2. **Throttle**: unless infinite proximity is on, a sample less than
//!    `rescan_distance_meters` from the last evaluated position is dropped
//!    ([`ScanOutcome::Throttled`]).
//! 3. **Scan**: every trap within `search_radius_meters` (or every trap, with
//!    infinite proximity) is scored; the best score wins, ties go to the
//!    closer trap.
//! 4. **Publish**: the state is replaced wholesale.
//!
//! The scan guard is released on every exit path, including a panic inside
//! the scan, so the detector cannot wedge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use log::{debug, info, trace, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geo_utils::haversine_distance;
use crate::scoring::{ranks_above, score_trap};
use crate::{
    DetectorConfig, DetectorState, DrivingContext, GpsPoint, MatchResult, TrapRecord, TrapStore,
};

// ============================================================================
// Core Types
// ============================================================================

/// What a call to [`ProximityDetector::evaluate`] did. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum ScanOutcome {
    /// Another scan was in progress; the sample was dropped
    SkippedBusy,
    /// The vehicle has not moved far enough since the last scan
    Throttled,
    /// A scan ran and the state was replaced
    Scanned { found: bool },
}

/// A trap and its plain distance, for list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct NearbyTrap {
    pub trap: TrapRecord,
    pub distance_meters: f64,
}

/// Handle for a scan running on a background thread.
pub struct ScanHandle {
    receiver: mpsc::Receiver<ScanOutcome>,
}

impl ScanHandle {
    /// Check if the scan is complete (non-blocking).
    pub fn try_recv(&self) -> Option<ScanOutcome> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the scan to complete (blocking).
    ///
    /// Returns `None` if the scan thread died without reporting.
    pub fn recv(self) -> Option<ScanOutcome> {
        self.receiver.recv().ok()
    }
}

/// Holds the scanning flag; clears it when dropped.
struct ScanGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Best candidate seen so far in a scan. Borrows the record so only the
/// winner is cloned.
#[derive(Clone, Copy)]
struct Candidate<'a> {
    trap: &'a TrapRecord,
    distance: f64,
    score: i64,
}

impl Candidate<'_> {
    fn better(self, other: Self) -> Self {
        if ranks_above(other.score, other.distance, self.score, self.distance) {
            other
        } else {
            self
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Proximity Detector
// ============================================================================

/// Picks the single relevant trap for the current driving context.
///
/// All methods take `&self`; the detector is meant to be shared behind an
/// `Arc` between the location callback and UI readers.
pub struct ProximityDetector {
    store: Arc<TrapStore>,
    config: Mutex<DetectorConfig>,
    state: Mutex<DetectorState>,
    last_evaluated: Mutex<Option<GpsPoint>>,
    scanning: Arc<AtomicBool>,
}

impl ProximityDetector {
    /// Create a detector over `store`. Trap data is not read until the first scan.
    pub fn new(store: Arc<TrapStore>, config: DetectorConfig) -> Self {
        Self {
            store,
            config: Mutex::new(config),
            state: Mutex::new(DetectorState::default()),
            last_evaluated: Mutex::new(None),
            scanning: Arc::new(AtomicBool::new(false)),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Current configuration (copy).
    pub fn config(&self) -> DetectorConfig {
        lock(&self.config).clone()
    }

    /// Replace the configuration. Takes effect from the next evaluation.
    pub fn set_config(&self, config: DetectorConfig) {
        *lock(&self.config) = config;
    }

    pub fn set_alert_distance(&self, meters: f64) {
        lock(&self.config).alert_distance_meters = meters;
    }

    pub fn set_infinite_proximity(&self, enabled: bool) {
        lock(&self.config).infinite_proximity = enabled;
    }

    /// The trap store backing this detector.
    pub fn store(&self) -> &Arc<TrapStore> {
        &self.store
    }

    // ========================================================================
    // Published State
    // ========================================================================

    /// Snapshot of the published state.
    pub fn state(&self) -> DetectorState {
        lock(&self.state).clone()
    }

    /// Published state as JSON.
    pub fn state_json(&self) -> String {
        serde_json::to_string(&self.state()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Whether a scan is currently running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Clear the published state and forget the last evaluated position.
    pub fn reset(&self) {
        *lock(&self.state) = DetectorState::default();
        *lock(&self.last_evaluated) = None;
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Process one driving-context sample.
    pub fn evaluate(&self, context: &DrivingContext) -> ScanOutcome {
        match self.try_begin_scan() {
            Some(guard) => self.run_guarded(context, guard),
            None => {
                trace!("[Detector] Scan in progress, dropping sample");
                ScanOutcome::SkippedBusy
            }
        }
    }

    /// Process a sample on a background thread.
    ///
    /// Returns `None` without spawning when a scan is already running (or
    /// the thread could not be started); the sample is dropped either way.
    pub fn evaluate_background(self: &Arc<Self>, context: DrivingContext) -> Option<ScanHandle> {
        let guard = self.try_begin_scan()?;
        let (tx, rx) = mpsc::channel();
        let detector = Arc::clone(self);

        let spawned = thread::Builder::new()
            .name("trap-scan".to_string())
            .spawn(move || {
                let outcome = detector.run_guarded(&context, guard);
                let _ = tx.send(outcome);
            });

        match spawned {
            Ok(_) => Some(ScanHandle { receiver: rx }),
            Err(e) => {
                // The closure, and with it the guard, has been dropped
                warn!("[Detector] Failed to spawn scan thread: {}", e);
                None
            }
        }
    }

    fn try_begin_scan(&self) -> Option<ScanGuard> {
        self.scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanGuard {
                flag: Arc::clone(&self.scanning),
            })
    }

    /// Throttle, scan and publish while holding the scan guard.
    fn run_guarded(&self, context: &DrivingContext, _guard: ScanGuard) -> ScanOutcome {
        let config = self.config();

        if !self.passes_throttle(&context.position, &config) {
            return ScanOutcome::Throttled;
        }

        let winner = self.find_best_match(context, &config);
        let state = build_state(winner, context, &config);
        let found = state.closest_trap.is_some();

        if let Some(ref closest) = state.closest_trap {
            debug!(
                "[Detector] Closest trap {:.0}m (score {}), in range: {}, speeding: {}",
                closest.distance_meters, closest.score, state.is_within_range, state.is_speeding
            );
        } else {
            debug!("[Detector] No trap in range");
        }

        *lock(&self.state) = state;
        ScanOutcome::Scanned { found }
    }

    /// Record the position when a rescan is due.
    fn passes_throttle(&self, position: &GpsPoint, config: &DetectorConfig) -> bool {
        let mut last = lock(&self.last_evaluated);
        if let Some(previous) = *last {
            let moved = haversine_distance(&previous, position);
            if moved < config.rescan_distance_meters && !config.infinite_proximity {
                trace!("[Detector] Moved {:.0}m since last scan, skipping", moved);
                return false;
            }
        }
        *last = Some(*position);
        true
    }

    /// Score every eligible trap and return the winner.
    fn find_best_match(
        &self,
        context: &DrivingContext,
        config: &DetectorConfig,
    ) -> Option<MatchResult> {
        let candidates: Vec<&TrapRecord> = if config.infinite_proximity {
            self.store.load_all().iter().collect()
        } else {
            self.store
                .candidates_near(&context.position, config.search_radius_meters)
        };

        #[cfg(feature = "parallel")]
        let best = candidates
            .par_iter()
            .copied()
            .filter_map(|trap| score_candidate(context, config, trap))
            .reduce_with(Candidate::better);

        #[cfg(not(feature = "parallel"))]
        let best = candidates
            .iter()
            .copied()
            .filter_map(|trap| score_candidate(context, config, trap))
            .reduce(Candidate::better);

        debug!(
            "[Detector] Scored {} of {} traps",
            candidates.len(),
            self.store.load_all().len()
        );

        best.map(|c| MatchResult {
            trap: c.trap.clone(),
            distance_meters: c.distance,
            score: c.score,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Up to `count` traps nearest to `position` by plain distance.
    ///
    /// Read-only: ignores scoring, the search radius and the throttle, and
    /// does not touch the published state.
    pub fn rank_nearest(&self, position: &GpsPoint, count: usize) -> Vec<NearbyTrap> {
        let mut ranked: Vec<(f64, &TrapRecord)> = self
            .store
            .load_all()
            .iter()
            .map(|trap| (haversine_distance(position, &trap.position), trap))
            .collect();

        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(count);

        ranked
            .into_iter()
            .map(|(distance_meters, trap)| NearbyTrap {
                trap: trap.clone(),
                distance_meters,
            })
            .collect()
    }
}

impl std::fmt::Debug for ProximityDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProximityDetector")
            .field("store", &self.store)
            .field("scanning", &self.is_scanning())
            .finish()
    }
}

/// Score one trap, or `None` when it lies outside the search radius.
fn score_candidate<'a>(
    context: &DrivingContext,
    config: &DetectorConfig,
    trap: &'a TrapRecord,
) -> Option<Candidate<'a>> {
    let distance = haversine_distance(&context.position, &trap.position);
    if !config.infinite_proximity && distance > config.search_radius_meters {
        return None;
    }
    let breakdown = score_trap(context, trap, distance, &config.scoring);
    trace!(
        "[Detector] {} at {:.0}m: {:?} = {}",
        trap.address,
        distance,
        breakdown,
        breakdown.total()
    );
    Some(Candidate {
        trap,
        distance,
        score: breakdown.total(),
    })
}

/// Derive the published state from a scan's winner.
pub fn build_state(
    winner: Option<MatchResult>,
    context: &DrivingContext,
    config: &DetectorConfig,
) -> DetectorState {
    let Some(winner) = winner else {
        return DetectorState::default();
    };

    let is_within_range = winner.distance_meters <= config.alert_distance_meters;
    let (is_speeding, speeding_amount_kph) = if winner.trap.has_known_limit() {
        let amount = context.speed_kph() - winner.trap.speed_limit_kph;
        (
            (is_within_range || config.infinite_proximity) && amount > 0.0,
            amount,
        )
    } else {
        (false, 0.0)
    };

    DetectorState {
        closest_trap: Some(winner),
        is_within_range,
        is_speeding,
        speeding_amount_kph,
    }
}

// ============================================================================
// Global Singleton
// ============================================================================

/// Global detector instance.
///
/// This singleton allows FFI calls to access a shared detector without
/// passing state back and forth across the FFI boundary.
pub static DETECTOR: Lazy<Mutex<Option<Arc<ProximityDetector>>>> = Lazy::new(|| Mutex::new(None));

/// Install a new global detector, replacing any previous one.
pub fn init_detector(store: TrapStore, config: DetectorConfig) -> Arc<ProximityDetector> {
    let detector = Arc::new(ProximityDetector::new(Arc::new(store), config));
    *lock(&DETECTOR) = Some(Arc::clone(&detector));
    info!(
        "[Detector] Initialized with {} dataset(s)",
        detector.store().datasets().len()
    );
    detector
}

/// Run `f` against the global detector, or return `None` if it is not initialized.
///
/// The global lock is released before `f` runs, so long scans do not block
/// other callers from reaching the detector.
pub fn with_detector<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&ProximityDetector) -> R,
{
    let detector = lock(&DETECTOR).clone()?;
    Some(f(&detector))
}

// ============================================================================
// Tests
// ============================================================================
