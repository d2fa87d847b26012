//! Debounced presence detection over multi-zone range samples.
//!
//! A sample is a "hit" when enough zones see something within the threshold.
//! Presence is only declared after a run of consecutive hits and only released
//! after a (usually longer) run of consecutive misses, so the display wakes
//! quickly but does not blank when someone briefly leans out of view.

use super::sample::RangeSample;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Thresholds for the presence state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// A zone counts as close when its distance is at or below this value.
    pub threshold_mm: u16,
    /// Close zones needed for a sample to count as a hit.
    pub min_zones: usize,
    /// Consecutive hits needed to become present.
    pub consecutive_required: u32,
    /// Consecutive misses needed to become absent.
    pub absence_required: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            threshold_mm: 400,
            min_zones: 4,
            consecutive_required: 2,
            absence_required: 10,
        }
    }
}

/// Snapshot of the detector's state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceState {
    pub is_present: bool,
    pub consecutive_hits: u32,
    pub consecutive_misses: u32,
}

/// A presence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEvent {
    /// New presence value.
    pub present: bool,
    /// Close zones in the sample that caused the transition.
    pub hit_zones: usize,
    /// Nearest valid distance in that sample, if any.
    pub nearest_mm: Option<u16>,
}

/// Turns a stream of range samples into presence transitions.
pub struct PresenceDetector {
    config: PresenceConfig,
    state: PresenceState,
}

impl PresenceDetector {
    pub fn new(config: PresenceConfig) -> Self {
        info!(
            "[Presence] Detector ready: threshold {}mm, {} zones, {} hits to wake, {} misses to sleep",
            config.threshold_mm,
            config.min_zones,
            config.consecutive_required,
            config.absence_required
        );
        Self {
            config,
            state: PresenceState::default(),
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    pub fn is_present(&self) -> bool {
        self.state.is_present
    }

    /// Forget all history and return to the absent state.
    pub fn reset(&mut self) {
        self.state = PresenceState::default();
    }

    /// Feed one sample. Returns an event only when presence flips.
    pub fn evaluate(&mut self, sample: &RangeSample) -> Option<PresenceEvent> {
        let hit_zones = sample.zones_within(self.config.threshold_mm);
        let hit = hit_zones >= self.config.min_zones;
        self.apply(hit, hit_zones, sample.nearest_mm())
    }

    /// Record a poll that produced no data. Counts as a miss.
    pub fn evaluate_unavailable(&mut self) -> Option<PresenceEvent> {
        self.apply(false, 0, None)
    }

    fn apply(&mut self, hit: bool, hit_zones: usize, nearest_mm: Option<u16>) -> Option<PresenceEvent> {
        let state = &mut self.state;

        if hit {
            state.consecutive_hits = state.consecutive_hits.saturating_add(1);
            state.consecutive_misses = 0;

            if !state.is_present && state.consecutive_hits >= self.config.consecutive_required {
                state.is_present = true;
                debug!(
                    "[Presence] Present: {} zones <= {}mm",
                    hit_zones, self.config.threshold_mm
                );
                return Some(PresenceEvent {
                    present: true,
                    hit_zones,
                    nearest_mm,
                });
            }
        } else {
            state.consecutive_misses = state.consecutive_misses.saturating_add(1);
            state.consecutive_hits = 0;

            if state.is_present && state.consecutive_misses >= self.config.absence_required {
                state.is_present = false;
                debug!(
                    "[Presence] Absent after {} misses",
                    state.consecutive_misses
                );
                return Some(PresenceEvent {
                    present: false,
                    hit_zones,
                    nearest_mm,
                });
            }
        }

        None
    }
}
