//! Presence detection from time-of-flight range grids.

pub mod detector;
pub mod sample;

pub use detector::{PresenceConfig, PresenceDetector, PresenceEvent, PresenceState};
pub use sample::{MAX_RANGE_MM, RangeSample, Resolution};
