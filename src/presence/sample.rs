//! Range sample grids produced by the time-of-flight sensor.

use serde::{Deserialize, Serialize};

/// Largest distance the sensor reports reliably, in millimetres.
pub const MAX_RANGE_MM: u16 = 4000;

/// Zone layout of the ranging sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Resolution {
    /// 4x4 grid, 16 zones.
    Grid4x4,
    /// 8x8 grid, 64 zones.
    Grid8x8,
}

impl Resolution {
    /// Number of zones in one frame.
    pub const fn zone_count(self) -> usize {
        match self {
            Resolution::Grid4x4 => 16,
            Resolution::Grid8x8 => 64,
        }
    }
}

impl TryFrom<u16> for Resolution {
    type Error = String;

    fn try_from(zones: u16) -> Result<Self, Self::Error> {
        match zones {
            16 => Ok(Resolution::Grid4x4),
            64 => Ok(Resolution::Grid8x8),
            other => Err(format!("unsupported resolution {other} (expected 16 or 64)")),
        }
    }
}

impl From<Resolution> for u16 {
    fn from(resolution: Resolution) -> Self {
        resolution.zone_count() as u16
    }
}

/// One sensor frame: a distance per zone, `None` where the zone had no valid target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSample {
    zones: Vec<Option<u16>>,
}

impl RangeSample {
    /// Build a sample from already classified zone readings.
    ///
    /// The grid is padded with invalid zones or truncated to `resolution`.
    pub fn new(resolution: Resolution, zones: impl IntoIterator<Item = Option<u16>>) -> Self {
        let count = resolution.zone_count();
        let mut zones: Vec<Option<u16>> = zones.into_iter().take(count).collect();
        zones.resize(count, None);
        Self { zones }
    }

    /// Build a sample from raw driver millimetres.
    ///
    /// Zero and anything beyond [`MAX_RANGE_MM`] mean "no target" and are stored as invalid.
    pub fn from_millimeters(resolution: Resolution, raw: &[u16]) -> Self {
        Self::new(
            resolution,
            raw.iter()
                .map(|&d| (d > 0 && d <= MAX_RANGE_MM).then_some(d)),
        )
    }

    /// A frame with every zone invalid.
    pub fn empty(resolution: Resolution) -> Self {
        Self::new(resolution, std::iter::empty())
    }

    pub fn zones(&self) -> &[Option<u16>] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Number of zones holding a valid distance.
    pub fn valid_zones(&self) -> usize {
        self.zones.iter().flatten().count()
    }

    /// Number of valid zones at or closer than `threshold_mm`.
    pub fn zones_within(&self, threshold_mm: u16) -> usize {
        self.zones
            .iter()
            .flatten()
            .filter(|&&d| d <= threshold_mm)
            .count()
    }

    /// Closest valid distance in the frame.
    pub fn nearest_mm(&self) -> Option<u16> {
        self.zones.iter().flatten().copied().min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_zero_and_out_of_range_are_invalid() {
        let sample = RangeSample::from_millimeters(Resolution::Grid4x4, &[0, 120, 4000, 4001, 8191]);
        assert_eq!(sample.len(), 16);
        assert_eq!(&sample.zones()[..5], &[None, Some(120), Some(4000), None, None]);
        assert_eq!(sample.valid_zones(), 2);
    }

    #[test]
    fn test_grid_is_truncated_to_resolution() {
        let raw = vec![300u16; 80];
        let sample = RangeSample::from_millimeters(Resolution::Grid8x8, &raw);
        assert_eq!(sample.len(), 64);
        assert_eq!(sample.valid_zones(), 64);
    }

    #[test]
    fn test_zones_within_is_inclusive() {
        let sample = RangeSample::from_millimeters(Resolution::Grid4x4, &[399, 400, 401, 0]);
        assert_eq!(sample.zones_within(400), 2);
        assert_eq!(sample.nearest_mm(), Some(399));
    }

    #[test]
    fn test_empty_frame_has_no_nearest() {
        let sample = RangeSample::empty(Resolution::Grid8x8);
        assert_eq!(sample.valid_zones(), 0);
        assert_eq!(sample.nearest_mm(), None);
    }

    #[test]
    fn test_resolution_from_zone_count() {
        assert_eq!(Resolution::try_from(16), Ok(Resolution::Grid4x4));
        assert_eq!(Resolution::try_from(64), Ok(Resolution::Grid8x8));
        assert!(Resolution::try_from(32).is_err());
    }
}
