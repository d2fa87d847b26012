//! Wake brightness chosen from ambient light.

use super::LevelBounds;
use log::debug;

/// Maps lux onto a backlight level between a floor and the maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveBrightness {
    pub enabled: bool,
    /// Level used at or below `threshold_low`.
    pub floor: u32,
    pub threshold_low: f32,
    pub threshold_high: f32,
    pub bounds: LevelBounds,
}

impl AdaptiveBrightness {
    /// Target level for the given ambient light. Without a reading the display wakes at full brightness.
    pub fn level_for(&self, lux: Option<f32>) -> u32 {
        let max = self.bounds.max;
        let Some(lux) = lux.filter(|_| self.enabled) else {
            return max;
        };

        let floor = self.floor.min(max);
        let level = if lux <= self.threshold_low {
            floor
        } else if lux >= self.threshold_high {
            max
        } else {
            let ratio = (lux - self.threshold_low) / (self.threshold_high - self.threshold_low);
            (floor as f32 + ratio * (max - floor) as f32) as u32
        };

        let level = level.clamp(floor.max(self.bounds.min), max);
        debug!("[Light] {:.1} lux -> brightness {}/{}", lux, level, max);
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adaptive() -> AdaptiveBrightness {
        AdaptiveBrightness {
            enabled: true,
            floor: 20,
            threshold_low: 10.0,
            threshold_high: 500.0,
            bounds: LevelBounds::new(0, 255),
        }
    }

    #[test]
    fn test_dark_room_uses_floor() {
        assert_eq!(adaptive().level_for(Some(0.0)), 20);
        assert_eq!(adaptive().level_for(Some(10.0)), 20);
    }

    #[test]
    fn test_bright_room_uses_max() {
        assert_eq!(adaptive().level_for(Some(500.0)), 255);
        assert_eq!(adaptive().level_for(Some(20_000.0)), 255);
    }

    #[test]
    fn test_interpolates_between_thresholds() {
        // halfway: 20 + 0.5 * 235 = 137.5
        assert_eq!(adaptive().level_for(Some(255.0)), 137);
    }

    #[test]
    fn test_disabled_or_missing_reading_uses_max() {
        let mut adaptive = adaptive();
        assert_eq!(adaptive.level_for(None), 255);
        adaptive.enabled = false;
        assert_eq!(adaptive.level_for(Some(0.0)), 255);
    }

    #[test]
    fn test_respects_lower_bound() {
        let mut adaptive = adaptive();
        adaptive.bounds = LevelBounds::new(50, 255);
        assert_eq!(adaptive.level_for(Some(0.0)), 50);
    }
}
