//! Brightness output for the display backlight.

pub mod adaptive;
pub mod backlight;

pub use adaptive::AdaptiveBrightness;
pub use backlight::SysfsBacklight;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Something that accepts a brightness level.
///
/// Implementations report failures through the returned error; the caller
/// decides whether to carry on.
pub trait BrightnessSink: Send + 'static {
    /// Write one brightness level. The value is already clamped by the caller.
    fn write(&mut self, level: u32) -> Result<()>;

    /// Highest level the hardware accepts.
    fn max_brightness(&self) -> u32;

    /// Level currently applied by the hardware, if it can be read back.
    fn current_level(&self) -> Option<u32> {
        None
    }
}

impl<S: BrightnessSink + ?Sized> BrightnessSink for Box<S> {
    fn write(&mut self, level: u32) -> Result<()> {
        (**self).write(level)
    }

    fn max_brightness(&self) -> u32 {
        (**self).max_brightness()
    }

    fn current_level(&self) -> Option<u32> {
        (**self).current_level()
    }
}

/// Inclusive brightness range every written level is clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBounds {
    pub min: u32,
    pub max: u32,
}

impl LevelBounds {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, level: u32) -> u32 {
        level.clamp(self.min, self.max)
    }

    /// Level as a percentage of the upper bound, for telemetry.
    pub fn percent(&self, level: u32) -> u32 {
        if self.max == 0 {
            return 0;
        }
        ((u64::from(level) * 100) / u64::from(self.max)) as u32
    }
}
